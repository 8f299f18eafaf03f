//! Collectors registered by [`ProfilerConfig::new`](crate::config::ProfilerConfig::new).

use super::{Collector, CollectorSpec, Template};
use crate::exchange::headers_to_map;

// ─── time ────────────────────────────────────────────────────────

pub struct TimeCollector;

const TIME_TEMPLATE: &str = r#"<table class="wp-table">
  <tr><th>Started at</th><td><%= @data[:started_at] %></td></tr>
  <tr><th>Runtime</th><td><%= @data[:runtime_ms] %> ms</td></tr>
  <tr><th>Runtime (μs)</th><td><%= @data[:runtime_us] %></td></tr>
</table>"#;

impl Collector for TimeCollector {
    fn spec() -> CollectorSpec {
        CollectorSpec::new()
            .name("time")
            .position(0)
            .icon("⏱")
            .collect(|req, _res, bag| {
                let runtime = req.runtime();
                bag.store("runtime_ms", runtime.as_secs_f64() * 1000.0)?;
                bag.store("runtime_us", runtime.as_micros() as u64)?;
                bag.store("started_at", req.started_at().to_rfc3339())?;
                Ok(())
            })
            .template(Template::data(TIME_TEMPLATE))
    }
}

// ─── request ─────────────────────────────────────────────────────

pub struct RequestCollector;

const REQUEST_TEMPLATE: &str = r#"<table class="wp-table">
  <tr><th>Method</th><td><%= @data[:method] %></td></tr>
  <tr><th>Path</th><td><%= @data[:path] %></td></tr>
  <tr><th>Query</th><td><%= @data[:query] %></td></tr>
  <tr><th>Version</th><td><%= @data[:version] %></td></tr>
  <tr><th>Remote address</th><td><%= @data[:remote_addr] %></td></tr>
  <tr><th>Headers</th><td><pre><%= @data[:headers] %></pre></td></tr>
</table>"#;

impl Collector for RequestCollector {
    fn spec() -> CollectorSpec {
        CollectorSpec::new()
            .name("request")
            .position(1)
            .icon("📨")
            .collect(|req, _res, bag| {
                bag.store("method", req.method().as_str())?;
                bag.store("path", req.path())?;
                bag.store("query", req.query())?;
                bag.store("version", format!("{:?}", req.version()))?;
                bag.store("remote_addr", req.remote_addr().map(|a| a.to_string()))?;
                bag.store("headers", headers_to_map(req.headers()))?;
                Ok(())
            })
            .template(Template::data(REQUEST_TEMPLATE))
    }
}

// ─── response ────────────────────────────────────────────────────

pub struct ResponseCollector;

const RESPONSE_TEMPLATE: &str = r#"<table class="wp-table">
  <tr><th>Status</th><td><%= @data[:status] %> <%= @data[:reason] %></td></tr>
  <tr><th>Content type</th><td><%= @data[:content_type] %></td></tr>
  <tr><th>Body size</th><td><%= @data[:body_size] %></td></tr>
  <tr><th>Headers</th><td><pre><%= @data[:headers] %></pre></td></tr>
</table>"#;

impl Collector for ResponseCollector {
    fn spec() -> CollectorSpec {
        CollectorSpec::new()
            .name("response")
            .position(2)
            .icon("📤")
            .collect(|_req, res, bag| {
                bag.store("status", res.status().as_u16())?;
                bag.store("reason", res.status().canonical_reason())?;
                bag.store("content_type", res.content_type())?;
                bag.store("body_size", res.body_size())?;
                bag.store("headers", headers_to_map(res.headers()))?;
                Ok(())
            })
            .template(Template::data(RESPONSE_TEMPLATE))
    }
}

// ─── server ──────────────────────────────────────────────────────

pub struct ServerCollector;

const SERVER_TEMPLATE: &str = r#"<table class="wp-table">
  <tr><th>Profiler</th><td><%= @data[:profiler_version] %></td></tr>
  <tr><th>Process id</th><td><%= @data[:pid] %></td></tr>
  <tr><th>Platform</th><td><%= @data[:os] %> / <%= @data[:arch] %></td></tr>
</table>"#;

impl Collector for ServerCollector {
    fn spec() -> CollectorSpec {
        CollectorSpec::new()
            .name("server")
            .position(3)
            .icon("🖥")
            .collect(|_req, _res, bag| {
                bag.store("profiler_version", env!("CARGO_PKG_VERSION"))?;
                bag.store("pid", std::process::id())?;
                bag.store("os", std::env::consts::OS)?;
                bag.store("arch", std::env::consts::ARCH)?;
                Ok(())
            })
            .template(Template::data(SERVER_TEMPLATE))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode, Uri};

    use super::*;
    use crate::collector::{CollectorDefinition, ResultBag};
    use crate::exchange::{ProfiledRequest, ProfiledResponse};

    fn run<C: Collector>(req: &ProfiledRequest, res: &ProfiledResponse) -> ResultBag {
        let def = CollectorDefinition::of::<C>().unwrap();
        let mut bag = ResultBag::new();
        def.collect(req, res, &mut bag).unwrap();
        bag
    }

    #[test]
    fn time_collector_records_runtime() {
        let req = ProfiledRequest::new(Method::GET, Uri::from_static("/"))
            .with_runtime(Duration::from_micros(1500));
        let bag = run::<TimeCollector>(&req, &ProfiledResponse::new(StatusCode::OK));

        assert_eq!(bag.get("runtime_us"), Some(&serde_json::json!(1500)));
        assert_eq!(bag.get("runtime_ms"), Some(&serde_json::json!(1.5)));
        assert!(bag.get("started_at").is_some());
    }

    #[test]
    fn request_collector_records_method_path_query() {
        let mut headers = HeaderMap::new();
        headers.insert(header::USER_AGENT, HeaderValue::from_static("test-agent"));
        let req = ProfiledRequest::new(Method::POST, Uri::from_static("/users?id=7"))
            .with_headers(headers);
        let bag = run::<RequestCollector>(&req, &ProfiledResponse::new(StatusCode::OK));

        assert_eq!(bag.get("method"), Some(&serde_json::json!("POST")));
        assert_eq!(bag.get("path"), Some(&serde_json::json!("/users")));
        assert_eq!(bag.get("query"), Some(&serde_json::json!("id=7")));
        assert_eq!(bag.get("headers").unwrap()["user-agent"], "test-agent");
    }

    #[test]
    fn response_collector_records_status_and_size() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/html"));
        let res = ProfiledResponse::new(StatusCode::NOT_FOUND)
            .with_headers(headers)
            .with_body_size(12);
        let req = ProfiledRequest::new(Method::GET, Uri::from_static("/"));
        let bag = run::<ResponseCollector>(&req, &res);

        assert_eq!(bag.get("status"), Some(&serde_json::json!(404)));
        assert_eq!(bag.get("reason"), Some(&serde_json::json!("Not Found")));
        assert_eq!(bag.get("content_type"), Some(&serde_json::json!("text/html")));
        assert_eq!(bag.get("body_size"), Some(&serde_json::json!(12)));
    }
}
