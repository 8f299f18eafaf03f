use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::{Body, HttpBody},
    extract::{Request, State},
    http::{header, HeaderValue},
    middleware::Next,
    response::Response,
};

use crate::exchange::{ProfiledRequest, ProfiledResponse};
use crate::pipeline::CollectionPipeline;
use crate::server::ProfilerState;
use crate::storage::CollectionRecord;

pub const TOKEN_HEADER: &str = "x-profiler-token";
pub const LINK_HEADER: &str = "x-profiler-link";

/// Profiles every request outside the panel prefix.
///
/// Runs the inner service, snapshots both sides, runs every collector,
/// persists the record, then stamps the response with:
///
///   X-Profiler-Token  — token of the stored record
///   X-Profiler-Link   — panel URL of the stored record
///   Server-Timing     — handler wall time
///
/// HTML responses of known size also get the toolbar loader injected.
pub async fn profiler_middleware(
    State(state): State<Arc<ProfilerState>>,
    req: Request,
    next: Next,
) -> Response {
    let settings = state.config.settings();
    let prefix = settings.prefix();
    let path = req.uri().path();
    if !settings.enabled || path == prefix || path.starts_with(&format!("{prefix}/")) {
        return next.run(req).await;
    }

    let (parts, body) = req.into_parts();
    let mut profiled_req = ProfiledRequest::from_parts(&parts);
    let req = Request::from_parts(parts, body);

    let start = Instant::now();
    let mut response = next.run(req).await;
    let elapsed = start.elapsed();
    profiled_req.set_runtime(elapsed);

    // ── Buffer small HTML bodies so the toolbar can be injected ─────
    let injectable = is_html(&response)
        && response
            .body()
            .size_hint()
            .exact()
            .is_some_and(|n| n as usize <= settings.max_inject_bytes);

    let mut html: Option<axum::body::Bytes> = None;
    if injectable {
        let (parts, body) = response.into_parts();
        match axum::body::to_bytes(body, settings.max_inject_bytes).await {
            Ok(bytes) => {
                html = Some(bytes.clone());
                response = Response::from_parts(parts, Body::from(bytes));
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to buffer HTML body");
                response = Response::from_parts(parts, Body::empty());
            }
        }
    }

    let mut profiled_res =
        ProfiledResponse::new(response.status()).with_headers(response.headers().clone());
    if let Some(size) = response.body().size_hint().exact() {
        profiled_res = profiled_res.with_body_size(size);
    }

    // ── Collect & persist ───────────────────────────────────────
    let results = CollectionPipeline::run(state.config.collectors(), &profiled_req, &profiled_res);
    let failures = results.values().filter(|o| o.is_failed()).count();
    let record = CollectionRecord::new(&profiled_req, &profiled_res, results);
    let token = record.token.clone();

    state
        .stats
        .record(record.duration_us, record.status, failures);

    let persisted = match tokio::time::timeout(settings.persist_timeout(), state.store.save(record)).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            tracing::warn!(token = %token, error = %e, "Failed to persist collection");
            false
        }
        Err(_) => {
            tracing::warn!(token = %token, timeout_ms = settings.persist_timeout_ms, "Persisting collection timed out");
            false
        }
    };

    // ── Inject response headers ─────────────────────────────────
    let server_timing = format!("total;dur={:.3}", elapsed.as_secs_f64() * 1000.0);
    if let Ok(val) = server_timing.parse() {
        response.headers_mut().insert("server-timing", val);
    }

    if persisted {
        if let Ok(val) = HeaderValue::from_str(&token) {
            response.headers_mut().insert(TOKEN_HEADER, val);
        }
        if let Ok(val) = HeaderValue::from_str(&format!("{prefix}/{token}")) {
            response.headers_mut().insert(LINK_HEADER, val);
        }

        if let Some(bytes) = html {
            if let Some(injected) = inject_toolbar(&bytes, prefix, &token) {
                response.headers_mut().remove(header::CONTENT_LENGTH);
                *response.body_mut() = Body::from(injected);
            }
        }
    }

    tracing::debug!(
        token = %token,
        method = %profiled_req.method(),
        path = %profiled_req.path(),
        status = profiled_res.status().as_u16(),
        runtime_us = elapsed.as_micros() as u64,
        failed_collectors = failures,
        "Request profiled"
    );

    response
}

fn is_html(response: &Response) -> bool {
    response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("text/html"))
}

/// Insert the toolbar loader before the last `</body>`.
///
/// `None` when the body is not UTF-8 or has no closing body tag.
fn inject_toolbar(body: &[u8], prefix: &str, token: &str) -> Option<String> {
    let html = std::str::from_utf8(body).ok()?;
    let at = html.rfind("</body>")?;

    let snippet = format!(
        r#"<div id="wp-toolbar"></div><script>(function(){{var x=new XMLHttpRequest();x.onload=function(){{if(x.status===200){{document.getElementById("wp-toolbar").innerHTML=x.responseText;}}}};x.open("GET","{prefix}/toolbar/{token}");x.send();}})();</script>"#
    );

    let mut out = String::with_capacity(html.len() + snippet.len());
    out.push_str(&html[..at]);
    out.push_str(&snippet);
    out.push_str(&html[at..]);
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toolbar_goes_before_closing_body() {
        let out = inject_toolbar(b"<html><body><p>hi</p></body></html>", "/_profiler", "abc").unwrap();
        assert!(out.starts_with("<html><body><p>hi</p><div id=\"wp-toolbar\">"));
        assert!(out.contains("/_profiler/toolbar/abc"));
        assert!(out.ends_with("</body></html>"));
    }

    #[test]
    fn no_body_tag_no_injection() {
        assert!(inject_toolbar(b"<p>fragment</p>", "/_profiler", "abc").is_none());
        assert!(inject_toolbar(&[0xff, 0xfe], "/_profiler", "abc").is_none());
    }
}
