use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::Duration;

use axum::http::{HeaderMap, Method, StatusCode, Uri, Version};
use chrono::{DateTime, Utc};

// ─── Request snapshot ────────────────────────────────────────────

/// Read-only view of an intercepted request, handed to every collector.
///
/// Built by the middleware before the inner service runs. `runtime` is
/// filled in once the response is available.
#[derive(Debug, Clone)]
pub struct ProfiledRequest {
    method: Method,
    uri: Uri,
    version: Version,
    headers: HeaderMap,
    remote_addr: Option<SocketAddr>,
    started_at: DateTime<Utc>,
    runtime: Duration,
}

impl ProfiledRequest {
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            method,
            uri,
            version: Version::HTTP_11,
            headers: HeaderMap::new(),
            remote_addr: None,
            started_at: Utc::now(),
            runtime: Duration::ZERO,
        }
    }

    /// Snapshot the parts of an axum request the collectors can see.
    pub fn from_parts(parts: &axum::http::request::Parts) -> Self {
        let remote_addr = parts
            .extensions
            .get::<axum::extract::ConnectInfo<SocketAddr>>()
            .map(|info| info.0);

        Self {
            method: parts.method.clone(),
            uri: parts.uri.clone(),
            version: parts.version,
            headers: parts.headers.clone(),
            remote_addr,
            started_at: Utc::now(),
            runtime: Duration::ZERO,
        }
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_runtime(mut self, runtime: Duration) -> Self {
        self.runtime = runtime;
        self
    }

    pub fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    pub(crate) fn set_runtime(&mut self, runtime: Duration) {
        self.runtime = runtime;
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn query(&self) -> Option<&str> {
        self.uri.query()
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Wall time spent in the inner service.
    pub fn runtime(&self) -> Duration {
        self.runtime
    }
}

// ─── Response snapshot ───────────────────────────────────────────

/// Read-only view of the response produced for a [`ProfiledRequest`].
#[derive(Debug, Clone)]
pub struct ProfiledResponse {
    status: StatusCode,
    headers: HeaderMap,
    /// `None` when the body is streamed with no known length.
    body_size: Option<u64>,
}

impl ProfiledResponse {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body_size: None,
        }
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_body_size(mut self, size: u64) -> Self {
        self.body_size = Some(size);
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body_size(&self) -> Option<u64> {
        self.body_size
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(axum::http::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }
}

/// Flatten a header map into sorted `name → value` pairs.
///
/// Repeated headers are joined with `", "`; non-UTF-8 values are replaced
/// lossily so the result always serializes.
pub fn headers_to_map(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut map: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        map.entry(name.as_str().to_owned())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert(value);
    }
    map
}
