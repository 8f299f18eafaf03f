use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::Path,
    response::Html,
    routing::get,
    Json, Router,
};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use web_profiler::{ProfilerConfig, ProfilerSettings, ProfilerState};

/// Optional YAML settings file.
const CONFIG_ENV: &str = "WEB_PROFILER_CONFIG";
const BIND_ENV: &str = "WEB_PROFILER_BIND";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("web_profiler=info,tower_http=info")),
        )
        .init();

    // ── 1. Load settings ─────────────────────────────────────────
    let settings = match std::env::var(CONFIG_ENV) {
        Ok(path) => ProfilerSettings::load(&path)
            .with_context(|| format!("loading profiler settings from {path}"))?,
        Err(_) => ProfilerSettings::default(),
    };

    // ── 2. Build config, registry & store ────────────────────────
    let config = ProfilerConfig::new(settings).context("building profiler config")?;
    let prefix = config.settings().prefix().to_owned();
    let state = Arc::new(
        ProfilerState::connect(config)
            .await
            .context("connecting collection store")?,
    );

    // ── 3. Demo application, wrapped by the profiler ─────────────
    let app = Router::new()
        .route("/", get(home))
        .route("/hello/:name", get(hello));
    let app = web_profiler::profile(app, state).layer(TraceLayer::new_for_http());

    // ── 4. Bind & serve ──────────────────────────────────────────
    let addr = std::env::var(BIND_ENV).unwrap_or_else(|_| "127.0.0.1:3000".into());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;

    tracing::info!(addr = %addr, panel = %format!("http://{addr}{prefix}/"), "Server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("server exited with error")?;

    Ok(())
}

async fn home() -> Html<&'static str> {
    Html(
        "<!DOCTYPE html><html><body><h1>Profiled demo</h1>\
         <p>Try <a href=\"/hello/world\">/hello/world</a>, then open the toolbar.</p>\
         </body></html>",
    )
}

async fn hello(Path(name): Path<String>) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "hello": name }))
}
