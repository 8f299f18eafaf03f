use axum::{
    middleware as axum_mw,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::config::ProfilerConfig;
use crate::handlers::{api, panel};
use crate::metrics::RequestStats;
use crate::middleware::profiler_middleware;
use crate::render::Renderer;
use crate::storage::{self, CollectionStore};

/// Shared state for the middleware and every panel handler.
pub struct ProfilerState {
    pub config: ProfilerConfig,

    /// Where collection records go; see [`storage::connect`].
    pub store: Arc<dyn CollectionStore>,

    pub renderer: Renderer,

    pub stats: Arc<RequestStats>,
}

impl ProfilerState {
    pub fn new(config: ProfilerConfig, store: Arc<dyn CollectionStore>) -> Self {
        let renderer = Renderer::new(config.settings().templates_root.clone());
        Self {
            config,
            store,
            renderer,
            stats: Arc::new(RequestStats::new()),
        }
    }

    /// Connect the store selected by the config's storage settings.
    pub async fn connect(config: ProfilerConfig) -> crate::Result<Self> {
        let store = storage::connect(&config.settings().storage).await?;
        Ok(Self::new(config, store))
    }
}

/// Builds the panel `Router`, mounted under the configured prefix.
pub fn create_panel_router(state: Arc<ProfilerState>) -> Router {
    let prefix = state.config.settings().prefix().to_owned();

    Router::new()
        // ── HTML panel ──────────────────────────────────────────
        .route(&prefix, get(panel::index))
        .route(&format!("{prefix}/"), get(panel::index))
        .route(&format!("{prefix}/clean"), post(panel::clean))
        .route(&format!("{prefix}/toolbar/:token"), get(panel::toolbar))
        .route(&format!("{prefix}/:token"), get(panel::show))
        // ── JSON API ────────────────────────────────────────────
        .route(
            &format!("{prefix}/api/collections/:token"),
            get(api::get_collection),
        )
        .route(&format!("{prefix}/api/stats"), get(api::get_stats))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

/// Wraps `app` with the profiler: panel routes merged in, every other
/// route profiled.
pub fn profile(app: Router, state: Arc<ProfilerState>) -> Router {
    app.merge(create_panel_router(Arc::clone(&state)))
        .layer(axum_mw::from_fn_with_state(state, profiler_middleware))
}
