//! Request profiler for axum applications.
//!
//! A middleware runs every registered [`Collector`] against each
//! request/response pair, stores one [`CollectionRecord`] per request and
//! serves a panel (by default under `/_profiler`) to inspect them.
//!
//! ```rust,ignore
//! let config = ProfilerConfig::new(ProfilerSettings::default())?;
//! config.register::<MyCollector>()?;
//!
//! let state = Arc::new(ProfilerState::connect(config).await?);
//! let app = web_profiler::profile(Router::new().route("/", get(home)), state);
//! ```

pub mod collector;
pub mod config;
pub mod error;
pub mod exchange;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod pipeline;
pub mod render;
pub mod server;
pub mod storage;

pub use collector::{
    Collection, Collector, CollectorDefinition, CollectorOutcome, CollectorRegistry,
    CollectorSpec, ResultBag, Template, TemplateType,
};
pub use config::{ProfilerConfig, ProfilerSettings};
pub use error::{ProfilerError, Result};
pub use exchange::{ProfiledRequest, ProfiledResponse};
pub use pipeline::CollectionPipeline;
pub use render::Renderer;
pub use server::{create_panel_router, profile, ProfilerState};
pub use storage::{CollectionRecord, CollectionStore, MemoryStore, RedisStore};
