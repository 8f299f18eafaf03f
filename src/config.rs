//! Profiler settings and the long-lived configuration object.
//!
//! `ProfilerSettings` is plain data, loadable from YAML. `ProfilerConfig`
//! pairs it with the one [`CollectorRegistry`] shared by the middleware
//! and the panel.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::collector::builtin::{
    RequestCollector, ResponseCollector, ServerCollector, TimeCollector,
};
use crate::collector::{Collector, CollectorDefinition, CollectorRegistry};
use crate::error::{ProfilerError, Result};

// ─── Defaults ────────────────────────────────────────────────────

pub const DEFAULT_PATH_PREFIX: &str = "/_profiler";
/// Records listed on the panel index.
pub const DEFAULT_HISTORY_LIMIT: usize = 20;
/// Records kept by the store before the oldest are evicted.
pub const DEFAULT_STORAGE_CAPACITY: usize = 1_000;
pub const DEFAULT_PERSIST_TIMEOUT_MS: u64 = 500;
/// Largest HTML body buffered for toolbar injection.
pub const DEFAULT_MAX_INJECT_BYTES: usize = 2 * 1024 * 1024;

// ─── Settings ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfilerSettings {
    /// When false the middleware passes requests through untouched.
    pub enabled: bool,
    /// Mount point of the panel routes.
    pub path_prefix: String,
    pub history_limit: usize,
    /// Root for FILE collector templates.
    pub templates_root: PathBuf,
    pub persist_timeout_ms: u64,
    pub max_inject_bytes: usize,
    pub storage: StorageSettings,
}

impl Default for ProfilerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            path_prefix: DEFAULT_PATH_PREFIX.to_string(),
            history_limit: DEFAULT_HISTORY_LIMIT,
            templates_root: PathBuf::from("templates"),
            persist_timeout_ms: DEFAULT_PERSIST_TIMEOUT_MS,
            max_inject_bytes: DEFAULT_MAX_INJECT_BYTES,
            storage: StorageSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    #[default]
    Memory,
    Redis,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub kind: StorageKind,
    /// Required for `redis`, e.g. `redis://127.0.0.1:6379/`.
    pub url: Option<String>,
    pub capacity: usize,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            kind: StorageKind::Memory,
            url: None,
            capacity: DEFAULT_STORAGE_CAPACITY,
        }
    }
}

impl ProfilerSettings {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let settings: Self = serde_yaml::from_str(yaml)
            .map_err(|e| ProfilerError::Config(format!("invalid YAML: {e}")))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| ProfilerError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_yaml(&yaml)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.path_prefix.starts_with('/') || self.path_prefix.trim_end_matches('/').is_empty() {
            return Err(ProfilerError::Config(format!(
                "path_prefix must start with '/' and not be the root, got {:?}",
                self.path_prefix
            )));
        }
        if self.history_limit == 0 {
            return Err(ProfilerError::Config("history_limit must be > 0".into()));
        }
        if self.storage.capacity == 0 {
            return Err(ProfilerError::Config("storage.capacity must be > 0".into()));
        }
        if self.storage.kind == StorageKind::Redis && self.storage.url.is_none() {
            return Err(ProfilerError::Config("storage.url is required for redis".into()));
        }
        Ok(())
    }

    /// Prefix without a trailing slash.
    pub fn prefix(&self) -> &str {
        self.path_prefix.trim_end_matches('/')
    }

    pub fn persist_timeout(&self) -> Duration {
        Duration::from_millis(self.persist_timeout_ms)
    }
}

// ─── ProfilerConfig ──────────────────────────────────────────────

/// Settings plus the shared collector registry.
///
/// Built once at startup and handed to the middleware and the panel.
#[derive(Debug, Clone)]
pub struct ProfilerConfig {
    settings: ProfilerSettings,
    collectors: Arc<CollectorRegistry>,
}

impl ProfilerConfig {
    /// Config with the built-in `time`, `request`, `response` and `server`
    /// collectors registered.
    pub fn new(settings: ProfilerSettings) -> Result<Self> {
        let config = Self::empty(settings)?;
        config.register::<TimeCollector>()?;
        config.register::<RequestCollector>()?;
        config.register::<ResponseCollector>()?;
        config.register::<ServerCollector>()?;
        Ok(config)
    }

    /// Config with no collectors registered.
    pub fn empty(settings: ProfilerSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            settings,
            collectors: Arc::new(CollectorRegistry::new()),
        })
    }

    pub fn settings(&self) -> &ProfilerSettings {
        &self.settings
    }

    pub fn collectors(&self) -> &Arc<CollectorRegistry> {
        &self.collectors
    }

    pub fn register<C: Collector>(&self) -> Result<Arc<CollectorDefinition>> {
        self.collectors.add::<C>()
    }

    pub fn unregister<C: Collector>(&self) -> Result<()> {
        self.collectors.remove::<C>()
    }

    pub fn definition_by_name(&self, name: &str) -> Option<Arc<CollectorDefinition>> {
        self.collectors.by_name(name)
    }
}
