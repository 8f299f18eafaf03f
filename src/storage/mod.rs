//! Persistence of collection records.
//!
//! The profiler only needs four things from a store: save one record,
//! fetch one by token, list the most recent ones, and drop everything.

pub mod memory;
pub mod redis_store;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::collector::Collection;
use crate::config::{StorageKind, StorageSettings};
use crate::error::{ProfilerError, Result};
use crate::exchange::{ProfiledRequest, ProfiledResponse};

pub use self::memory::MemoryStore;
pub use self::redis_store::RedisStore;

/// Everything persisted for one profiled request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionRecord {
    pub token: String,
    pub created_at: DateTime<Utc>,
    pub method: String,
    pub url: String,
    pub status: u16,
    pub duration_us: u64,
    pub results: Collection,
}

impl CollectionRecord {
    /// Wrap a finished collection under a fresh token.
    pub fn new(request: &ProfiledRequest, response: &ProfiledResponse, results: Collection) -> Self {
        Self {
            token: new_token(),
            created_at: request.started_at(),
            method: request.method().to_string(),
            url: request.uri().to_string(),
            status: response.status().as_u16(),
            duration_us: request.runtime().as_micros() as u64,
            results,
        }
    }
}

/// Short, URL-safe, unique record token.
pub fn new_token() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

#[async_trait]
pub trait CollectionStore: Send + Sync + 'static {
    async fn save(&self, record: CollectionRecord) -> Result<()>;

    async fn find(&self, token: &str) -> Result<Option<CollectionRecord>>;

    /// Newest first.
    async fn recent(&self, limit: usize) -> Result<Vec<CollectionRecord>>;

    /// Drop every record. Returns how many were removed.
    async fn clear(&self) -> Result<usize>;
}

/// Build the store selected by the settings.
pub async fn connect(settings: &StorageSettings) -> Result<Arc<dyn CollectionStore>> {
    match settings.kind {
        StorageKind::Memory => Ok(Arc::new(MemoryStore::new(settings.capacity))),
        StorageKind::Redis => {
            let url = settings
                .url
                .as_deref()
                .ok_or_else(|| ProfilerError::Config("redis storage requires a url".into()))?;
            let store = RedisStore::connect(url, settings.capacity).await?;
            Ok(Arc::new(store))
        }
    }
}
