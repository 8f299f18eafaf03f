use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};

use super::{CollectionRecord, CollectionStore};
use crate::error::Result;

const DEFAULT_NAMESPACE: &str = "web_profiler";

/// Store the record, index it and evict the oldest entries beyond capacity
/// in one step, so a stored record is never reported as a failed save.
///
/// KEYS: index, record key. ARGV: json, score, token, capacity, record prefix.
const SAVE_SCRIPT: &str = r"
redis.call('SET', KEYS[2], ARGV[1])
redis.call('ZADD', KEYS[1], ARGV[2], ARGV[3])
local overflow = redis.call('ZRANGE', KEYS[1], 0, -tonumber(ARGV[4]) - 1)
for _, token in ipairs(overflow) do
  redis.call('DEL', ARGV[5] .. token)
  redis.call('ZREM', KEYS[1], token)
end
return #overflow
";

/// Redis-backed store: one JSON string per record plus a sorted set of
/// tokens scored by creation time (ms since epoch).
///
/// `ConnectionManager` is cheaply cloneable and reconnects on failure, so
/// every call works on its own clone.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    capacity: usize,
    index_key: String,
    record_prefix: String,
    save_script: Script,
}

impl RedisStore {
    pub async fn connect(url: &str, capacity: usize) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        tracing::info!(url, capacity, "Connected to Redis collection store");
        Ok(Self::with_connection(conn, capacity))
    }

    pub fn with_connection(conn: ConnectionManager, capacity: usize) -> Self {
        Self {
            conn,
            capacity: capacity.max(1),
            index_key: String::new(),
            record_prefix: String::new(),
            save_script: Script::new(SAVE_SCRIPT),
        }
        .with_namespace(DEFAULT_NAMESPACE)
    }

    /// Prefix every key with `namespace` instead of `web_profiler`.
    pub fn with_namespace(mut self, namespace: impl AsRef<str>) -> Self {
        (self.index_key, self.record_prefix) = namespaced_keys(namespace.as_ref());
        self
    }

    fn record_key(&self, token: &str) -> String {
        format!("{}{token}", self.record_prefix)
    }
}

/// Index key and record key prefix under `namespace`.
fn namespaced_keys(namespace: &str) -> (String, String) {
    (
        format!("{namespace}:collections"),
        format!("{namespace}:collection:"),
    )
}

#[async_trait]
impl CollectionStore for RedisStore {
    async fn save(&self, record: CollectionRecord) -> Result<()> {
        let json = serde_json::to_string(&record)?;
        let score = record.created_at.timestamp_millis();

        let mut conn = self.conn.clone();
        let evicted: usize = self
            .save_script
            .key(&self.index_key)
            .key(self.record_key(&record.token))
            .arg(json)
            .arg(score)
            .arg(&record.token)
            .arg(self.capacity)
            .arg(&self.record_prefix)
            .invoke_async(&mut conn)
            .await?;

        if evicted > 0 {
            tracing::debug!(evicted, "Trimmed collection store");
        }
        Ok(())
    }

    async fn find(&self, token: &str) -> Result<Option<CollectionRecord>> {
        let mut conn = self.conn.clone();
        let json: Option<String> = conn.get(self.record_key(token)).await?;
        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn recent(&self, limit: usize) -> Result<Vec<CollectionRecord>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut conn = self.conn.clone();
        let tokens: Vec<String> = conn
            .zrevrange(&self.index_key, 0, limit as isize - 1)
            .await?;
        if tokens.is_empty() {
            return Ok(Vec::new());
        }

        let keys: Vec<String> = tokens.iter().map(|t| self.record_key(t)).collect();
        let values: Vec<Option<String>> = redis::cmd("MGET")
            .arg(&keys)
            .query_async(&mut conn)
            .await?;

        let mut records = Vec::with_capacity(values.len());
        for json in values.into_iter().flatten() {
            records.push(serde_json::from_str(&json)?);
        }
        Ok(records)
    }

    async fn clear(&self) -> Result<usize> {
        let mut conn = self.conn.clone();
        let tokens: Vec<String> = conn.zrange(&self.index_key, 0, -1).await?;

        let mut pipe = redis::pipe();
        pipe.atomic();
        if !tokens.is_empty() {
            let keys: Vec<String> = tokens.iter().map(|t| self.record_key(t)).collect();
            pipe.del(keys).ignore();
        }
        pipe.del(&self.index_key).ignore();
        let _: () = pipe.query_async(&mut conn).await?;

        Ok(tokens.len())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::collector::Collection;
    use crate::storage::new_token;

    // These need a running server: REDIS_URL=redis://127.0.0.1/ cargo test -- --ignored

    async fn store(capacity: usize) -> Option<RedisStore> {
        let url = std::env::var("REDIS_URL").ok()?;
        let store = RedisStore::connect(&url, capacity)
            .await
            .expect("Failed to connect to REDIS_URL")
            .with_namespace(format!("web_profiler_test:{}", new_token()));
        Some(store)
    }

    /// Records `age_ms` milliseconds old, so index order is deterministic.
    fn record(token: &str, age_ms: i64) -> CollectionRecord {
        CollectionRecord {
            token: token.into(),
            created_at: Utc::now() - Duration::milliseconds(age_ms),
            method: "GET".into(),
            url: format!("/{token}"),
            status: 200,
            duration_us: 10,
            results: Collection::new(),
        }
    }

    fn tokens(records: &[CollectionRecord]) -> Vec<&str> {
        records.iter().map(|r| r.token.as_str()).collect()
    }

    #[test]
    fn keys_are_namespaced() {
        let (index, prefix) = namespaced_keys(DEFAULT_NAMESPACE);
        assert_eq!(index, "web_profiler:collections");
        assert_eq!(prefix, "web_profiler:collection:");
    }

    #[tokio::test]
    #[ignore]
    async fn save_evicts_oldest_beyond_capacity() {
        let Some(store) = store(2).await else { return };

        store.save(record("a", 30)).await.unwrap();
        store.save(record("b", 20)).await.unwrap();
        store.save(record("c", 10)).await.unwrap();

        assert!(store.find("a").await.unwrap().is_none());
        assert_eq!(store.find("b").await.unwrap().unwrap().url, "/b");
        assert_eq!(tokens(&store.recent(10).await.unwrap()), ["c", "b"]);

        let mut conn = store.conn.clone();
        let indexed: usize = conn.zcard(&store.index_key).await.unwrap();
        assert_eq!(indexed, 2);

        store.clear().await.unwrap();
    }

    #[tokio::test]
    #[ignore]
    async fn recent_is_newest_first_and_limited() {
        let Some(store) = store(10).await else { return };

        store.save(record("old", 300)).await.unwrap();
        store.save(record("new", 100)).await.unwrap();
        store.save(record("mid", 200)).await.unwrap();

        assert_eq!(
            tokens(&store.recent(10).await.unwrap()),
            ["new", "mid", "old"]
        );
        assert_eq!(tokens(&store.recent(2).await.unwrap()), ["new", "mid"]);
        assert!(store.recent(0).await.unwrap().is_empty());

        store.clear().await.unwrap();
    }

    #[tokio::test]
    #[ignore]
    async fn clear_removes_records_and_index() {
        let Some(store) = store(10).await else { return };

        store.save(record("x", 20)).await.unwrap();
        store.save(record("y", 10)).await.unwrap();

        assert_eq!(store.clear().await.unwrap(), 2);
        assert!(store.find("x").await.unwrap().is_none());
        assert!(store.recent(10).await.unwrap().is_empty());

        let mut conn = store.conn.clone();
        let exists: bool = conn.exists(&store.index_key).await.unwrap();
        assert!(!exists);
        assert_eq!(store.clear().await.unwrap(), 0);
    }
}
