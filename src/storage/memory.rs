use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{CollectionRecord, CollectionStore};
use crate::error::Result;

/// Bounded in-process store. Oldest records are evicted first.
pub struct MemoryStore {
    capacity: usize,
    records: Mutex<VecDeque<CollectionRecord>>,
}

impl MemoryStore {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            records: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
        }
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CollectionStore for MemoryStore {
    async fn save(&self, record: CollectionRecord) -> Result<()> {
        let mut records = self.records.lock();
        records.push_back(record);
        while records.len() > self.capacity {
            records.pop_front();
        }
        Ok(())
    }

    async fn find(&self, token: &str) -> Result<Option<CollectionRecord>> {
        Ok(self
            .records
            .lock()
            .iter()
            .rev()
            .find(|r| r.token == token)
            .cloned())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<CollectionRecord>> {
        let mut recent: Vec<CollectionRecord> = self.records.lock().iter().cloned().collect();
        recent.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        recent.truncate(limit);
        Ok(recent)
    }

    async fn clear(&self) -> Result<usize> {
        let mut records = self.records.lock();
        let removed = records.len();
        records.clear();
        Ok(removed)
    }
}
