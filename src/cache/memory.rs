use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use super::{CacheEntry, CacheStore};
use crate::error::StoreError;
use crate::ingest::types::SourceId;

/// Process-local store. Entries are swapped whole under the lock.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<HashMap<SourceId, CacheEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.read().expect("memory store poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn read(&self, id: &SourceId) -> Result<Option<CacheEntry>, StoreError> {
        let g = self.inner.read().expect("memory store poisoned");
        Ok(g.get(id).cloned())
    }

    async fn write(&self, entry: &CacheEntry) -> Result<(), StoreError> {
        let mut g = self.inner.write().expect("memory store poisoned");
        g.insert(entry.source_id.clone(), entry.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn write_then_read_returns_same_entry() {
        let store = MemoryStore::new();
        let id = SourceId::from("s1");
        assert!(store.read(&id).await.unwrap().is_none());

        let e = CacheEntry::fresh(id.clone(), vec![], Utc::now());
        store.write(&e).await.unwrap();
        assert_eq!(store.read(&id).await.unwrap(), Some(e));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn later_write_replaces_whole_entry() {
        let store = MemoryStore::new();
        let id = SourceId::from("s1");
        let t0 = Utc::now();
        store.write(&CacheEntry::fresh(id.clone(), vec![], t0)).await.unwrap();
        let t1 = t0 + chrono::Duration::seconds(30);
        store.write(&CacheEntry::fresh(id.clone(), vec![], t1)).await.unwrap();
        assert_eq!(store.read(&id).await.unwrap().unwrap().fetched_at, t1);
    }
}
