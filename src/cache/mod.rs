//! Per-source cache: entry type and the storage contract.
//!
//! A store only has to keep reads and writes atomic per key. Backends:
//! [`memory::MemoryStore`] and [`file::FileStore`].

pub mod file;
pub mod memory;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::ingest::types::{NewsItem, SourceId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntryStatus {
    Fresh,
    StaleServed,
}

/// Output of exactly one completed fetch for one source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub source_id: SourceId,
    /// Source-provided ranking order.
    pub items: Vec<NewsItem>,
    pub fetched_at: DateTime<Utc>,
    pub status: EntryStatus,
}

impl CacheEntry {
    pub fn fresh(source_id: SourceId, items: Vec<NewsItem>, fetched_at: DateTime<Utc>) -> Self {
        Self {
            source_id,
            items,
            fetched_at,
            status: EntryStatus::Fresh,
        }
    }

    /// Copy of this entry annotated as served after a failed refresh.
    pub fn as_stale_served(&self) -> Self {
        Self {
            status: EntryStatus::StaleServed,
            ..self.clone()
        }
    }

    /// `now - fetched_at < interval`. Entries stamped in the future count as fresh.
    pub fn is_fresh(&self, now: DateTime<Utc>, interval: Duration) -> bool {
        match (now - self.fetched_at).to_std() {
            Ok(age) => age < interval,
            Err(_) => true,
        }
    }
}

#[async_trait]
pub trait CacheStore: Send + Sync {
    /// `Ok(None)` is a cold cache for this source.
    async fn read(&self, id: &SourceId) -> Result<Option<CacheEntry>, StoreError>;

    /// Replace the entry for `entry.source_id`. On failure the previous entry is kept.
    async fn write(&self, entry: &CacheEntry) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn freshness_is_strictly_less_than_interval() {
        let t0 = Utc::now();
        let e = CacheEntry::fresh("s".into(), vec![], t0);
        let ten = Duration::from_secs(600);
        assert!(e.is_fresh(t0, ten));
        assert!(e.is_fresh(t0 + chrono::Duration::seconds(599), ten));
        assert!(!e.is_fresh(t0 + chrono::Duration::seconds(600), ten));
        assert!(e.is_fresh(t0 - chrono::Duration::seconds(5), ten));
    }

    #[test]
    fn stale_served_copy_keeps_payload() {
        let e = CacheEntry::fresh("s".into(), vec![], Utc::now());
        let s = e.as_stale_served();
        assert_eq!(s.status, EntryStatus::StaleServed);
        assert_eq!(s.fetched_at, e.fetched_at);
        assert_eq!(serde_json::to_value(s.status).unwrap(), "stale-served");
    }
}
