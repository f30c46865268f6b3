// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod cache;
pub mod clock;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod registry;

use std::sync::Arc;

use anyhow::{Context, Result};

pub use crate::api::router;
pub use crate::coordinator::{FetchCoordinator, Origin, Resolved};

use crate::cache::{file::FileStore, memory::MemoryStore, CacheStore};
use crate::config::{AppConfig, CacheBackend};
use crate::registry::SourceRegistry;

/// Wire the store, gateway and coordinator for `registry` according to `cfg`.
pub fn build_state(cfg: &AppConfig, registry: SourceRegistry) -> Result<api::AppState> {
    let store: Arc<dyn CacheStore> = match &cfg.cache {
        CacheBackend::Memory => Arc::new(MemoryStore::new()),
        CacheBackend::File(dir) => Arc::new(
            FileStore::open(dir)
                .with_context(|| format!("opening cache directory {}", dir.display()))?,
        ),
    };
    let coordinator = FetchCoordinator::new(store, registry.gateway(), cfg.coordinator());
    Ok(api::AppState::new(
        Arc::new(coordinator),
        Arc::new(registry),
        cfg.admin_token.clone(),
    ))
}
