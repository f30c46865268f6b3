// src/ingest/scheduler.rs
use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, gauge};
use tokio::task::JoinHandle;

use crate::coordinator::{FetchCoordinator, ResolveRequest};
use crate::registry::SourceRegistry;

/// Resolve every registered source once. Fresh entries are left alone, so this
/// only hits upstream for sources whose interval has elapsed.
/// Returns (ok, unavailable).
pub async fn warm_once(coordinator: &FetchCoordinator, registry: &SourceRegistry) -> (usize, usize) {
    let reqs: Vec<ResolveRequest> = registry
        .sources()
        .map(|m| ResolveRequest {
            id: m.id.clone(),
            interval: m.interval,
            force: false,
        })
        .collect();

    let results = coordinator.resolve_many(reqs).await;
    let ok = results.iter().filter(|r| r.is_ok()).count();
    (ok, results.len() - ok)
}

/// Spawn a background warmer that ticks every `every`.
pub fn spawn_warmer(
    coordinator: Arc<FetchCoordinator>,
    registry: Arc<SourceRegistry>,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let (ok, unavailable) = warm_once(&coordinator, &registry).await;

            counter!("warmer_runs_total").increment(1);
            gauge!("warmer_last_run_ts").set(chrono::Utc::now().timestamp() as f64);

            tracing::info!(target: "warmer", ok, unavailable, "warm tick");
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::memory::MemoryStore;
    use crate::coordinator::CoordinatorConfig;
    use crate::error::FetchError;
    use crate::ingest::providers::fixed::FixedFetcher;
    use crate::ingest::types::RawItem;
    use crate::registry::SourceMeta;

    fn meta(id: &str) -> SourceMeta {
        SourceMeta {
            id: id.into(),
            name: id.to_uppercase(),
            home: None,
            interval: Duration::from_secs(60),
        }
    }

    #[tokio::test]
    async fn warm_once_counts_each_source() {
        let good = FixedFetcher::ok(vec![RawItem::new("1", "one", "https://a.com/1")]);
        let bad = FixedFetcher::failing(FetchError::upstream("down"));
        let mut reg = SourceRegistry::new();
        reg.register(meta("good"), Arc::new(good.clone())).unwrap();
        reg.register(meta("bad"), Arc::new(bad)).unwrap();

        let coord = FetchCoordinator::new(
            Arc::new(MemoryStore::new()),
            reg.gateway(),
            CoordinatorConfig::default(),
        );

        assert_eq!(warm_once(&coord, &reg).await, (1, 1));
        // second pass is served from cache
        assert_eq!(warm_once(&coord, &reg).await, (1, 1));
        assert_eq!(good.calls(), 1);
    }
}
