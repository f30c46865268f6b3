//! Fetch coordinator: decides per source whether to serve the cache, start a
//! refresh, join a refresh already in flight, or fall back to stale data.
//!
//! At most one refresh per source is in flight. It runs in a detached task so a
//! reader going away never cancels it, and every reader that arrived while it
//! was running receives the same outcome through a `watch` channel.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use tokio::sync::watch;

use crate::cache::{CacheEntry, CacheStore};
use crate::clock::{Clock, SystemClock};
use crate::error::{FetchError, ResolveError};
use crate::ingest::gateway::SourceGateway;
use crate::ingest::normalize_batch;
use crate::ingest::types::{NewsItem, SourceId};

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("coordinator_resolve_total", "Resolve calls by origin.");
        describe_counter!(
            "coordinator_coalesced_total",
            "Resolve calls that joined a refresh already in flight."
        );
        describe_counter!(
            "coordinator_unavailable_total",
            "Resolve calls that failed on a cold cache."
        );
        describe_counter!(
            "cache_write_errors_total",
            "Fresh fetches that could not be persisted."
        );
    });
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    FreshCache,
    FreshFetch,
    StaleFetchFallback,
}

impl Origin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FreshCache => "fresh-cache",
            Self::FreshFetch => "fresh-fetch",
            Self::StaleFetchFallback => "stale-fetch-fallback",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub entry: CacheEntry,
    pub origin: Origin,
}

impl Resolved {
    pub fn items(&self) -> &[NewsItem] {
        &self.entry.items
    }

    pub fn updated_time(&self) -> DateTime<Utc> {
        self.entry.fetched_at
    }
}

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Hard upper bound on one upstream fetch.
    pub fetch_timeout: Duration,
    /// If set, a reader waiting on an in-flight refresh gives up after this long
    /// and takes the prior entry as a stale fallback. Readers without a prior
    /// entry keep waiting.
    pub join_timeout: Option<Duration>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(10),
            join_timeout: None,
        }
    }
}

/// One entry of a batch resolve.
#[derive(Debug, Clone)]
pub struct ResolveRequest {
    pub id: SourceId,
    pub interval: Duration,
    pub force: bool,
}

type Settled = Result<Resolved, ResolveError>;
type Outcome = watch::Receiver<Option<Settled>>;

/// Refresh state of one source. `inflight` is `Some` while REFRESHING.
#[derive(Default)]
struct Slot {
    inflight: Option<Outcome>,
}

pub struct FetchCoordinator {
    store: Arc<dyn CacheStore>,
    gateway: SourceGateway,
    clock: Arc<dyn Clock>,
    cfg: CoordinatorConfig,
    slots: Mutex<HashMap<SourceId, Arc<tokio::sync::Mutex<Slot>>>>,
}

impl FetchCoordinator {
    pub fn new(store: Arc<dyn CacheStore>, gateway: SourceGateway, cfg: CoordinatorConfig) -> Self {
        Self::with_clock(store, gateway, cfg, Arc::new(SystemClock))
    }

    pub fn with_clock(
        store: Arc<dyn CacheStore>,
        gateway: SourceGateway,
        cfg: CoordinatorConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            gateway,
            clock,
            cfg,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Serve `id` from cache if younger than `interval`, otherwise refresh it
    /// (or join the refresh already running). `force` skips the freshness check
    /// but still coalesces with an in-flight refresh.
    pub async fn resolve(
        &self,
        id: &SourceId,
        interval: Duration,
        force: bool,
    ) -> Result<Resolved, ResolveError> {
        ensure_metrics_described();

        let res = self.resolve_inner(id, interval, force).await;
        match &res {
            Ok(r) => {
                counter!("coordinator_resolve_total", "origin" => r.origin.as_str()).increment(1);
                tracing::debug!(source = %id, origin = r.origin.as_str(), items = r.items().len(), force, "resolved");
            }
            Err(e) => {
                counter!("coordinator_unavailable_total").increment(1);
                tracing::warn!(source = %id, error = %e, "source unavailable");
            }
        }
        res
    }

    /// Resolve several sources concurrently. Results come back in input order;
    /// one slow source only delays its own slot in the output.
    pub async fn resolve_many(&self, reqs: Vec<ResolveRequest>) -> Vec<Result<Resolved, ResolveError>> {
        join_all(
            reqs.iter()
                .map(|r| self.resolve(&r.id, r.interval, r.force)),
        )
        .await
    }

    async fn resolve_inner(&self, id: &SourceId, interval: Duration, force: bool) -> Settled {
        let prior = self.read_entry(id).await;
        if !force {
            if let Some(hit) = self.fresh_hit(prior.as_ref(), interval) {
                return Ok(hit);
            }
        }

        let slot = self.slot(id);
        let mut guard = slot.lock().await;

        if let Some(rx) = guard.inflight.clone() {
            if !is_abandoned(&rx) {
                drop(guard);
                counter!("coordinator_coalesced_total").increment(1);
                tracing::debug!(source = %id, force, "joining in-flight refresh");
                return self.join(id, rx, prior, &slot).await;
            }
            tracing::warn!(source = %id, "discarding abandoned refresh");
            guard.inflight = None;
        }

        // Someone may have finished a refresh between our first read and the lock.
        let prior = self.read_entry(id).await;
        if !force {
            if let Some(hit) = self.fresh_hit(prior.as_ref(), interval) {
                return Ok(hit);
            }
        }

        let (tx, rx) = watch::channel(None);
        guard.inflight = Some(rx.clone());
        drop(guard);

        tracing::debug!(source = %id, force, cold = prior.is_none(), "starting refresh");
        let task = RefreshTask {
            id: id.clone(),
            prior: prior.clone(),
            store: Arc::clone(&self.store),
            gateway: self.gateway.clone(),
            clock: Arc::clone(&self.clock),
            timeout: self.cfg.fetch_timeout,
            slot: Arc::clone(&slot),
        };
        tokio::spawn(task.run(tx));

        self.join(id, rx, prior, &slot).await
    }

    fn fresh_hit(&self, entry: Option<&CacheEntry>, interval: Duration) -> Option<Resolved> {
        entry
            .filter(|e| e.is_fresh(self.clock.now(), interval))
            .map(|e| Resolved {
                entry: e.clone(),
                origin: Origin::FreshCache,
            })
    }

    /// Store read failures count as a cold cache.
    async fn read_entry(&self, id: &SourceId) -> Option<CacheEntry> {
        match self.store.read(id).await {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!(source = %id, error = %e, "cache read failed; treating as cold");
                None
            }
        }
    }

    fn slot(&self, id: &SourceId) -> Arc<tokio::sync::Mutex<Slot>> {
        let mut slots = self.slots.lock().expect("slot map poisoned");
        Arc::clone(slots.entry(id.clone()).or_default())
    }

    async fn join(
        &self,
        id: &SourceId,
        mut rx: Outcome,
        prior: Option<CacheEntry>,
        slot: &tokio::sync::Mutex<Slot>,
    ) -> Settled {
        let waited = {
            let wait = async { rx.wait_for(Option::is_some).await.map(|v| (*v).clone()) };
            match (self.cfg.join_timeout, prior.as_ref()) {
                (Some(budget), Some(p)) => match tokio::time::timeout(budget, wait).await {
                    Ok(r) => r,
                    Err(_) => {
                        tracing::debug!(source = %id, ?budget, "join budget elapsed; serving prior entry");
                        return Ok(Resolved {
                            entry: p.as_stale_served(),
                            origin: Origin::StaleFetchFallback,
                        });
                    }
                },
                _ => wait.await,
            }
        };

        match waited {
            Ok(Some(settled)) => settled,
            _ => {
                // Refresh task died without reporting; free the slot for the next caller.
                let mut g = slot.lock().await;
                if g.inflight.as_ref().is_some_and(|cur| cur.same_channel(&rx)) {
                    g.inflight = None;
                }
                drop(g);
                let cause = FetchError::Upstream("refresh task aborted".into());
                fallback_or_unavailable(id, prior, cause)
            }
        }
    }
}

/// A refresh whose task is gone without ever publishing an outcome.
fn is_abandoned(rx: &Outcome) -> bool {
    rx.borrow().is_none() && rx.has_changed().is_err()
}

fn fallback_or_unavailable(id: &SourceId, prior: Option<CacheEntry>, cause: FetchError) -> Settled {
    match prior {
        Some(p) => Ok(Resolved {
            entry: p.as_stale_served(),
            origin: Origin::StaleFetchFallback,
        }),
        None => Err(ResolveError::SourceUnavailable {
            id: id.clone(),
            cause,
        }),
    }
}

/// Everything the detached refresh needs, owned.
struct RefreshTask {
    id: SourceId,
    prior: Option<CacheEntry>,
    store: Arc<dyn CacheStore>,
    gateway: SourceGateway,
    clock: Arc<dyn Clock>,
    timeout: Duration,
    slot: Arc<tokio::sync::Mutex<Slot>>,
}

impl RefreshTask {
    async fn run(self, tx: watch::Sender<Option<Settled>>) {
        let outcome = match self.gateway.fetch(&self.id, self.timeout).await {
            Ok(raw) => {
                let (items, rejected) = normalize_batch(&self.id, raw);
                let entry = CacheEntry::fresh(self.id.clone(), items, self.clock.now());
                if let Err(e) = self.store.write(&entry).await {
                    counter!("cache_write_errors_total").increment(1);
                    tracing::warn!(source = %self.id, error = %e, "cache write failed; previous entry kept");
                }
                tracing::info!(source = %self.id, items = entry.items.len(), rejected, "refresh succeeded");
                Ok(Resolved {
                    entry,
                    origin: Origin::FreshFetch,
                })
            }
            Err(cause) => {
                tracing::info!(
                    source = %self.id,
                    kind = cause.kind(),
                    has_prior = self.prior.is_some(),
                    "refresh failed"
                );
                fallback_or_unavailable(&self.id, self.prior, cause)
            }
        };

        // Publish before going IDLE so a reader grabbing the channel late still sees it.
        tx.send_replace(Some(outcome));
        let mut g = self.slot.lock().await;
        if g.inflight.as_ref().is_some_and(|cur| cur.same_channel(&tx.subscribe())) {
            g.inflight = None;
        }
    }
}
