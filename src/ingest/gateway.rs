//! Source gateway: runs one source's fetcher under a hard timeout and its own
//! failure boundary, classifying every failure as timeout / upstream / parse.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::{counter, histogram};

use crate::error::FetchError;
use crate::ingest::types::{RawItem, SourceFetcher, SourceId};

#[derive(Clone, Default)]
pub struct SourceGateway {
    fetchers: Arc<HashMap<SourceId, Arc<dyn SourceFetcher>>>,
}

impl SourceGateway {
    pub fn new(fetchers: HashMap<SourceId, Arc<dyn SourceFetcher>>) -> Self {
        Self {
            fetchers: Arc::new(fetchers),
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.fetchers.contains_key(id)
    }

    /// Fetch raw records for `id`. The caller never waits longer than `timeout`.
    ///
    /// The fetcher runs in a spawned task: a panic surfaces as `Upstream`, and on
    /// timeout the task is aborted.
    pub async fn fetch(&self, id: &SourceId, timeout: Duration) -> Result<Vec<RawItem>, FetchError> {
        crate::ingest::ensure_metrics_described();

        let Some(fetcher) = self.fetchers.get(id.as_str()).cloned() else {
            return Err(FetchError::Upstream(format!("no fetcher registered for `{id}`")));
        };

        let fetcher_name = fetcher.name().to_string();
        let t0 = Instant::now();
        let mut task = tokio::spawn(async move { fetcher.fetch_latest().await });

        let outcome = match tokio::time::timeout(timeout, &mut task).await {
            Ok(Ok(res)) => res,
            Ok(Err(join_err)) => Err(FetchError::Upstream(format!("fetcher task failed: {join_err}"))),
            Err(_elapsed) => {
                task.abort();
                Err(FetchError::Timeout(timeout))
            }
        };

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("gateway_fetch_ms", "source" => id.to_string()).record(ms);

        match &outcome {
            Ok(items) => {
                tracing::debug!(source = %id, fetcher = %fetcher_name, count = items.len(), elapsed_ms = ms, "source fetched");
            }
            Err(e) => {
                counter!("gateway_fetch_errors_total", "source" => id.to_string(), "kind" => e.kind())
                    .increment(1);
                tracing::warn!(source = %id, fetcher = %fetcher_name, kind = e.kind(), error = %e, elapsed_ms = ms, "source fetch failed");
            }
        }
        outcome
    }
}
