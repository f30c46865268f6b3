use axum::{routing::get, Router};
use metrics::gauge;
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

use crate::registry::SourceRegistry;

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global Prometheus recorder and publish registry-level gauges.
    /// Fails if a recorder is already installed in this process.
    pub fn init(registry: &SourceRegistry) -> Result<Self, BuildError> {
        let handle = PrometheusBuilder::new().install_recorder()?;

        gauge!("registry_sources").set(registry.len() as f64);
        for meta in registry.sources() {
            gauge!("source_refresh_interval_ms", "source" => meta.id.to_string())
                .set(meta.interval.as_millis() as f64);
        }

        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router<S>(&self) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
