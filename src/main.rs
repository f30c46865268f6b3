//! newswire — binary entrypoint.
//! Loads configuration and the source registry, wires the cache and the fetch
//! coordinator, and serves the HTTP facade.

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use newswire::config::{AppConfig, LogFormat};
use newswire::ingest::scheduler::spawn_warmer;
use newswire::metrics::Metrics;
use newswire::registry::load_registry_from;

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("newswire=info,warn"));

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
        LogFormat::Compact => registry.with(fmt::layer().compact()).init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();

    let cfg = AppConfig::from_env().context("reading configuration")?;
    init_tracing(cfg.log_format);

    let registry = load_registry_from(&cfg.sources_path)?;
    tracing::info!(
        sources = registry.len(),
        cache = ?cfg.cache,
        fetch_timeout_ms = cfg.fetch_timeout.as_millis() as u64,
        bypass_enabled = cfg.admin_token.is_some(),
        "registry loaded"
    );

    let metrics = match Metrics::init(&registry) {
        Ok(m) => Some(m),
        Err(e) => {
            tracing::warn!(error = %e, "prometheus recorder not installed; /metrics disabled");
            None
        }
    };

    let state = newswire::build_state(&cfg, registry)?;

    if let Some(every) = cfg.warm_interval {
        spawn_warmer(state.coordinator.clone(), state.registry.clone(), every);
    }

    let mut app = newswire::router(state);
    if let Some(m) = &metrics {
        app = app.merge(m.router());
    }

    let listener = tokio::net::TcpListener::bind(cfg.bind)
        .await
        .with_context(|| format!("binding {}", cfg.bind))?;
    tracing::info!(addr = %cfg.bind, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown requested");
        })
        .await
        .context("http server")
}
