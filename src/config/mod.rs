// src/config/mod.rs
//! Process configuration read from the environment (after `.env` is loaded).

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::coordinator::CoordinatorConfig;
use crate::registry::{DEFAULT_SOURCES_PATH, ENV_SOURCES_PATH};

pub const ENV_BIND: &str = "NEWSWIRE_BIND";
pub const ENV_CACHE_DIR: &str = "NEWSWIRE_CACHE_DIR";
pub const ENV_FETCH_TIMEOUT_MS: &str = "NEWSWIRE_FETCH_TIMEOUT_MS";
pub const ENV_JOIN_TIMEOUT_MS: &str = "NEWSWIRE_JOIN_TIMEOUT_MS";
pub const ENV_ADMIN_TOKEN: &str = "NEWSWIRE_ADMIN_TOKEN";
pub const ENV_WARM_INTERVAL_SECS: &str = "NEWSWIRE_WARM_INTERVAL_SECS";
pub const ENV_LOG_FORMAT: &str = "NEWSWIRE_LOG_FORMAT";

pub const DEFAULT_BIND: &str = "0.0.0.0:8080";
pub const DEFAULT_FETCH_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheBackend {
    Memory,
    File(PathBuf),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind: SocketAddr,
    pub sources_path: PathBuf,
    pub cache: CacheBackend,
    pub fetch_timeout: Duration,
    pub join_timeout: Option<Duration>,
    /// Bearer token that unlocks `latest=true`. `None` means bypass is never honoured.
    pub admin_token: Option<String>,
    pub warm_interval: Option<Duration>,
    pub log_format: LogFormat,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Build from an arbitrary key lookup; empty values count as unset.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |k: &str| get(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bind = get(ENV_BIND)
            .unwrap_or_else(|| DEFAULT_BIND.to_string())
            .parse::<SocketAddr>()
            .with_context(|| format!("parsing {ENV_BIND}"))?;

        let sources_path = get(ENV_SOURCES_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SOURCES_PATH));

        let cache = match get(ENV_CACHE_DIR) {
            Some(dir) => CacheBackend::File(PathBuf::from(dir)),
            None => CacheBackend::Memory,
        };

        let fetch_timeout = parse_u64(get(ENV_FETCH_TIMEOUT_MS), ENV_FETCH_TIMEOUT_MS)?
            .map(Duration::from_millis)
            .unwrap_or(Duration::from_millis(DEFAULT_FETCH_TIMEOUT_MS));
        if fetch_timeout.is_zero() {
            anyhow::bail!("{ENV_FETCH_TIMEOUT_MS} must be positive");
        }

        let join_timeout =
            parse_u64(get(ENV_JOIN_TIMEOUT_MS), ENV_JOIN_TIMEOUT_MS)?.map(Duration::from_millis);
        let warm_interval = parse_u64(get(ENV_WARM_INTERVAL_SECS), ENV_WARM_INTERVAL_SECS)?
            .filter(|s| *s > 0)
            .map(Duration::from_secs);

        let log_format = match get(ENV_LOG_FORMAT).map(|v| v.to_ascii_lowercase()).as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Compact,
        };

        Ok(Self {
            bind,
            sources_path,
            cache,
            fetch_timeout,
            join_timeout,
            admin_token: get(ENV_ADMIN_TOKEN),
            warm_interval,
            log_format,
        })
    }

    pub fn coordinator(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            fetch_timeout: self.fetch_timeout,
            join_timeout: self.join_timeout,
        }
    }
}

fn parse_u64(raw: Option<String>, name: &str) -> Result<Option<u64>> {
    raw.map(|s| s.parse::<u64>().with_context(|| format!("parsing {name}={s}")))
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn cfg(pairs: &[(&str, &str)]) -> Result<AppConfig> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let c = cfg(&[]).unwrap();
        assert_eq!(c.bind.port(), 8080);
        assert_eq!(c.cache, CacheBackend::Memory);
        assert_eq!(c.fetch_timeout, Duration::from_secs(10));
        assert_eq!(c.join_timeout, None);
        assert_eq!(c.admin_token, None);
        assert_eq!(c.log_format, LogFormat::Compact);
    }

    #[test]
    fn overrides_are_applied() {
        let c = cfg(&[
            (ENV_CACHE_DIR, "/var/cache/newswire"),
            (ENV_FETCH_TIMEOUT_MS, "2500"),
            (ENV_JOIN_TIMEOUT_MS, "300"),
            (ENV_ADMIN_TOKEN, " s3cret "),
            (ENV_WARM_INTERVAL_SECS, "0"),
            (ENV_LOG_FORMAT, "JSON"),
        ])
        .unwrap();
        assert_eq!(c.cache, CacheBackend::File("/var/cache/newswire".into()));
        assert_eq!(c.coordinator().fetch_timeout, Duration::from_millis(2500));
        assert_eq!(c.coordinator().join_timeout, Some(Duration::from_millis(300)));
        assert_eq!(c.admin_token.as_deref(), Some("s3cret"));
        assert_eq!(c.warm_interval, None);
        assert_eq!(c.log_format, LogFormat::Json);
    }

    #[test]
    fn bad_numbers_fail_with_the_variable_name() {
        let err = cfg(&[(ENV_FETCH_TIMEOUT_MS, "soon")]).unwrap_err();
        assert!(format!("{err:#}").contains(ENV_FETCH_TIMEOUT_MS));
        assert!(cfg(&[(ENV_FETCH_TIMEOUT_MS, "0")]).is_err());
        assert!(cfg(&[(ENV_BIND, "not-an-addr")]).is_err());
    }
}
