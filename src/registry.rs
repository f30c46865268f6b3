// src/registry.rs
//! Source registry: which sources exist, how often each may be refreshed, and
//! how each is fetched. Loaded from `config/sources.toml` (or the JSON twin).

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::RegistryError;
use crate::ingest::gateway::SourceGateway;
use crate::ingest::providers::{json_feed::JsonFeedFetcher, rss::RssFetcher};
use crate::ingest::types::{SourceFetcher, SourceId};

pub const DEFAULT_SOURCES_PATH: &str = "config/sources.toml";
pub const ENV_SOURCES_PATH: &str = "NEWSWIRE_SOURCES_PATH";

const DEFAULT_INTERVAL_SECS: u64 = 600;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Rss,
    JsonFeed,
}

/// One `[[source]]` block as written in the config file.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceSpec {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub home: Option<String>,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    pub kind: SourceKind,
    pub url: String,
}

fn default_interval_secs() -> u64 {
    DEFAULT_INTERVAL_SECS
}

#[derive(Debug, Deserialize)]
struct RegistryFile {
    #[serde(rename = "source", alias = "sources", default)]
    sources: Vec<SourceSpec>,
}

/// Display metadata plus refresh interval for one source.
#[derive(Debug, Clone, Serialize)]
pub struct SourceMeta {
    pub id: SourceId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub home: Option<String>,
    #[serde(rename = "interval", serialize_with = "ser_millis")]
    pub interval: Duration,
}

fn ser_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

#[derive(Default, Clone)]
pub struct SourceRegistry {
    meta: BTreeMap<SourceId, SourceMeta>,
    fetchers: HashMap<SourceId, Arc<dyn SourceFetcher>>,
}

impl std::fmt::Debug for SourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceRegistry")
            .field("meta", &self.meta)
            .field("fetchers", &self.fetchers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a source with an explicit fetcher.
    pub fn register(
        &mut self,
        meta: SourceMeta,
        fetcher: Arc<dyn SourceFetcher>,
    ) -> Result<(), RegistryError> {
        if meta.id.as_str().trim().is_empty() {
            return Err(RegistryError::EmptyId);
        }
        if meta.interval.is_zero() {
            return Err(RegistryError::Invalid {
                id: meta.id.to_string(),
                reason: "interval must be positive".into(),
            });
        }
        if self.meta.contains_key(&meta.id) {
            return Err(RegistryError::DuplicateId(meta.id.to_string()));
        }
        self.fetchers.insert(meta.id.clone(), fetcher);
        self.meta.insert(meta.id.clone(), meta);
        Ok(())
    }

    pub fn from_specs(specs: Vec<SourceSpec>) -> Result<Self, RegistryError> {
        let mut reg = Self::new();
        for spec in specs {
            let id = spec.id.trim().to_string();
            if reqwest::Url::parse(&spec.url).is_err() {
                return Err(RegistryError::Invalid {
                    id,
                    reason: format!("invalid url `{}`", spec.url),
                });
            }
            let fetcher: Arc<dyn SourceFetcher> = match spec.kind {
                SourceKind::Rss => Arc::new(RssFetcher::from_url(&spec.name, &spec.url)),
                SourceKind::JsonFeed => Arc::new(JsonFeedFetcher::from_url(&spec.name, &spec.url)),
            };
            let meta = SourceMeta {
                id: SourceId::new(id),
                name: spec.name,
                home: spec.home,
                interval: Duration::from_secs(spec.interval_secs),
            };
            reg.register(meta, fetcher)?;
        }
        Ok(reg)
    }

    pub fn get(&self, id: &str) -> Option<&SourceMeta> {
        self.meta.get(id)
    }

    pub fn interval(&self, id: &str) -> Option<Duration> {
        self.get(id).map(|m| m.interval)
    }

    pub fn ids(&self) -> impl Iterator<Item = &SourceId> {
        self.meta.keys()
    }

    pub fn sources(&self) -> impl Iterator<Item = &SourceMeta> {
        self.meta.values()
    }

    pub fn len(&self) -> usize {
        self.meta.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meta.is_empty()
    }

    /// Capability map handed to the gateway.
    pub fn gateway(&self) -> SourceGateway {
        SourceGateway::new(self.fetchers.clone())
    }
}

/// Load the registry from an explicit path. Supports TOML or JSON formats.
pub fn load_registry_from(path: &Path) -> Result<SourceRegistry> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading source registry from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let specs = parse_specs(&content, &ext)?;
    SourceRegistry::from_specs(specs)
        .with_context(|| format!("validating source registry {}", path.display()))
}

/// Load using env var + fallback:
/// 1) $NEWSWIRE_SOURCES_PATH
/// 2) config/sources.toml
pub fn load_registry_default() -> Result<SourceRegistry> {
    let path = std::env::var(ENV_SOURCES_PATH)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_SOURCES_PATH));
    load_registry_from(&path)
}

fn parse_specs(s: &str, hint_ext: &str) -> Result<Vec<SourceSpec>, RegistryError> {
    match hint_ext {
        "json" => parse_json(s),
        "toml" => parse_toml(s),
        _ => parse_toml(s).or_else(|_| parse_json(s)),
    }
}

fn parse_toml(s: &str) -> Result<Vec<SourceSpec>, RegistryError> {
    let f: RegistryFile = toml::from_str(s).map_err(|e| RegistryError::Format(e.to_string()))?;
    Ok(f.sources)
}

fn parse_json(s: &str) -> Result<Vec<SourceSpec>, RegistryError> {
    let f: RegistryFile =
        serde_json::from_str(s).map_err(|e| RegistryError::Format(e.to_string()))?;
    Ok(f.sources)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOML: &str = r#"
[[source]]
id = "hn"
name = "Hacker News"
home = "https://news.ycombinator.com"
kind = "rss"
url = "https://news.ycombinator.com/rss"

[[source]]
id = "feed"
name = "Some Feed"
interval_secs = 120
kind = "json_feed"
url = "https://example.com/feed.json"
"#;

    #[test]
    fn toml_registry_applies_defaults() {
        let reg = SourceRegistry::from_specs(parse_toml(TOML).unwrap()).unwrap();
        assert_eq!(reg.len(), 2);
        assert_eq!(reg.interval("hn"), Some(Duration::from_secs(600)));
        assert_eq!(reg.interval("feed"), Some(Duration::from_secs(120)));
        assert!(reg.get("missing").is_none());
        assert!(reg.gateway().contains("feed"));
    }

    #[test]
    fn json_registry_uses_same_shape() {
        let json = r#"{"sources":[{"id":"a","name":"A","kind":"rss","url":"https://a.com/rss"}]}"#;
        let reg = SourceRegistry::from_specs(parse_specs(json, "json").unwrap()).unwrap();
        assert_eq!(reg.ids().map(|i| i.as_str()).collect::<Vec<_>>(), vec!["a"]);
    }

    #[test]
    fn duplicate_and_empty_ids_are_rejected() {
        let dup = r#"
[[source]]
id = "a"
name = "A"
kind = "rss"
url = "https://a.com/rss"
[[source]]
id = "a"
name = "A2"
kind = "rss"
url = "https://a.com/rss2"
"#;
        let err = SourceRegistry::from_specs(parse_toml(dup).unwrap()).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateId(id) if id == "a"));

        let empty = r#"[[source]]
id = "  "
name = "E"
kind = "rss"
url = "https://e.com"
"#;
        let err = SourceRegistry::from_specs(parse_toml(empty).unwrap()).unwrap_err();
        assert!(matches!(err, RegistryError::EmptyId));
    }

    #[test]
    fn meta_serializes_interval_in_millis() {
        let reg = SourceRegistry::from_specs(parse_toml(TOML).unwrap()).unwrap();
        let v = serde_json::to_value(reg.get("feed").unwrap()).unwrap();
        assert_eq!(v["interval"], 120_000);
        assert!(v.get("home").is_none());
    }

    #[test]
    fn load_from_file_reports_path() {
        let tmp = tempfile::tempdir().unwrap();
        let p = tmp.path().join("sources.toml");
        std::fs::write(&p, TOML).unwrap();
        assert_eq!(load_registry_from(&p).unwrap().len(), 2);

        let err = load_registry_from(&tmp.path().join("nope.toml")).unwrap_err();
        assert!(format!("{err:#}").contains("nope.toml"));
    }
}
