// src/ingest/types.rs
use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::FetchError;

/// Opaque identifier of one content source. The set of valid ids is owned by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(String);

impl SourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for SourceId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SourceId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for SourceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// One aggregated entry, as produced by the normalizer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewsItem {
    pub id: String,
    pub title: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mobile_url: Option<String>,
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub publication_time: Option<DateTime<Utc>>,
    /// Auxiliary fields such as `diff` (rank change), `hover` or `icon`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Publication time as a source hands it over: epoch millis or a date string.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum RawTimestamp {
    Millis(i64),
    Text(String),
}

/// Unvalidated record emitted by a fetcher. Every field may be missing.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RawItem {
    pub id: Option<String>,
    pub title: Option<String>,
    pub url: Option<String>,
    pub mobile_url: Option<String>,
    pub pub_date: Option<RawTimestamp>,
    #[serde(default)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl RawItem {
    /// Shorthand for the common id/title/url triple.
    pub fn new(id: &str, title: &str, url: &str) -> Self {
        Self {
            id: Some(id.to_string()),
            title: Some(title.to_string()),
            url: Some(url.to_string()),
            ..Self::default()
        }
    }
}

/// Fetch capability of one source. Implementations classify their own failures.
#[async_trait::async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn fetch_latest(&self) -> Result<Vec<RawItem>, FetchError>;
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn news_item_serializes_camel_case_with_millis() {
        let item = NewsItem {
            id: "1".into(),
            title: "Hello".into(),
            url: "https://example.com/1".into(),
            mobile_url: Some("https://m.example.com/1".into()),
            publication_time: DateTime::from_timestamp_millis(1_700_000_000_000),
            extra: BTreeMap::new(),
        };
        let v = serde_json::to_value(&item).unwrap();
        assert_eq!(v["mobileUrl"], "https://m.example.com/1");
        assert_eq!(v["publicationTime"], 1_700_000_000_000i64);
        assert!(v.get("extra").is_none(), "empty extra is omitted");
    }

    #[test]
    fn raw_timestamp_accepts_number_or_string() {
        let a: RawItem = serde_json::from_str(r#"{"pubDate": 1700000000000}"#).unwrap();
        let b: RawItem =
            serde_json::from_str(r#"{"pubDate": "2024-01-01T00:00:00Z"}"#).unwrap();
        assert_eq!(a.pub_date, Some(RawTimestamp::Millis(1_700_000_000_000)));
        assert!(matches!(b.pub_date, Some(RawTimestamp::Text(_))));
    }
}
