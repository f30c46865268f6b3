//! Error taxonomy shared by the gateway, the cache stores and the coordinator.

use std::time::Duration;

use thiserror::Error;

use crate::ingest::types::SourceId;

/// Why a single upstream fetch failed.
///
/// Every concrete fetcher maps its failures onto one of these three kinds so the
/// coordinator can apply one fallback policy regardless of the source.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("upstream did not respond within {0:?}")]
    Timeout(Duration),
    #[error("upstream error: {0}")]
    Upstream(String),
    #[error("payload could not be parsed: {0}")]
    Parse(String),
}

impl FetchError {
    pub fn upstream(e: impl std::fmt::Display) -> Self {
        Self::Upstream(e.to_string())
    }

    pub fn parse(e: impl std::fmt::Display) -> Self {
        Self::Parse(e.to_string())
    }

    /// Short label used for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout(_) => "timeout",
            Self::Upstream(_) => "upstream",
            Self::Parse(_) => "parse",
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::parse(e)
        } else {
            Self::upstream(e)
        }
    }
}

/// Failure surfaced by `FetchCoordinator::resolve`.
///
/// Only raised on a cold cache: any prior entry turns a fetch failure into a
/// stale-fallback response instead.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("source `{id}` is unavailable and has no cached data: {cause}")]
    SourceUnavailable { id: SourceId, cause: FetchError },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cache io: {0}")]
    Io(#[from] std::io::Error),
    #[error("cache entry encoding: {0}")]
    Encoding(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("source id must not be empty")]
    EmptyId,
    #[error("duplicate source id `{0}`")]
    DuplicateId(String),
    #[error("source `{id}`: {reason}")]
    Invalid { id: String, reason: String },
    #[error("unsupported registry format: {0}")]
    Format(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_stable_labels() {
        assert_eq!(FetchError::Timeout(Duration::from_secs(1)).kind(), "timeout");
        assert_eq!(FetchError::upstream("503").kind(), "upstream");
        assert_eq!(FetchError::parse("bad xml").kind(), "parse");
    }

    #[test]
    fn unavailable_mentions_source_and_cause() {
        let e = ResolveError::SourceUnavailable {
            id: SourceId::from("hn"),
            cause: FetchError::upstream("502 Bad Gateway"),
        };
        let msg = e.to_string();
        assert!(msg.contains("`hn`"));
        assert!(msg.contains("502"));
    }
}
