//! Request facade: HTTP routes over the fetch coordinator. No caching logic here,
//! only request validation, bypass authorization and response shaping.

use std::collections::HashSet;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tower_http::cors::CorsLayer;

use crate::coordinator::{FetchCoordinator, Origin, ResolveRequest, Resolved};
use crate::error::ResolveError;
use crate::ingest::types::{NewsItem, SourceId};
use crate::registry::{SourceMeta, SourceRegistry};

#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<FetchCoordinator>,
    pub registry: Arc<SourceRegistry>,
    pub admin_token: Option<Arc<str>>,
}

impl AppState {
    pub fn new(
        coordinator: Arc<FetchCoordinator>,
        registry: Arc<SourceRegistry>,
        admin_token: Option<String>,
    ) -> Self {
        Self {
            coordinator,
            registry,
            admin_token: admin_token.map(Arc::from),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/sources", get(list_sources))
        .route("/api/s", get(read_source))
        .route("/api/s/entire", post(read_entire))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// Outward shape of one resolved source.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SourceResponse {
    /// `success` for a fresh fetch, `cache` otherwise.
    pub status: String,
    pub id: SourceId,
    /// Epoch milliseconds of the fetch that produced `items`.
    pub updated_time: i64,
    pub items: Vec<NewsItem>,
}

impl From<Resolved> for SourceResponse {
    fn from(r: Resolved) -> Self {
        let status = match r.origin {
            Origin::FreshFetch => "success",
            Origin::FreshCache | Origin::StaleFetchFallback => "cache",
        };
        Self {
            status: status.to_string(),
            id: r.entry.source_id,
            updated_time: r.entry.fetched_at.timestamp_millis(),
            items: r.entry.items,
        }
    }
}

#[derive(Debug)]
pub enum ApiError {
    MissingId,
    UnknownSource(String),
    Unavailable(ResolveError),
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<&'a str>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, id) = match &self {
            ApiError::MissingId => (StatusCode::BAD_REQUEST, "missing source id", None),
            ApiError::UnknownSource(id) => (StatusCode::NOT_FOUND, "unknown source", Some(id.as_str())),
            ApiError::Unavailable(ResolveError::SourceUnavailable { id, .. }) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "source unavailable",
                Some(id.as_str()),
            ),
        };
        (status, Json(ErrorBody { error, id })).into_response()
    }
}

#[derive(Debug, Deserialize)]
struct ReadQuery {
    id: Option<String>,
    #[serde(default)]
    latest: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EntireReq {
    #[serde(default)]
    sources: Vec<String>,
}

async fn list_sources(State(state): State<AppState>) -> Json<Vec<SourceMeta>> {
    Json(state.registry.sources().cloned().collect())
}

async fn read_source(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(q): Query<ReadQuery>,
) -> Result<Json<SourceResponse>, ApiError> {
    let raw_id = q.id.as_deref().map(str::trim).unwrap_or_default();
    if raw_id.is_empty() {
        return Err(ApiError::MissingId);
    }
    let meta = state
        .registry
        .get(raw_id)
        .ok_or_else(|| ApiError::UnknownSource(raw_id.to_string()))?;

    let wants_latest = q.latest.as_deref().is_some_and(is_truthy);
    let force = wants_latest && is_authorized(&headers, state.admin_token.as_deref());
    if wants_latest && !force {
        tracing::debug!(source = %meta.id, "latest requested without authorization; ignored");
    }

    let resolved = state
        .coordinator
        .resolve(&meta.id, meta.interval, force)
        .await
        .map_err(ApiError::Unavailable)?;
    Ok(Json(resolved.into()))
}

/// Load a whole column of sources at once. Unknown and unavailable sources are
/// left out of the response rather than failing the batch.
async fn read_entire(
    State(state): State<AppState>,
    Json(req): Json<EntireReq>,
) -> Json<Vec<SourceResponse>> {
    let mut seen = HashSet::new();
    let reqs: Vec<ResolveRequest> = req
        .sources
        .iter()
        .filter_map(|id| state.registry.get(id.trim()))
        .filter(|meta| seen.insert(meta.id.clone()))
        .map(|meta| ResolveRequest {
            id: meta.id.clone(),
            interval: meta.interval,
            force: false,
        })
        .collect();

    let out = state
        .coordinator
        .resolve_many(reqs)
        .await
        .into_iter()
        .filter_map(Result::ok)
        .map(SourceResponse::from)
        .collect();
    Json(out)
}

fn is_truthy(v: &str) -> bool {
    matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes")
}

/// `Authorization: Bearer <token>` matching the configured admin token.
fn is_authorized(headers: &HeaderMap, token: Option<&str>) -> bool {
    let Some(expected) = token else {
        return false;
    };
    let presented = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim);
    match presented {
        // compare digests so the check does not short-circuit on the first differing byte
        Some(p) => Sha256::digest(p.as_bytes()) == Sha256::digest(expected.as_bytes()),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn truthy_values() {
        assert!(is_truthy("true"));
        assert!(is_truthy(" 1 "));
        assert!(!is_truthy("false"));
        assert!(!is_truthy(""));
    }

    #[test]
    fn bearer_token_must_match() {
        let mut h = HeaderMap::new();
        assert!(!is_authorized(&h, Some("t0k")));
        h.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer t0k"));
        assert!(is_authorized(&h, Some("t0k")));
        assert!(!is_authorized(&h, Some("other")));
        assert!(!is_authorized(&h, None));
    }
}
