// src/ingest/mod.rs
pub mod gateway;
pub mod providers;
pub mod scheduler;
pub mod types;

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use metrics::{counter, describe_counter, describe_histogram};
use once_cell::sync::OnceCell;
use time::{format_description::well_known::Rfc2822, OffsetDateTime};

use crate::ingest::types::{NewsItem, RawItem, RawTimestamp, SourceId};

const MAX_TEXT_CHARS: usize = 500;

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "normalize_kept_total",
            "Records kept after normalization."
        );
        describe_counter!(
            "normalize_rejected_total",
            "Records dropped for a missing/invalid id, title or url."
        );
        describe_histogram!("gateway_fetch_ms", "Source fetch time in milliseconds.");
        describe_counter!(
            "gateway_fetch_errors_total",
            "Source fetch failures by kind."
        );
    });
}

/// Normalize text: decode entities, strip tags, fold quotes, collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, "").to_string();

    // 3) Normalize “ ” ‘ ’ « » to ASCII quotes
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace
    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").trim().to_string();

    // 5) Length cap
    if out.chars().count() > MAX_TEXT_CHARS {
        out = out.chars().take(MAX_TEXT_CHARS).collect();
    }

    out
}

/// Accept only absolute http(s) URLs. The source's spelling is kept as is.
fn clean_url(raw: Option<&str>) -> Option<String> {
    let s = raw?.trim();
    let parsed = reqwest::Url::parse(s).ok()?;
    matches!(parsed.scheme(), "http" | "https").then(|| s.to_string())
}

fn parse_timestamp(ts: &RawTimestamp) -> Option<DateTime<Utc>> {
    match ts {
        RawTimestamp::Millis(ms) => DateTime::from_timestamp_millis(*ms),
        RawTimestamp::Text(s) => {
            let s = s.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            OffsetDateTime::parse(s, &Rfc2822)
                .ok()
                .and_then(|dt| DateTime::from_timestamp(dt.unix_timestamp(), dt.nanosecond()))
        }
    }
}

/// Shape one raw record into a `NewsItem`, or `None` if a required field is unusable.
pub fn normalize_item(raw: RawItem) -> Option<NewsItem> {
    let id = raw.id.as_deref().map(str::trim).unwrap_or_default();
    if id.is_empty() {
        return None;
    }
    let title = normalize_text(raw.title.as_deref().unwrap_or_default());
    if title.is_empty() {
        return None;
    }
    let url = clean_url(raw.url.as_deref())?;

    let mut extra = raw.extra;
    if let Some(serde_json::Value::String(hover)) = extra.get_mut("hover") {
        *hover = normalize_text(hover);
    }

    Some(NewsItem {
        id: id.to_string(),
        title,
        url,
        mobile_url: clean_url(raw.mobile_url.as_deref()),
        publication_time: raw.pub_date.as_ref().and_then(parse_timestamp),
        extra,
    })
}

/// Normalize a whole fetch result. Returns the kept items in source order plus
/// the number of rejected records. Repeated ids within the batch are rejected.
pub fn normalize_batch(source: &SourceId, raw: Vec<RawItem>) -> (Vec<NewsItem>, usize) {
    ensure_metrics_described();

    let total = raw.len();
    let mut seen: HashSet<String> = HashSet::with_capacity(total);
    let mut kept = Vec::with_capacity(total);
    let mut rejected = 0usize;

    for (idx, rec) in raw.into_iter().enumerate() {
        match normalize_item(rec) {
            Some(item) if seen.insert(item.id.clone()) => kept.push(item),
            Some(item) => {
                rejected += 1;
                tracing::debug!(%source, idx, id = %item.id, "duplicate id dropped");
            }
            None => {
                rejected += 1;
                tracing::debug!(%source, idx, "invalid record dropped");
            }
        }
    }

    counter!("normalize_kept_total", "source" => source.to_string()).increment(kept.len() as u64);
    if rejected > 0 {
        counter!("normalize_rejected_total", "source" => source.to_string())
            .increment(rejected as u64);
        tracing::info!(%source, total, kept = kept.len(), rejected, "normalized batch");
    }

    (kept, rejected)
}
