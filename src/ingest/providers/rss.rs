// src/ingest/providers/rss.rs
use async_trait::async_trait;
use quick_xml::de::from_str;
use serde::Deserialize;

use crate::error::FetchError;
use crate::ingest::types::{RawItem, RawTimestamp, SourceFetcher};

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    guid: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
}

/// RSS 2.0 source. Item id is the `<guid>`, falling back to `<link>`.
pub struct RssFetcher {
    name: String,
    mode: Mode,
}

enum Mode {
    Fixture(String),
    Http { url: String, client: reqwest::Client },
}

impl RssFetcher {
    pub fn from_url(name: &str, url: &str) -> Self {
        Self {
            name: name.to_string(),
            mode: Mode::Http {
                url: url.to_string(),
                client: super::http_client(),
            },
        }
    }

    pub fn from_fixture(name: &str, xml: &str) -> Self {
        Self {
            name: name.to_string(),
            mode: Mode::Fixture(xml.to_string()),
        }
    }

    fn parse_items_from_str(s: &str) -> Result<Vec<RawItem>, FetchError> {
        let xml_clean = scrub_html_entities_for_xml(s);
        let rss: Rss = from_str(&xml_clean).map_err(FetchError::parse)?;

        let out = rss
            .channel
            .item
            .into_iter()
            .map(|it| {
                let mut raw = RawItem {
                    id: it.guid.or_else(|| it.link.clone()),
                    title: it.title,
                    url: it.link,
                    pub_date: it.pub_date.map(RawTimestamp::Text),
                    ..RawItem::default()
                };
                if let Some(desc) = it.description.filter(|d| !d.trim().is_empty()) {
                    raw.extra.insert("hover".into(), serde_json::Value::String(desc));
                }
                raw
            })
            .collect();
        Ok(out)
    }
}

#[async_trait]
impl SourceFetcher for RssFetcher {
    async fn fetch_latest(&self) -> Result<Vec<RawItem>, FetchError> {
        match &self.mode {
            Mode::Fixture(s) => Self::parse_items_from_str(s),
            Mode::Http { url, client } => {
                let body = super::get_text(client, url).await?;
                Self::parse_items_from_str(&body)
            }
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>T</title>
  <item><title>First&nbsp;story</title><link>https://ex.com/1</link><guid>g-1</guid>
        <pubDate>Mon, 01 Jan 2024 10:00:00 +0000</pubDate><description>Summary</description></item>
  <item><title>Second</title><link>https://ex.com/2</link></item>
</channel></rss>"#;

    #[tokio::test]
    async fn fixture_parses_items_in_order() {
        let f = RssFetcher::from_fixture("Example", FEED);
        let items = f.fetch_latest().await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id.as_deref(), Some("g-1"));
        assert_eq!(items[0].title.as_deref(), Some("First story"));
        assert_eq!(items[0].extra["hover"], "Summary");
        // no guid -> link doubles as id
        assert_eq!(items[1].id.as_deref(), Some("https://ex.com/2"));
    }

    #[tokio::test]
    async fn garbage_is_a_parse_error() {
        let f = RssFetcher::from_fixture("Broken", "<html><body>oops");
        let err = f.fetch_latest().await.unwrap_err();
        assert_eq!(err.kind(), "parse");
    }
}
