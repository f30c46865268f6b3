// src/ingest/providers/mod.rs
pub mod fixed;
pub mod json_feed;
pub mod rss;

use std::time::Duration;

/// Shared HTTP client settings for upstream sources.
pub(crate) fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(concat!("newswire/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(4))
        .build()
        .unwrap_or_default()
}

/// GET `url` and return the body, mapping non-2xx statuses to upstream errors.
pub(crate) async fn get_text(
    client: &reqwest::Client,
    url: &str,
) -> Result<String, crate::error::FetchError> {
    let resp = client.get(url).send().await?;
    let status = resp.status();
    if !status.is_success() {
        return Err(crate::error::FetchError::Upstream(format!(
            "GET {url} returned {status}"
        )));
    }
    Ok(resp.text().await?)
}
