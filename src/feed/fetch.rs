// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::time::Duration;

use bytes::Bytes;
use tokio::time;
use tracing::{debug, info};
use url::Url;

use crate::error::FeedError;
use crate::http::HttpClient;

use super::parse::{Podcast, parse_feed};

/// Fetch raw feed bytes from a URL (without parsing)
pub async fn fetch_feed_bytes<C: HttpClient>(
    client: &C,
    url: &Url,
    timeout: Duration,
) -> Result<Bytes, FeedError> {
    debug!(%url, "fetching feed");

    let response = time::timeout(timeout, client.fetch(url.as_str()))
        .await
        .map_err(|_| FeedError::Timeout {
            url: url.to_string(),
            seconds: timeout.as_secs(),
        })?
        .map_err(|e| FeedError::Network {
            url: url.to_string(),
            source: e,
        })?;

    if !response.is_success() {
        return Err(FeedError::HttpStatus {
            url: url.to_string(),
            status: response.status,
        });
    }

    Ok(response.body)
}

/// Fetch and parse a podcast feed from a URL
pub async fn fetch_feed<C: HttpClient>(
    client: &C,
    url: &Url,
    timeout: Duration,
) -> Result<Podcast, FeedError> {
    let bytes = fetch_feed_bytes(client, url, timeout).await?;
    let podcast = parse_feed(&bytes, url.clone())?;
    info!(
        podcast = %podcast.title,
        episodes = podcast.episodes.len(),
        "feed parsed"
    );
    Ok(podcast)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockHttpClient;

    const FEED: &str = r#"<?xml version="1.0"?>
<rss version="2.0">
  <channel>
    <title>Fetched</title>
    <description>Fetched feed</description>
    <item>
      <title>Only</title>
      <pubDate>Mon, 15 Jan 2024 12:00:00 +0000</pubDate>
      <enclosure url="https://example.com/only.mp3" type="audio/mpeg"/>
    </item>
  </channel>
</rss>"#;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[tokio::test]
    async fn fetch_feed_parses_successful_responses() {
        let client = MockHttpClient::new().route("https://example.com/feed.xml", 200, FEED);

        let podcast = fetch_feed(
            &client,
            &url("https://example.com/feed.xml"),
            Duration::from_secs(5),
        )
        .await
        .unwrap();

        assert_eq!(podcast.title, "Fetched");
        assert_eq!(podcast.episodes.len(), 1);
    }

    #[tokio::test]
    async fn fetch_feed_reports_http_status() {
        let client = MockHttpClient::new().route("https://example.com/feed.xml", 406, "");

        let result = fetch_feed(
            &client,
            &url("https://example.com/feed.xml"),
            Duration::from_secs(5),
        )
        .await;

        match result {
            Err(FeedError::HttpStatus { status, .. }) => assert_eq!(status, 406),
            other => panic!("Expected HttpStatus error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn fetch_feed_reports_invalid_xml() {
        let client =
            MockHttpClient::new().route("https://example.com/feed.xml", 200, "<rss><channel>");

        let result = fetch_feed(
            &client,
            &url("https://example.com/feed.xml"),
            Duration::from_secs(5),
        )
        .await;

        assert!(matches!(result, Err(FeedError::InvalidXml { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_feed_times_out() {
        let client = MockHttpClient::new()
            .route("https://example.com/feed.xml", 200, FEED)
            .with_delay(Duration::from_secs(60));

        let result = fetch_feed(
            &client,
            &url("https://example.com/feed.xml"),
            Duration::from_secs(1),
        )
        .await;

        assert!(matches!(result, Err(FeedError::Timeout { seconds: 1, .. })));
    }
}
