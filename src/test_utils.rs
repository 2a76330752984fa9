// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Shared fixtures for unit tests: a URL-routed mock HTTP client, episode
//! factories and a synthetic MP3 payload lofty can parse.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::DateTime;
use futures::StreamExt;
use url::Url;

use crate::feed::{Enclosure, Episode};
use crate::http::{BufferedResponse, ByteStream, HttpClient, StreamingResponse};

#[derive(Clone)]
struct MockRoute {
    status: u16,
    body: Bytes,
}

/// HTTP client answering from a fixed URL → response table.
/// Unknown URLs answer 404.
#[derive(Clone, Default)]
pub struct MockHttpClient {
    routes: Arc<HashMap<String, MockRoute>>,
    delays: Arc<HashMap<String, Duration>>,
    default_delay: Option<Duration>,
    chunk_size: Option<usize>,
    /// Pause before every body chunk after the first
    chunk_delay: Option<Duration>,
    open_streams: Arc<AtomicUsize>,
    peak_streams: Arc<AtomicUsize>,
}

impl MockHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, url: &str, status: u16, body: impl Into<Bytes>) -> Self {
        Arc::make_mut(&mut self.routes).insert(
            url.to_string(),
            MockRoute {
                status,
                body: body.into(),
            },
        );
        self
    }

    /// Delay every response by `delay` before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.default_delay = Some(delay);
        self
    }

    /// Delay the response for a single URL
    pub fn with_route_delay(mut self, url: &str, delay: Duration) -> Self {
        Arc::make_mut(&mut self.delays).insert(url.to_string(), delay);
        self
    }

    /// Split streamed bodies into chunks of `size` bytes
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = Some(size);
        self
    }

    /// Stall for `delay` between streamed chunks
    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = Some(delay);
        self
    }

    /// Highest number of `open_stream` calls that were waiting at once
    pub fn peak_open_streams(&self) -> usize {
        self.peak_streams.load(Ordering::SeqCst)
    }

    async fn lookup(&self, url: &str) -> MockRoute {
        if let Some(delay) = self.delays.get(url).copied().or(self.default_delay) {
            tokio::time::sleep(delay).await;
        }
        self.routes.get(url).cloned().unwrap_or(MockRoute {
            status: 404,
            body: Bytes::from_static(b"Not Found"),
        })
    }
}

#[async_trait]
impl HttpClient for MockHttpClient {
    async fn fetch(&self, url: &str) -> Result<BufferedResponse, reqwest::Error> {
        let route = self.lookup(url).await;
        Ok(BufferedResponse {
            status: route.status,
            body: route.body,
        })
    }

    async fn open_stream(&self, url: &str) -> Result<StreamingResponse, reqwest::Error> {
        let open = self.open_streams.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_streams.fetch_max(open, Ordering::SeqCst);
        let route = self.lookup(url).await;
        self.open_streams.fetch_sub(1, Ordering::SeqCst);

        let len = route.body.len() as u64;
        let chunk_size = self.chunk_size.unwrap_or(route.body.len().max(1));
        let chunks: Vec<Result<Bytes, reqwest::Error>> = route
            .body
            .chunks(chunk_size)
            .map(|chunk| Ok(Bytes::copy_from_slice(chunk)))
            .collect();

        let stream: ByteStream = match self.chunk_delay {
            Some(delay) => Box::pin(futures::stream::iter(chunks).enumerate().then(
                move |(index, chunk)| async move {
                    if index > 0 {
                        tokio::time::sleep(delay).await;
                    }
                    chunk
                },
            )),
            None => Box::pin(futures::stream::iter(chunks)),
        };

        Ok(StreamingResponse {
            status: route.status,
            content_length: Some(len),
            body: stream,
        })
    }
}

/// Build an episode with sensible defaults; customise with struct update syntax
pub fn make_episode(title: &str, date: &str, url: &str) -> Episode {
    Episode {
        title: title.to_string(),
        description: None,
        pub_date: DateTime::parse_from_rfc3339(date).expect("valid RFC 3339 test date"),
        guid: format!("guid-{title}"),
        enclosure: Enclosure {
            url: Url::parse(url).expect("valid test URL"),
            length: None,
            mime_type: Some("audio/mpeg".to_string()),
        },
        artwork_url: None,
        duration_secs: None,
        episode_number: None,
        season_number: None,
    }
}

/// A run of valid MPEG-1 Layer III frames (128 kbps, 44.1 kHz) with silent payloads
pub fn synthetic_mp3(frames: usize) -> Vec<u8> {
    const FRAME_LEN: usize = 417;
    let mut data = Vec::with_capacity(frames * FRAME_LEN);
    for _ in 0..frames {
        data.extend_from_slice(&[0xFF, 0xFB, 0x90, 0x00]);
        data.extend(std::iter::repeat_n(0u8, FRAME_LEN - 4));
    }
    data
}

/// Minimal byte payloads carrying real image signatures
pub const PNG_BYTES: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52,
];
pub const JPEG_BYTES: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46, 0x49, 0x46, 0x00];
