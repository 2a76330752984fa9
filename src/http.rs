// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;

use crate::config::Config;

/// Body chunks of an audio download, in arrival order
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>>;

fn is_success_status(status: u16) -> bool {
    (200..300).contains(&status)
}

/// Response whose body is consumed chunk by chunk
pub struct StreamingResponse {
    pub status: u16,
    /// Content-Length header, if the server sent one
    pub content_length: Option<u64>,
    pub body: ByteStream,
}

impl StreamingResponse {
    pub fn is_success(&self) -> bool {
        is_success_status(self.status)
    }
}

/// Fully buffered response, for small documents like feeds and images
#[derive(Debug, Clone)]
pub struct BufferedResponse {
    pub status: u16,
    pub body: Bytes,
}

impl BufferedResponse {
    pub fn is_success(&self) -> bool {
        is_success_status(self.status)
    }
}

/// Transport used for feeds, audio and artwork
///
/// Only transport failures are errors here; non-2xx statuses come back as
/// responses so callers can name the status in their own error.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// GET `url` and buffer the whole body
    async fn fetch(&self, url: &str) -> Result<BufferedResponse, reqwest::Error>;

    /// GET `url` and hand back the body as a stream
    async fn open_stream(&self, url: &str) -> Result<StreamingResponse, reqwest::Error>;
}

/// `HttpClient` backed by a shared reqwest connection pool
#[derive(Clone)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    /// Build a client that identifies itself with the configured User-Agent
    pub fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .connect_timeout(config.connect_timeout)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn fetch(&self, url: &str) -> Result<BufferedResponse, reqwest::Error> {
        let response = self.client.get(url).send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;
        Ok(BufferedResponse { status, body })
    }

    async fn open_stream(&self, url: &str) -> Result<StreamingResponse, reqwest::Error> {
        let response = self.client.get(url).send().await?;

        Ok(StreamingResponse {
            status: response.status().as_u16(),
            content_length: response.content_length(),
            body: Box::pin(response.bytes_stream()),
        })
    }
}
