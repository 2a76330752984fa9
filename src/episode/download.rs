// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use futures::StreamExt;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tokio::time;
use tracing::{debug, warn};

use crate::error::DownloadError;
use crate::http::{ByteStream, HttpClient};
use crate::progress::{ProgressEvent, SharedProgressReporter};

use super::task::{ArtworkTarget, DownloadTask};

/// Minimum time between two progress reports for the same download
const PROGRESS_INTERVAL: Duration = Duration::from_millis(100);

/// Artwork larger than this is refused
pub const MAX_ARTWORK_BYTES: u64 = 10 * 1024 * 1024;

/// Download an episode's audio to its planned path
///
/// Streams the response body into a `.partial` file next to the target and
/// renames it into place once complete, so an interrupted download never
/// leaves a truncated file under the final name. `timeout` bounds the wait
/// for the response headers and for every body chunk.
/// Returns the number of bytes downloaded on success.
pub async fn download_episode<C: HttpClient>(
    client: &C,
    task: &DownloadTask,
    timeout: Duration,
    reporter: &SharedProgressReporter,
) -> Result<u64, DownloadError> {
    let url = task.episode.enclosure.url.as_str();
    debug!(episode = %task.episode.title, url, "fetching audio");

    let response = time::timeout(timeout, client.open_stream(url))
        .await
        .map_err(|_| timeout_error(url, timeout))?
        .map_err(|e| DownloadError::Network {
            url: url.to_string(),
            source: e,
        })?;

    if !response.is_success() {
        return Err(DownloadError::HttpStatus {
            url: url.to_string(),
            status: response.status,
        });
    }

    let total_bytes = response.content_length.or(task.expected_size);

    reporter.report(ProgressEvent::DownloadStarting {
        episode_id: task.episode_id,
        episode_title: task.episode.title.clone(),
        content_length: total_bytes,
    });

    let partial_path = partial_path(&task.audio_path);
    let written = stream_to_file(
        response.body,
        &partial_path,
        url,
        timeout,
        task,
        total_bytes,
        reporter,
    )
    .await;

    let bytes_downloaded = match written {
        Ok(bytes) => bytes,
        Err(e) => {
            discard_partial(&partial_path).await;
            return Err(e);
        }
    };

    if let Err(e) = fs::rename(&partial_path, &task.audio_path).await {
        discard_partial(&partial_path).await;
        return Err(DownloadError::FinalizeFailed {
            path: task.audio_path.clone(),
            source: e,
        });
    }

    reporter.report(ProgressEvent::DownloadCompleted {
        episode_id: task.episode_id,
        episode_title: task.episode.title.clone(),
        bytes_downloaded,
    });

    Ok(bytes_downloaded)
}

/// Write the body stream to `path`; the file is closed when this returns
async fn stream_to_file(
    mut stream: ByteStream,
    path: &Path,
    url: &str,
    timeout: Duration,
    task: &DownloadTask,
    total_bytes: Option<u64>,
    reporter: &SharedProgressReporter,
) -> Result<u64, DownloadError> {
    let mut file = File::create(path)
        .await
        .map_err(|e| DownloadError::FileCreateFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    let mut bytes_downloaded: u64 = 0;
    let mut throttle = ProgressThrottle::new(PROGRESS_INTERVAL);

    loop {
        let next = time::timeout(timeout, stream.next())
            .await
            .map_err(|_| timeout_error(url, timeout))?;
        let Some(chunk_result) = next else {
            break;
        };

        let chunk = chunk_result.map_err(|e| DownloadError::StreamFailed {
            url: url.to_string(),
            source: e,
        })?;

        file.write_all(&chunk)
            .await
            .map_err(|e| DownloadError::FileWriteFailed {
                path: path.to_path_buf(),
                source: e,
            })?;

        bytes_downloaded += chunk.len() as u64;

        if throttle.ready() {
            report_progress(task, bytes_downloaded, total_bytes, reporter);
        }
    }

    // Ensure all data is flushed to disk
    file.flush()
        .await
        .map_err(|e| DownloadError::FileWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    report_progress(task, bytes_downloaded, total_bytes, reporter);

    Ok(bytes_downloaded)
}

fn report_progress(
    task: &DownloadTask,
    bytes_downloaded: u64,
    total_bytes: Option<u64>,
    reporter: &SharedProgressReporter,
) {
    reporter.report(ProgressEvent::DownloadProgress {
        episode_id: task.episode_id,
        episode_title: task.episode.title.clone(),
        bytes_downloaded,
        total_bytes,
    });
}

/// Download artwork to its planned path, returning the number of bytes written
///
/// `timeout` bounds the whole request. Bodies over `MAX_ARTWORK_BYTES` are
/// refused without being written.
pub async fn download_artwork<C: HttpClient>(
    client: &C,
    target: &ArtworkTarget,
    timeout: Duration,
) -> Result<u64, DownloadError> {
    let url = target.url.as_str();
    debug!(url, path = %target.path.display(), "fetching artwork");

    let body = time::timeout(timeout, fetch_capped(client, url, MAX_ARTWORK_BYTES))
        .await
        .map_err(|_| timeout_error(url, timeout))??;

    let partial_path = partial_path(&target.path);
    if let Err(e) = fs::write(&partial_path, &body).await {
        discard_partial(&partial_path).await;
        return Err(DownloadError::FileWriteFailed {
            path: partial_path,
            source: e,
        });
    }
    if let Err(e) = fs::rename(&partial_path, &target.path).await {
        discard_partial(&partial_path).await;
        return Err(DownloadError::FinalizeFailed {
            path: target.path.clone(),
            source: e,
        });
    }

    Ok(body.len() as u64)
}

/// Read a whole response body into memory, giving up once it exceeds `limit`
async fn fetch_capped<C: HttpClient>(
    client: &C,
    url: &str,
    limit: u64,
) -> Result<Vec<u8>, DownloadError> {
    let mut response = client
        .open_stream(url)
        .await
        .map_err(|e| DownloadError::Network {
            url: url.to_string(),
            source: e,
        })?;

    if !response.is_success() {
        return Err(DownloadError::HttpStatus {
            url: url.to_string(),
            status: response.status,
        });
    }

    let too_large = |bytes: u64| DownloadError::TooLarge {
        url: url.to_string(),
        bytes,
        limit,
    };
    if let Some(length) = response.content_length
        && length > limit
    {
        return Err(too_large(length));
    }

    let mut body = Vec::new();
    while let Some(chunk) = response.body.next().await {
        let chunk = chunk.map_err(|e| DownloadError::StreamFailed {
            url: url.to_string(),
            source: e,
        })?;
        body.extend_from_slice(&chunk);
        if body.len() as u64 > limit {
            return Err(too_large(body.len() as u64));
        }
    }

    Ok(body)
}

fn timeout_error(url: &str, timeout: Duration) -> DownloadError {
    DownloadError::Timeout {
        url: url.to_string(),
        seconds: timeout.as_secs(),
    }
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".partial");
    PathBuf::from(name)
}

async fn discard_partial(path: &Path) {
    if let Err(e) = fs::remove_file(path).await
        && e.kind() != std::io::ErrorKind::NotFound
    {
        warn!(path = %path.display(), error = %e, "could not remove partial download");
    }
}

/// Rate limiter for progress events
struct ProgressThrottle {
    interval: Duration,
    last: Option<Instant>,
}

impl ProgressThrottle {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    fn ready(&mut self) -> bool {
        let now = Instant::now();
        match self.last {
            Some(last) if now.duration_since(last) < self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}
