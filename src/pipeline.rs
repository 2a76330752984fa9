// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, FixedOffset};
use futures::StreamExt;
use serde::Serialize;
use tokio::task::JoinError;
use tracing::{info, warn};
use url::Url;

use crate::config::Config;
use crate::embed::{EmbedOutcome, EpisodeTags, embed_metadata};
use crate::episode::{
    DirectoryIndex, DownloadTask, download_artwork, download_episode, plan_tasks, sanitize_name,
};
use crate::error::{EmbedError, PipelineError, ValidationError};
use crate::feed::{Podcast, fetch_feed};
use crate::filter::{FilterCriteria, select};
use crate::http::HttpClient;
use crate::progress::{ProgressEvent, SharedProgressReporter};

/// Input of a pipeline run
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub feed_url: String,
    /// `None` selects nothing
    pub criteria: Option<FilterCriteria>,
    /// Base directory; each podcast gets its own subdirectory
    pub output_dir: PathBuf,
    pub embed_metadata: bool,
}

/// Phases of a run, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Parsing,
    Filtering,
    Downloading,
    Embedding,
    Reported,
}

/// Cooperative cancellation for a run
///
/// Once cancelled, downloads that have not started are skipped; downloads
/// already in flight run to completion.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Result of downloading one episode
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DownloadStatus {
    Succeeded,
    Failed { reason: String },
    Cancelled,
}

/// Result of tagging one downloaded episode
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EmbedStatus {
    NotRequested,
    Embedded { artwork: bool },
    /// Format without tag support
    Skipped,
    Failed { reason: String },
}

/// Outcome of one selected episode
#[derive(Debug, Clone, Serialize)]
pub struct EpisodeOutcome {
    pub episode_id: usize,
    pub title: String,
    pub guid: String,
    pub published: DateTime<FixedOffset>,
    pub download: DownloadStatus,
    pub audio_path: Option<PathBuf>,
    pub artwork_path: Option<PathBuf>,
    pub bytes_written: u64,
    pub embed: EmbedStatus,
    /// Problems that did not fail the episode
    pub warnings: Vec<String>,
}

impl EpisodeOutcome {
    fn new(task: &DownloadTask, download: DownloadStatus) -> Self {
        Self {
            episode_id: task.episode_id,
            title: task.episode.title.clone(),
            guid: task.episode.guid.clone(),
            published: task.episode.pub_date,
            download,
            audio_path: None,
            artwork_path: None,
            bytes_written: 0,
            embed: EmbedStatus::NotRequested,
            warnings: Vec::new(),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.download == DownloadStatus::Succeeded
    }
}

/// Overall result of a run, for the caller's exit status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Nothing was selected
    Empty,
    AllSucceeded,
    Partial,
    /// No selected episode was downloaded
    AllFailed,
}

/// Aggregated outcome of a run, in selection order
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub feed_url: Url,
    pub podcast_title: String,
    pub podcast_dir: PathBuf,
    pub total_episodes: usize,
    pub outcomes: Vec<EpisodeOutcome>,
}

impl RunReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.succeeded()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.download, DownloadStatus::Failed { .. }))
            .count()
    }

    pub fn cancelled(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.download == DownloadStatus::Cancelled)
            .count()
    }

    pub fn status(&self) -> RunStatus {
        let succeeded = self.succeeded();
        if self.outcomes.is_empty() {
            RunStatus::Empty
        } else if succeeded == self.outcomes.len() {
            RunStatus::AllSucceeded
        } else if succeeded == 0 {
            RunStatus::AllFailed
        } else {
            RunStatus::Partial
        }
    }
}

/// Check that a feed URL is absolute http(s)
pub fn validate_feed_url(raw: &str) -> Result<Url, ValidationError> {
    let invalid = |reason: String| ValidationError::InvalidFeedUrl {
        url: raw.to_string(),
        reason,
    };

    let url = Url::parse(raw.trim()).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(invalid(format!("unsupported scheme '{other}'"))),
    }
}

/// Run the whole pipeline: parse, filter, download, embed, report
///
/// Only invalid input, an unusable feed or an uncreatable output directory
/// abort the run. Per-episode failures are recorded in the report.
pub async fn run<C: HttpClient>(
    client: &C,
    request: &RunRequest,
    config: &Config,
    reporter: SharedProgressReporter,
    cancel: &CancelHandle,
) -> Result<RunReport, PipelineError> {
    config.validate()?;
    if let Some(criteria) = &request.criteria {
        criteria.validate()?;
    }
    let feed_url = validate_feed_url(&request.feed_url)?;

    reporter.report(ProgressEvent::PhaseChanged {
        phase: RunPhase::Parsing,
    });
    reporter.report(ProgressEvent::FetchingFeed {
        url: feed_url.to_string(),
    });
    let podcast = fetch_feed(client, &feed_url, config.feed_timeout).await?;

    reporter.report(ProgressEvent::PhaseChanged {
        phase: RunPhase::Filtering,
    });
    let selected = match &request.criteria {
        Some(criteria) => select(&podcast.episodes, criteria),
        None => Vec::new(),
    };
    info!(
        total = podcast.episodes.len(),
        selected = selected.len(),
        "episodes selected"
    );
    reporter.report(ProgressEvent::FeedParsed {
        podcast_title: podcast.title.clone(),
        total_episodes: podcast.episodes.len(),
        selected_episodes: selected.len(),
    });

    let podcast_dir = request.output_dir.join(sanitize_name(&podcast.title));
    let mut report = RunReport {
        feed_url: feed_url.clone(),
        podcast_title: podcast.title.clone(),
        podcast_dir: podcast_dir.clone(),
        total_episodes: podcast.episodes.len(),
        outcomes: Vec::new(),
    };

    if !selected.is_empty() {
        tokio::fs::create_dir_all(&podcast_dir)
            .await
            .map_err(|e| PipelineError::OutputDirectory {
                path: podcast_dir.clone(),
                source: e,
            })?;

        let mut index = DirectoryIndex::scan(&podcast_dir);
        let tasks = plan_tasks(&podcast_dir, selected, &index);

        reporter.report(ProgressEvent::PhaseChanged {
            phase: RunPhase::Downloading,
        });
        // `buffered` bounds concurrency and yields results in task order
        report.outcomes = futures::stream::iter(tasks.iter())
            .map(|task| run_task(client, task, config, &reporter, cancel))
            .buffered(config.max_concurrent)
            .collect()
            .await;

        for (task, outcome) in tasks.iter().zip(&report.outcomes) {
            if outcome.succeeded() {
                index.record(&task.file_stem, &task.episode.guid);
            }
        }
        if let Err(e) = index.save(&podcast_dir) {
            warn!(dir = %podcast_dir.display(), error = %e, "could not save file index");
        }

        if request.embed_metadata {
            reporter.report(ProgressEvent::PhaseChanged {
                phase: RunPhase::Embedding,
            });
            for (task, outcome) in tasks.iter().zip(report.outcomes.iter_mut()) {
                if outcome.succeeded() {
                    embed_outcome(&podcast, task, outcome, &reporter).await;
                }
            }
        }
    }

    reporter.report(ProgressEvent::RunCompleted {
        succeeded: report.succeeded(),
        failed: report.failed(),
        cancelled: report.cancelled(),
    });
    reporter.report(ProgressEvent::PhaseChanged {
        phase: RunPhase::Reported,
    });

    Ok(report)
}

/// Download one episode and its artwork; never fails, the outcome carries errors
async fn run_task<C: HttpClient>(
    client: &C,
    task: &DownloadTask,
    config: &Config,
    reporter: &SharedProgressReporter,
    cancel: &CancelHandle,
) -> EpisodeOutcome {
    if cancel.is_cancelled() {
        info!(episode = %task.episode.title, "run cancelled, skipping download");
        return EpisodeOutcome::new(task, DownloadStatus::Cancelled);
    }

    let bytes_written =
        match download_episode(client, task, config.download_timeout, reporter).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(episode = %task.episode.title, guid = %task.episode.guid, error = %e, "download failed");
                reporter.report(ProgressEvent::DownloadFailed {
                    episode_id: task.episode_id,
                    episode_title: task.episode.title.clone(),
                    error: e.to_string(),
                });
                return EpisodeOutcome::new(
                    task,
                    DownloadStatus::Failed {
                        reason: e.to_string(),
                    },
                );
            }
        };

    let mut outcome = EpisodeOutcome::new(task, DownloadStatus::Succeeded);
    outcome.audio_path = Some(task.audio_path.clone());
    outcome.bytes_written = bytes_written;

    if let Some(artwork) = &task.artwork {
        match download_artwork(client, artwork, config.artwork_timeout).await {
            Ok(_) => outcome.artwork_path = Some(artwork.path.clone()),
            Err(e) => {
                warn!(episode = %task.episode.title, error = %e, "artwork download failed");
                add_warning(&mut outcome, format!("Artwork not downloaded: {e}"), reporter);
            }
        }
    }

    outcome
}

async fn embed_outcome(
    podcast: &Podcast,
    task: &DownloadTask,
    outcome: &mut EpisodeOutcome,
    reporter: &SharedProgressReporter,
) {
    let tags = EpisodeTags {
        title: task.episode.title.clone(),
        podcast: podcast.title.clone(),
        description: task.episode.description.clone(),
    };
    let audio_path = task.audio_path.clone();
    let artwork_path = outcome.artwork_path.clone();

    // lofty rewrites the whole file; keep that off the async workers
    let result = tokio::task::spawn_blocking(move || {
        embed_metadata(&audio_path, &tags, artwork_path.as_deref())
    })
    .await;

    record_embed_result(outcome, result, reporter);
}

fn record_embed_result(
    outcome: &mut EpisodeOutcome,
    result: Result<Result<EmbedOutcome, EmbedError>, JoinError>,
    reporter: &SharedProgressReporter,
) {
    let reason = match result {
        Ok(Ok(EmbedOutcome::Embedded { artwork })) => {
            outcome.embed = EmbedStatus::Embedded { artwork };
            return;
        }
        Ok(Ok(EmbedOutcome::Unsupported)) => {
            outcome.embed = EmbedStatus::Skipped;
            return;
        }
        Ok(Err(e)) => e.to_string(),
        Err(e) => format!("tagging task did not finish: {e}"),
    };

    warn!(episode = %outcome.title, error = %reason, "embedding metadata failed");
    add_warning(outcome, format!("Metadata not embedded: {reason}"), reporter);
    outcome.embed = EmbedStatus::Failed { reason };
}

fn add_warning(outcome: &mut EpisodeOutcome, message: String, reporter: &SharedProgressReporter) {
    reporter.report(ProgressEvent::EpisodeWarning {
        episode_id: outcome.episode_id,
        episode_title: outcome.title.clone(),
        message: message.clone(),
    });
    outcome.warnings.push(message);
}
