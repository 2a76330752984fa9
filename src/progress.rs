// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::pipeline::RunPhase;

/// Events emitted during a pipeline run for progress reporting
///
/// `episode_id` is the episode's position in the selection.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// The run entered a new phase
    PhaseChanged { phase: RunPhase },

    /// Feed is being fetched from URL
    FetchingFeed { url: String },

    /// Feed has been parsed and filtered
    FeedParsed {
        podcast_title: String,
        total_episodes: usize,
        selected_episodes: usize,
    },

    /// A download is starting
    DownloadStarting {
        episode_id: usize,
        episode_title: String,
        /// Expected content length in bytes, if known
        content_length: Option<u64>,
    },

    /// Download progress update
    DownloadProgress {
        episode_id: usize,
        episode_title: String,
        bytes_downloaded: u64,
        total_bytes: Option<u64>,
    },

    /// A download completed successfully
    DownloadCompleted {
        episode_id: usize,
        episode_title: String,
        bytes_downloaded: u64,
    },

    /// A download failed
    DownloadFailed {
        episode_id: usize,
        episode_title: String,
        error: String,
    },

    /// Something went wrong that does not fail the episode (artwork, tagging)
    EpisodeWarning {
        episode_id: usize,
        episode_title: String,
        message: String,
    },

    /// Run finished
    RunCompleted {
        succeeded: usize,
        failed: usize,
        cancelled: usize,
    },
}

/// Trait for reporting progress events during a run.
///
/// Reporters are shared between concurrent downloads, so implementations
/// must serialize their own output.
pub trait ProgressReporter: Send + Sync {
    /// Report a progress event
    fn report(&self, event: ProgressEvent);
}

/// A shared reference to a progress reporter
pub type SharedProgressReporter = Arc<dyn ProgressReporter>;

/// A no-op progress reporter that silently ignores all events.
/// Useful for tests or quiet mode.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn report(&self, _event: ProgressEvent) {}
}

impl NoopReporter {
    /// Create a new NoopReporter wrapped in an Arc
    pub fn shared() -> SharedProgressReporter {
        Arc::new(Self)
    }
}

/// Queues events onto a channel so a single consumer receives them in order
#[derive(Debug, Clone)]
pub struct ChannelReporter {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ChannelReporter {
    /// Create a reporter and the receiving end of its queue
    pub fn shared() -> (SharedProgressReporter, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }
}

impl ProgressReporter for ChannelReporter {
    fn report(&self, event: ProgressEvent) {
        // A dropped receiver just means nobody is listening any more
        let _ = self.tx.send(event);
    }
}
