// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

pub mod config;
pub mod embed;
pub mod episode;
pub mod error;
pub mod feed;
pub mod filter;
pub mod http;
pub mod pipeline;
pub mod progress;

#[cfg(test)]
mod test_utils;

// Re-export main types for convenience
pub use config::Config;
pub use embed::{EmbedOutcome, EpisodeTags, embed_metadata};
pub use episode::{DirectoryIndex, DownloadTask, plan_tasks, sanitize_name};
pub use error::{DownloadError, EmbedError, FeedError, PipelineError, ValidationError};
pub use feed::{Enclosure, Episode, Podcast, fetch_feed, parse_feed};
pub use filter::{FilterCriteria, select};
pub use http::{HttpClient, ReqwestClient, StreamingResponse};
pub use pipeline::{
    CancelHandle, DownloadStatus, EmbedStatus, EpisodeOutcome, RunPhase, RunReport, RunRequest,
    RunStatus, run,
};
pub use progress::{
    ChannelReporter, NoopReporter, ProgressEvent, ProgressReporter, SharedProgressReporter,
};
