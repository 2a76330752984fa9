// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::debug;
use url::Url;

use crate::feed::Episode;

use super::filename::{artwork_extension, audio_extension, guid_suffix, sanitize_name};
use super::index::DirectoryIndex;

/// Everything needed to download one selected episode
#[derive(Debug, Clone)]
pub struct DownloadTask {
    /// Position of the episode in the selection; also identifies it to progress sinks
    pub episode_id: usize,
    pub episode: Episode,
    /// File name shared by the audio and artwork, without extension
    pub file_stem: String,
    /// Final location of the audio file
    pub audio_path: PathBuf,
    pub artwork: Option<ArtworkTarget>,
    /// Size announced by the feed, if any
    pub expected_size: Option<u64>,
}

/// Where an episode's artwork comes from and where it goes
#[derive(Debug, Clone)]
pub struct ArtworkTarget {
    pub url: Url,
    pub path: PathBuf,
}

/// Create one download task per episode, with collision-free file names
///
/// An episode whose sanitized title collides with an earlier episode of the
/// same run, or with a file in `index` written by a different episode, gets a
/// short GUID-derived suffix, so no task overwrites another episode.
pub fn plan_tasks(
    podcast_dir: &Path,
    episodes: Vec<Episode>,
    index: &DirectoryIndex,
) -> Vec<DownloadTask> {
    let mut taken = HashSet::new();

    episodes
        .into_iter()
        .enumerate()
        .map(|(episode_id, episode)| {
            let stem = unique_stem(&episode, index, &mut taken);
            let audio_path =
                podcast_dir.join(format!("{stem}.{}", audio_extension(&episode.enclosure)));
            let artwork = episode.artwork_url.as_ref().map(|url| ArtworkTarget {
                url: url.clone(),
                path: podcast_dir.join(format!("{stem}.{}", artwork_extension(url))),
            });

            DownloadTask {
                episode_id,
                expected_size: episode.enclosure.length,
                file_stem: stem,
                episode,
                audio_path,
                artwork,
            }
        })
        .collect()
}

fn unique_stem(episode: &Episode, index: &DirectoryIndex, taken: &mut HashSet<String>) -> String {
    // Case-insensitive filesystems treat "Ep" and "EP" as the same file
    let mut claim = |name: String| {
        (index.may_write(&name, &episode.guid) && taken.insert(name.to_lowercase())).then_some(name)
    };

    let base = sanitize_name(&episode.title);
    if let Some(stem) = claim(base.clone()) {
        return stem;
    }

    let suffix = guid_suffix(&episode.guid);
    let candidate = format!("{base} [{suffix}]");
    debug!(title = %episode.title, %candidate, "file name taken, using GUID suffix");
    if let Some(stem) = claim(candidate.clone()) {
        return stem;
    }

    // Duplicate GUIDs as well; fall back to a counter
    (2..)
        .map(|n| format!("{base} [{suffix}-{n}]"))
        .find_map(&mut claim)
        .unwrap_or(candidate)
}
