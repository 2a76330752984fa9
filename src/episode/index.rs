// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::{BTreeMap, HashSet};
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Name of the ownership index kept in each podcast directory
pub const INDEX_FILE_NAME: &str = ".podcatch.json";

/// Which episode wrote which file name in a podcast directory
///
/// Names are compared by lowercased file stem, so an episode's audio and
/// artwork share one entry. A stem that exists on disk but has no owner is
/// treated as belonging to someone else.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct DirectoryIndex {
    /// Lowercased stem → GUID of the episode written under it
    files: BTreeMap<String, String>,
    #[serde(skip)]
    present: HashSet<String>,
}

impl DirectoryIndex {
    /// Read the index and list the stems present in `dir`
    ///
    /// A missing directory or index yields an empty index; a corrupt index is
    /// ignored with a warning, which makes every existing file foreign.
    pub fn scan(dir: &Path) -> Self {
        let index_path = dir.join(INDEX_FILE_NAME);
        let mut index = match std::fs::read(&index_path) {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                warn!(path = %index_path.display(), error = %e, "ignoring unreadable file index");
                Self::default()
            }),
            Err(e) => {
                if e.kind() != io::ErrorKind::NotFound {
                    warn!(path = %index_path.display(), error = %e, "could not read file index");
                }
                Self::default()
            }
        };

        if let Ok(entries) = std::fs::read_dir(dir) {
            for entry in entries.flatten() {
                let name = entry.file_name();
                let Some(name) = name.to_str() else {
                    continue;
                };
                if name == INDEX_FILE_NAME || name.ends_with(".partial") {
                    continue;
                }
                if let Some(stem) = Path::new(name).file_stem().and_then(|s| s.to_str()) {
                    index.present.insert(stem.to_lowercase());
                }
            }
        }

        // Entries whose files were deleted no longer claim anything
        let present = &index.present;
        index.files.retain(|stem, _| present.contains(stem));

        debug!(
            dir = %dir.display(),
            present = index.present.len(),
            owned = index.files.len(),
            "scanned podcast directory"
        );
        index
    }

    /// Whether the episode `guid` may write files named `stem` without
    /// overwriting a different episode
    pub fn may_write(&self, stem: &str, guid: &str) -> bool {
        let key = stem.to_lowercase();
        !self.present.contains(&key) || self.files.get(&key).is_some_and(|owner| owner == guid)
    }

    /// GUID of the episode that wrote `stem`, if known
    pub fn owner(&self, stem: &str) -> Option<&str> {
        self.files.get(&stem.to_lowercase()).map(String::as_str)
    }

    /// Note that the episode `guid` now owns `stem`
    pub fn record(&mut self, stem: &str, guid: &str) {
        let key = stem.to_lowercase();
        self.present.insert(key.clone());
        self.files.insert(key, guid.to_string());
    }

    /// Write the index into `dir`, replacing any previous one atomically
    pub fn save(&self, dir: &Path) -> io::Result<()> {
        let json = serde_json::to_vec_pretty(self).map_err(io::Error::other)?;
        let path = dir.join(INDEX_FILE_NAME);
        let staging = dir.join(format!("{INDEX_FILE_NAME}.partial"));
        std::fs::write(&staging, json)?;
        std::fs::rename(&staging, &path)
    }
}
