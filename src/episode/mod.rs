mod download;
mod filename;
mod index;
mod task;

pub use download::{download_artwork, download_episode};
pub use filename::{artwork_extension, audio_extension, guid_suffix, sanitize_name};
pub use index::{DirectoryIndex, INDEX_FILE_NAME};
pub use task::{ArtworkTarget, DownloadTask, plan_tasks};
