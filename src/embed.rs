// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Writing episode metadata into downloaded audio files.
//!
//! Only MP3 files are tagged (ID3v2 through lofty). Other formats are left
//! untouched: tagging support is format specific and its absence is expected.

use std::path::{Path, PathBuf};

use lofty::config::WriteOptions;
use lofty::file::TaggedFileExt;
use lofty::picture::{MimeType, Picture, PictureType};
use lofty::probe::Probe;
use lofty::tag::{Accessor, ItemKey, Tag, TagExt};
use scraper::{ElementRef, Html};
use tracing::{debug, warn};

use crate::error::EmbedError;

/// Values written into an episode's tags
#[derive(Debug, Clone)]
pub struct EpisodeTags {
    pub title: String,
    /// Written as artist, album artist and album
    pub podcast: String,
    /// Raw HTML description; stored as plain text in the comment field
    pub description: Option<String>,
}

/// What `embed_metadata` did to the file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedOutcome {
    Embedded { artwork: bool },
    /// The format has no tag support here; the file was not touched
    Unsupported,
}

/// Image formats recognised by their leading bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
    Gif,
}

impl ImageFormat {
    /// Detect the format from the byte signature, ignoring any file extension
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(Self::Jpeg)
        } else if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
            Some(Self::Png)
        } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            Some(Self::Gif)
        } else {
            None
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Gif => "image/gif",
        }
    }

    fn to_lofty(self) -> MimeType {
        match self {
            Self::Jpeg => MimeType::Jpeg,
            Self::Png => MimeType::Png,
            Self::Gif => MimeType::Gif,
        }
    }
}

/// Whether `path` names a format this module writes tags into
pub fn is_taggable(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("mp3"))
}

/// Write title, podcast name, description and artwork into an audio file
///
/// A missing, unreadable or unrecognised artwork file is skipped and the
/// remaining tags are still written.
pub fn embed_metadata(
    path: &Path,
    tags: &EpisodeTags,
    artwork_path: Option<&Path>,
) -> Result<EmbedOutcome, EmbedError> {
    if !is_taggable(path) {
        debug!(path = %path.display(), "format not taggable, skipping metadata");
        return Ok(EmbedOutcome::Unsupported);
    }

    let read_error = |source| EmbedError::ReadFailed {
        path: path.to_path_buf(),
        source,
    };

    let mut tagged_file = Probe::open(path)
        .map_err(read_error)?
        .read()
        .map_err(read_error)?;

    let tag_type = tagged_file.primary_tag_type();
    let mut tag = tagged_file
        .remove(tag_type)
        .unwrap_or_else(|| Tag::new(tag_type));

    tag.set_title(tags.title.clone());
    tag.set_artist(tags.podcast.clone());
    tag.set_album(tags.podcast.clone());
    tag.insert_text(ItemKey::AlbumArtist, tags.podcast.clone());

    if let Some(description) = tags.description.as_deref().map(plain_text)
        && !description.is_empty()
    {
        tag.set_comment(description);
    }

    let artwork = artwork_path.and_then(load_artwork);
    let has_artwork = artwork.is_some();
    if let Some(picture) = artwork {
        tag.remove_picture_type(PictureType::CoverFront);
        tag.push_picture(picture);
    }

    tag.save_to_path(path, WriteOptions::default())
        .map_err(|source| EmbedError::WriteFailed {
            path: path.to_path_buf(),
            source,
        })?;

    debug!(path = %path.display(), artwork = has_artwork, "metadata embedded");
    Ok(EmbedOutcome::Embedded {
        artwork: has_artwork,
    })
}

fn load_artwork(path: &Path) -> Option<Picture> {
    let data = match std::fs::read(path) {
        Ok(data) => data,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "artwork unreadable, embedding without it");
            return None;
        }
    };

    let Some(format) = ImageFormat::sniff(&data) else {
        warn!(path = %path.display(), "artwork is not a JPEG, PNG or GIF image, skipping it");
        return None;
    };
    debug!(path = %path.display(), mime = format.mime_type(), "embedding artwork");

    Some(Picture::new_unchecked(
        PictureType::CoverFront,
        Some(format.to_lofty()),
        None,
        data,
    ))
}

/// Elements that separate words when rendered
const BLOCK_ELEMENTS: &[&str] = &[
    "br", "p", "div", "li", "ul", "ol", "blockquote", "h1", "h2", "h3", "h4", "h5", "h6",
    "tr", "td", "hr",
];

/// Reduce an HTML fragment to its visible text
fn plain_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let mut text = String::with_capacity(html.len());
    collect_text(fragment.root_element(), &mut text);
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
        } else if let Some(child) = ElementRef::wrap(child) {
            let name = child.value().name();
            if matches!(name, "script" | "style") {
                continue;
            }
            let block = BLOCK_ELEMENTS.contains(&name);
            if block {
                out.push(' ');
            }
            collect_text(child, out);
            if block {
                out.push(' ');
            }
        }
    }
}

/// Tags read back from an audio file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmbeddedTags {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub comment: Option<String>,
    pub artwork_mime: Option<String>,
}

/// Read the primary tag of an audio file
pub fn read_tags(path: &Path) -> Result<EmbeddedTags, EmbedError> {
    let read_error = |source| EmbedError::ReadFailed {
        path: PathBuf::from(path),
        source,
    };

    let tagged_file = Probe::open(path)
        .map_err(read_error)?
        .read()
        .map_err(read_error)?;

    let Some(tag) = tagged_file
        .primary_tag()
        .or_else(|| tagged_file.first_tag())
    else {
        return Ok(EmbeddedTags::default());
    };

    let artwork_mime = tag
        .pictures()
        .iter()
        .find(|p| p.pic_type() == PictureType::CoverFront)
        .and_then(|p| p.mime_type())
        .map(|mime| mime.as_str().to_string());

    Ok(EmbeddedTags {
        title: tag.title().map(|s| s.to_string()),
        artist: tag.artist().map(|s| s.to_string()),
        album: tag.album().map(|s| s.to_string()),
        comment: tag.comment().map(|s| s.to_string()),
        artwork_mime,
    })
}
