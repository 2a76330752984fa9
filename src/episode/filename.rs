// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use sha2::{Digest, Sha256};
use url::Url;

use crate::feed::Enclosure;

/// Maximum length, in characters, of a sanitized name
const MAX_NAME_LENGTH: usize = 100;

/// Used when nothing survives sanitization
const FALLBACK_NAME: &str = "untitled";

const SANITIZE_OPTIONS: sanitize_filename::Options<'static> = sanitize_filename::Options {
    windows: true,
    truncate: false,
    replacement: "",
};

/// Turn a podcast or episode title into a name that is safe on common filesystems
///
/// Removes characters illegal on Windows/macOS/Linux and control characters,
/// collapses whitespace runs into a single space, strips trailing periods and
/// limits the length. Already-safe names are returned unchanged.
pub fn sanitize_name(raw: &str) -> String {
    let mut current = clean_once(raw);
    // Removing characters can expose new trailing dots or reserved names
    for _ in 0..3 {
        let next = clean_once(&current);
        if next == current {
            break;
        }
        current = next;
    }

    if current.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        current
    }
}

fn clean_once(raw: &str) -> String {
    let spaced = collapse_whitespace(raw);
    let trimmed = strip_trailing(&spaced);
    let sanitized = sanitize_filename::sanitize_with_options(trimmed, SANITIZE_OPTIONS);
    let collapsed = collapse_whitespace(&sanitized);
    let truncated: String = collapsed.chars().take(MAX_NAME_LENGTH).collect();
    strip_trailing(&truncated).to_string()
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Windows refuses names ending in a dot or space
fn strip_trailing(s: &str) -> &str {
    s.trim_end_matches(|c: char| c == '.' || c.is_whitespace())
}

/// Short, stable suffix derived from an episode GUID
pub fn guid_suffix(guid: &str) -> String {
    let digest = Sha256::digest(guid.as_bytes());
    digest[..4].iter().map(|b| format!("{b:02x}")).collect()
}

/// Get the audio file extension from an episode's enclosure
///
/// Attempts to extract from URL path or MIME type, defaults to "mp3"
pub fn audio_extension(enclosure: &Enclosure) -> String {
    if let Some(ext) = url_extension(&enclosure.url).filter(|ext| is_valid_audio_extension(ext)) {
        return ext;
    }

    if let Some(ref mime) = enclosure.mime_type
        && let Some(ext) = mime_to_extension(mime)
    {
        return ext.to_string();
    }

    "mp3".to_string()
}

/// Get the image file extension for an artwork URL, defaulting to "jpg"
pub fn artwork_extension(url: &Url) -> &'static str {
    match url_extension(url).as_deref() {
        Some("png") => "png",
        Some("gif") => "gif",
        Some("webp") => "webp",
        _ => "jpg",
    }
}

/// Lowercased extension of the last path segment, ignoring the query string
fn url_extension(url: &Url) -> Option<String> {
    let filename = url.path_segments()?.next_back()?;
    let (stem, ext) = filename.rsplit_once('.')?;
    (!stem.is_empty() && !ext.is_empty()).then(|| ext.to_lowercase())
}

/// Check if a string is a valid audio file extension
fn is_valid_audio_extension(ext: &str) -> bool {
    matches!(
        ext,
        "mp3" | "m4a" | "mp4" | "aac" | "ogg" | "opus" | "wav" | "flac"
    )
}

/// Map MIME types to file extensions
fn mime_to_extension(mime: &str) -> Option<&'static str> {
    match mime.to_lowercase().as_str() {
        "audio/mpeg" | "audio/mp3" => Some("mp3"),
        "audio/mp4" | "audio/m4a" | "audio/x-m4a" => Some("m4a"),
        "audio/aac" => Some("aac"),
        "audio/ogg" => Some("ogg"),
        "audio/opus" => Some("opus"),
        "audio/wav" | "audio/x-wav" => Some("wav"),
        "audio/flac" | "audio/x-flac" => Some("flac"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enclosure(url: &str, mime: Option<&str>) -> Enclosure {
        Enclosure {
            url: Url::parse(url).unwrap(),
            length: None,
            mime_type: mime.map(String::from),
        }
    }

    // === Sanitization ===

    #[test]
    fn sanitize_keeps_safe_names_unchanged() {
        for safe in ["Episode 42", "hello_world.test", "Café résumé", "Rust & Friends - #12"] {
            assert_eq!(sanitize_name(safe), safe);
        }
    }

    #[test]
    fn sanitize_removes_illegal_characters() {
        assert_eq!(sanitize_name("a:b/c\\d"), "abcd");
        assert_eq!(
            sanitize_name("Episode: A \"Test\" <Episode>?"),
            "Episode A Test Episode"
        );
        assert_eq!(sanitize_name("pipe|star*"), "pipestar");
    }

    #[test]
    fn sanitize_collapses_whitespace() {
        assert_eq!(sanitize_name("Episode   with \t spaces"), "Episode with spaces");
        assert_eq!(sanitize_name("line1\nline2"), "line1 line2");
        assert_eq!(sanitize_name("a / b"), "a b");
    }

    #[test]
    fn sanitize_strips_trailing_periods() {
        assert_eq!(sanitize_name("The End..."), "The End");
        assert_eq!(sanitize_name("Wait. ."), "Wait");
        assert_eq!(sanitize_name("Ends with dot?."), "Ends with dot");
    }

    #[test]
    fn sanitize_trims_surrounding_whitespace() {
        assert_eq!(sanitize_name("   padded   "), "padded");
    }

    #[test]
    fn sanitize_falls_back_when_nothing_is_left() {
        assert_eq!(sanitize_name(""), FALLBACK_NAME);
        assert_eq!(sanitize_name(":::///"), FALLBACK_NAME);
        assert_eq!(sanitize_name("..."), FALLBACK_NAME);
    }

    #[test]
    fn sanitize_handles_windows_reserved_names() {
        assert_eq!(sanitize_name("CON"), FALLBACK_NAME);
        assert_eq!(sanitize_name("CON ."), FALLBACK_NAME);
    }

    #[test]
    fn sanitize_limits_length_on_char_boundaries() {
        let long = "é".repeat(150);
        let result = sanitize_name(&long);
        assert_eq!(result.chars().count(), MAX_NAME_LENGTH);
    }

    #[test]
    fn sanitize_is_idempotent() {
        let inputs = [
            "Episode: A \"Test\" <Episode>",
            "CON .",
            "  x  .  ",
            "Trailing / slash.",
            "tab\there",
            &"word ".repeat(40),
        ];
        for input in inputs {
            let once = sanitize_name(input);
            assert_eq!(sanitize_name(&once), once, "not idempotent for {input:?}");
            assert_eq!(sanitize_name(input), once, "not deterministic for {input:?}");
        }
    }

    // === GUID suffix ===

    #[test]
    fn guid_suffix_is_short_and_stable() {
        let a = guid_suffix("https://example.com/ep/1");
        assert_eq!(a.len(), 8);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(a, guid_suffix("https://example.com/ep/1"));
        assert_ne!(a, guid_suffix("https://example.com/ep/2"));
    }

    // === Extensions ===

    #[test]
    fn extracts_extension_from_url() {
        assert_eq!(audio_extension(&enclosure("https://example.com/episode.m4a", None)), "m4a");
        assert_eq!(audio_extension(&enclosure("https://example.com/episode.ogg", None)), "ogg");
    }

    #[test]
    fn url_extension_wins_over_mime() {
        let enc = enclosure("https://example.com/episode.m4a", Some("audio/mpeg"));
        assert_eq!(audio_extension(&enc), "m4a");
    }

    #[test]
    fn normalizes_extension_to_lowercase() {
        assert_eq!(audio_extension(&enclosure("https://example.com/episode.MP3", None)), "mp3");
    }

    #[test]
    fn handles_url_with_query_params() {
        let enc = enclosure("https://example.com/episode.mp3?token=abc.m4a", None);
        assert_eq!(audio_extension(&enc), "mp3");
    }

    #[test]
    fn falls_back_to_mime_type() {
        let enc = enclosure("https://example.com/episode", Some("audio/x-m4a"));
        assert_eq!(audio_extension(&enc), "m4a");
    }

    #[test]
    fn defaults_to_mp3() {
        assert_eq!(audio_extension(&enclosure("https://example.com/episode", None)), "mp3");
        assert_eq!(
            audio_extension(&enclosure(
                "https://example.com/episode",
                Some("application/octet-stream")
            )),
            "mp3"
        );
        assert_eq!(audio_extension(&enclosure("https://example.com/episode.html", None)), "mp3");
        assert_eq!(audio_extension(&enclosure("https://example.com/", None)), "mp3");
    }

    #[test]
    fn artwork_extension_detection() {
        let ext = |s: &str| artwork_extension(&Url::parse(s).unwrap());
        assert_eq!(ext("https://example.com/cover.PNG"), "png");
        assert_eq!(ext("https://example.com/cover.jpeg"), "jpg");
        assert_eq!(ext("https://example.com/cover.webp?w=300"), "webp");
        assert_eq!(ext("https://example.com/cover"), "jpg");
    }
}
