// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use chrono::{DateTime, FixedOffset};
use tracing::debug;
use url::Url;

use crate::error::FeedError;

/// Title given to items whose title is missing or blank
pub const UNTITLED_EPISODE: &str = "Untitled Episode";

const UNTITLED_PODCAST: &str = "Untitled Podcast";

/// Represents a parsed podcast feed
#[derive(Debug, Clone)]
pub struct Podcast {
    pub title: String,
    pub description: Option<String>,
    pub link: Option<Url>,
    pub author: Option<String>,
    pub image_url: Option<Url>,
    pub feed_url: Url,
    pub episodes: Vec<Episode>,
}

/// Represents a single podcast episode
#[derive(Debug, Clone)]
pub struct Episode {
    pub title: String,
    /// Raw HTML as found in the feed
    pub description: Option<String>,
    pub pub_date: DateTime<FixedOffset>,
    /// Feed GUID, or the enclosure URL when the item declares none
    pub guid: String,
    pub enclosure: Enclosure,
    /// Item artwork, falling back to the feed image
    pub artwork_url: Option<Url>,
    pub duration_secs: Option<u64>,
    pub episode_number: Option<u32>,
    pub season_number: Option<u32>,
}

/// Represents the audio file attached to an episode
#[derive(Debug, Clone)]
pub struct Enclosure {
    pub url: Url,
    pub length: Option<u64>,
    pub mime_type: Option<String>,
}

/// Parse feed XML bytes into a Podcast struct
///
/// RSS 2.0 is tried first. Documents whose root element is not `<rss>` are
/// handed to the Atom parser.
pub fn parse_feed(xml_bytes: &[u8], feed_url: Url) -> Result<Podcast, FeedError> {
    match rss::Channel::read_from(xml_bytes) {
        Ok(channel) => Ok(podcast_from_channel(&channel, feed_url)),
        Err(rss::Error::InvalidStartTag) => {
            debug!(url = %feed_url, "document is not RSS, trying Atom");
            parse_atom(xml_bytes, feed_url)
        }
        Err(e) => Err(FeedError::InvalidXml {
            url: feed_url.to_string(),
            reason: e.to_string(),
        }),
    }
}

fn podcast_from_channel(channel: &rss::Channel, feed_url: Url) -> Podcast {
    // The first usable image wins, so nothing downstream sees more than one
    let image_url = channel
        .image()
        .and_then(|img| Url::parse(img.url()).ok())
        .or_else(|| {
            channel
                .itunes_ext()
                .and_then(|ext| ext.image())
                .and_then(|url| Url::parse(url).ok())
        });

    let episodes: Vec<Episode> = channel
        .items()
        .iter()
        .filter_map(|item| parse_item(item, image_url.as_ref()))
        .collect();

    debug!(
        items = channel.items().len(),
        episodes = episodes.len(),
        "parsed RSS channel"
    );

    let author = channel
        .itunes_ext()
        .and_then(|ext| ext.author().map(String::from))
        .or_else(|| channel.managing_editor().map(String::from));

    Podcast {
        title: non_blank(channel.title()).unwrap_or_else(|| UNTITLED_PODCAST.to_string()),
        description: non_blank(channel.description()),
        link: Url::parse(channel.link()).ok(),
        author,
        image_url,
        feed_url,
        episodes,
    }
}

/// Items without a usable enclosure URL or publish date are dropped
fn parse_item(item: &rss::Item, feed_image: Option<&Url>) -> Option<Episode> {
    let title = item
        .title()
        .and_then(non_blank)
        .unwrap_or_else(|| UNTITLED_EPISODE.to_string());

    let enclosure = item.enclosure()?;
    let enclosure_url = Url::parse(enclosure.url()).ok()?;
    let pub_date = item.pub_date().and_then(parse_pub_date)?;

    let guid = item
        .guid()
        .and_then(|g| non_blank(g.value()))
        .unwrap_or_else(|| enclosure_url.to_string());

    let itunes = item.itunes_ext();

    let artwork_url = itunes
        .and_then(|ext| ext.image())
        .and_then(|url| Url::parse(url).ok())
        .or_else(|| feed_image.cloned());

    Some(Episode {
        title,
        description: item.description().map(String::from),
        pub_date,
        guid,
        enclosure: Enclosure {
            url: enclosure_url,
            length: enclosure.length().parse().ok().filter(|len| *len > 0),
            mime_type: non_blank(enclosure.mime_type()),
        },
        artwork_url,
        duration_secs: itunes.and_then(|ext| ext.duration().and_then(parse_duration_secs)),
        episode_number: itunes.and_then(|ext| ext.episode().and_then(|e| e.parse().ok())),
        season_number: itunes.and_then(|ext| ext.season().and_then(|s| s.parse().ok())),
    })
}

fn parse_atom(xml_bytes: &[u8], feed_url: Url) -> Result<Podcast, FeedError> {
    let feed = feed_rs::parser::parse(xml_bytes).map_err(|e| FeedError::InvalidXml {
        url: feed_url.to_string(),
        reason: e.to_string(),
    })?;

    let image_url = feed
        .logo
        .iter()
        .chain(feed.icon.iter())
        .find_map(|img| Url::parse(&img.uri).ok());

    let episodes = feed
        .entries
        .iter()
        .filter_map(|entry| parse_atom_entry(entry, image_url.as_ref()))
        .collect();

    Ok(Podcast {
        title: feed
            .title
            .and_then(|t| non_blank(&t.content))
            .unwrap_or_else(|| UNTITLED_PODCAST.to_string()),
        description: feed.description.and_then(|d| non_blank(&d.content)),
        link: feed.links.first().and_then(|l| Url::parse(&l.href).ok()),
        author: feed.authors.first().map(|p| p.name.clone()),
        image_url,
        feed_url,
        episodes,
    })
}

fn parse_atom_entry(entry: &feed_rs::model::Entry, feed_image: Option<&Url>) -> Option<Episode> {
    let link = entry
        .links
        .iter()
        .find(|l| l.rel.as_deref() == Some("enclosure"))?;
    let enclosure_url = Url::parse(&link.href).ok()?;
    let pub_date = entry.published.or(entry.updated)?.fixed_offset();

    Some(Episode {
        title: entry
            .title
            .as_ref()
            .and_then(|t| non_blank(&t.content))
            .unwrap_or_else(|| UNTITLED_EPISODE.to_string()),
        description: entry.summary.as_ref().map(|s| s.content.clone()),
        pub_date,
        guid: non_blank(&entry.id).unwrap_or_else(|| enclosure_url.to_string()),
        enclosure: Enclosure {
            url: enclosure_url,
            length: link.length.filter(|len| *len > 0),
            mime_type: link.media_type.clone(),
        },
        artwork_url: feed_image.cloned(),
        duration_secs: None,
        episode_number: None,
        season_number: None,
    })
}

fn non_blank(s: &str) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Parse an RSS publish date, accepting the common deviations from RFC 2822
fn parse_pub_date(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt);
    }

    let formats = [
        "%Y-%m-%d %H:%M:%S %z",
        "%a, %d %b %Y %H:%M %z",
        "%d %b %Y %H:%M:%S %z",
    ];
    for format in formats {
        if let Ok(dt) = DateTime::parse_from_str(raw, format) {
            return Some(dt);
        }
    }

    // Feeds regularly carry a weekday that doesn't match the date
    let (_, without_weekday) = raw.split_once(", ")?;
    DateTime::parse_from_rfc2822(without_weekday)
        .or_else(|_| DateTime::parse_from_str(without_weekday, "%d %b %Y %H:%M:%S %z"))
        .ok()
}

/// Parse an itunes:duration value (`SS`, `MM:SS` or `HH:MM:SS`) into seconds
fn parse_duration_secs(raw: &str) -> Option<u64> {
    let whole = raw.trim().split('.').next()?;
    let parts: Vec<&str> = whole.split(':').collect();
    if parts.len() > 3 {
        return None;
    }
    parts
        .iter()
        .try_fold(0u64, |acc, part| {
            let value = part.trim().parse::<u64>().ok()?;
            acc.checked_mul(60)?.checked_add(value)
        })
}
