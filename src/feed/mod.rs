mod fetch;
mod parse;

pub use fetch::{fetch_feed, fetch_feed_bytes};
pub use parse::{Enclosure, Episode, Podcast, UNTITLED_EPISODE, parse_feed};
