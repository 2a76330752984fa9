// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Episode selection by publish date or title.
//!
//! Dates are compared as calendar days in each episode's own UTC offset, so an
//! episode published at 23:30 -05:00 on the 24th belongs to the 24th no matter
//! which timezone the host runs in.

use chrono::NaiveDate;

use crate::error::ValidationError;
use crate::feed::Episode;

/// Which episodes of a feed to select
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterCriteria {
    /// Every episode published on this calendar day
    ExactDate(NaiveDate),
    /// Inclusive range; a missing bound leaves that side open
    DateRange {
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    },
    /// Case-insensitive literal substring of the title
    Name(String),
    /// The `n` most recently published episodes
    Latest(usize),
}

impl FilterCriteria {
    pub fn exact_date(input: &str) -> Result<Self, ValidationError> {
        Ok(Self::ExactDate(parse_date(input)?))
    }

    pub fn date_range(start: Option<&str>, end: Option<&str>) -> Result<Self, ValidationError> {
        let criteria = Self::DateRange {
            start: start.map(parse_date).transpose()?,
            end: end.map(parse_date).transpose()?,
        };
        criteria.validate()?;
        Ok(criteria)
    }

    pub fn name(needle: &str) -> Result<Self, ValidationError> {
        let criteria = Self::Name(needle.to_string());
        criteria.validate()?;
        Ok(criteria)
    }

    pub fn latest(count: usize) -> Result<Self, ValidationError> {
        let criteria = Self::Latest(count);
        criteria.validate()?;
        Ok(criteria)
    }

    /// Reject criteria that can never be satisfied sensibly
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Self::DateRange {
                start: Some(start),
                end: Some(end),
            } if start > end => Err(ValidationError::InvertedRange {
                start: start.to_string(),
                end: end.to_string(),
            }),
            Self::Name(needle) if needle.trim().is_empty() => Err(ValidationError::EmptyName),
            Self::Latest(0) => Err(ValidationError::ZeroLatest),
            _ => Ok(()),
        }
    }
}

/// Parse a strict `YYYY-MM-DD` date
pub fn parse_date(input: &str) -> Result<NaiveDate, ValidationError> {
    let invalid = || ValidationError::InvalidDate {
        input: input.to_string(),
    };

    let trimmed = input.trim();
    // chrono accepts unpadded fields; the CLI contract doesn't
    if trimmed.len() != 10 {
        return Err(invalid());
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").map_err(|_| invalid())
}

/// Calendar day of an episode in its own offset
fn local_day(episode: &Episode) -> NaiveDate {
    episode.pub_date.date_naive()
}

/// Select the episodes matching `criteria`, keeping feed order
pub fn select(episodes: &[Episode], criteria: &FilterCriteria) -> Vec<Episode> {
    match criteria {
        FilterCriteria::ExactDate(day) => episodes
            .iter()
            .filter(|e| local_day(e) == *day)
            .cloned()
            .collect(),
        FilterCriteria::DateRange { start, end } => episodes
            .iter()
            .filter(|e| {
                let day = local_day(e);
                start.is_none_or(|s| day >= s) && end.is_none_or(|en| day <= en)
            })
            .cloned()
            .collect(),
        FilterCriteria::Name(needle) => {
            let needle = needle.to_lowercase();
            episodes
                .iter()
                .filter(|e| e.title.to_lowercase().contains(&needle))
                .cloned()
                .collect()
        }
        FilterCriteria::Latest(count) => {
            let mut newest: Vec<usize> = (0..episodes.len()).collect();
            newest.sort_by(|&a, &b| episodes[b].pub_date.cmp(&episodes[a].pub_date));
            newest.truncate(*count);
            newest.sort_unstable();
            newest.into_iter().map(|i| episodes[i].clone()).collect()
        }
    }
}

/// Oldest first; the input is left untouched
pub fn sort_by_date_ascending(episodes: &[Episode]) -> Vec<Episode> {
    let mut sorted = episodes.to_vec();
    sorted.sort_by_key(|e| e.pub_date);
    sorted
}

/// Newest first; the input is left untouched
pub fn sort_by_date_descending(episodes: &[Episode]) -> Vec<Episode> {
    let mut sorted = episodes.to_vec();
    sorted.sort_by(|a, b| b.pub_date.cmp(&a.pub_date));
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::make_episode;

    fn ep(title: &str, date: &str) -> Episode {
        make_episode(title, date, "https://example.com/ep.mp3")
    }

    fn titles(episodes: &[Episode]) -> Vec<&str> {
        episodes.iter().map(|e| e.title.as_str()).collect()
    }

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    // === Date parsing ===

    #[test]
    fn parse_date_accepts_iso_dates() {
        assert_eq!(parse_date("2024-04-25").unwrap(), day("2024-04-25"));
    }

    #[test]
    fn parse_date_rejects_malformed_input() {
        for bad in ["2024-4-25", "25-04-2024", "2024/04/25", "2024-02-30", "", "yesterday"] {
            assert_eq!(
                parse_date(bad),
                Err(ValidationError::InvalidDate {
                    input: bad.to_string()
                }),
                "{bad} should be rejected"
            );
        }
    }

    // === Exact date ===

    #[test]
    fn exact_date_matches_whole_local_day() {
        let episodes = vec![
            ep("before", "2024-04-24T23:59:59+00:00"),
            ep("early", "2024-04-25T00:00:00+00:00"),
            ep("late", "2024-04-25T23:59:59+00:00"),
            ep("after", "2024-04-26T00:00:00+00:00"),
        ];
        let selected = select(&episodes, &FilterCriteria::exact_date("2024-04-25").unwrap());
        assert_eq!(titles(&selected), vec!["early", "late"]);
    }

    #[test]
    fn exact_date_uses_the_episode_offset_not_utc() {
        // 2024-04-25 22:00 at -05:00 is 2024-04-26 03:00 UTC
        // 2024-04-25 01:00 at +09:00 is 2024-04-24 16:00 UTC
        let episodes = vec![
            ep("new york evening", "2024-04-25T22:00:00-05:00"),
            ep("tokyo morning", "2024-04-25T01:00:00+09:00"),
            ep("next day", "2024-04-26T01:00:00-05:00"),
        ];
        let selected = select(&episodes, &FilterCriteria::exact_date("2024-04-25").unwrap());
        assert_eq!(titles(&selected), vec!["new york evening", "tokyo morning"]);
    }

    #[test]
    fn exact_date_returns_every_episode_on_that_day() {
        let episodes = vec![
            ep("a", "2024-01-15T08:00:00+00:00"),
            ep("b", "2024-01-16T08:00:00+00:00"),
            ep("c", "2024-01-15T18:00:00+00:00"),
        ];
        let selected = select(&episodes, &FilterCriteria::ExactDate(day("2024-01-15")));
        assert_eq!(titles(&selected), vec!["a", "c"]);
    }

    // === Date range ===

    fn three_days() -> Vec<Episode> {
        vec![
            ep("jan 15", "2024-01-15T10:00:00+00:00"),
            ep("jan 16", "2024-01-16T10:00:00+00:00"),
            ep("jan 17", "2024-01-17T10:00:00+00:00"),
        ]
    }

    #[test]
    fn range_is_inclusive_on_both_ends() {
        let criteria = FilterCriteria::date_range(Some("2024-01-15"), Some("2024-01-16")).unwrap();
        assert_eq!(titles(&select(&three_days(), &criteria)), vec!["jan 15", "jan 16"]);
    }

    #[test]
    fn range_with_only_start_is_open_ended() {
        let criteria = FilterCriteria::date_range(Some("2024-01-16"), None).unwrap();
        assert_eq!(titles(&select(&three_days(), &criteria)), vec!["jan 16", "jan 17"]);
    }

    #[test]
    fn range_with_only_end_is_open_ended() {
        let criteria = FilterCriteria::date_range(None, Some("2024-01-16")).unwrap();
        assert_eq!(titles(&select(&three_days(), &criteria)), vec!["jan 15", "jan 16"]);
    }

    #[test]
    fn range_on_a_single_day() {
        let criteria = FilterCriteria::date_range(Some("2024-01-17"), Some("2024-01-17")).unwrap();
        assert_eq!(titles(&select(&three_days(), &criteria)), vec!["jan 17"]);
    }

    #[test]
    fn inverted_range_is_rejected() {
        let result = FilterCriteria::date_range(Some("2024-01-17"), Some("2024-01-15"));
        assert!(matches!(result, Err(ValidationError::InvertedRange { .. })));
    }

    #[test]
    fn range_with_bad_bound_is_rejected() {
        let result = FilterCriteria::date_range(Some("2024-01-15"), Some("soon"));
        assert!(matches!(result, Err(ValidationError::InvalidDate { .. })));
    }

    // === Name ===

    #[test]
    fn name_matches_case_insensitively() {
        let episodes = vec![
            ep("The Rust Hour", "2024-01-15T10:00:00+00:00"),
            ep("Go Weekly", "2024-01-16T10:00:00+00:00"),
            ep("RUSTACEAN station", "2024-01-17T10:00:00+00:00"),
        ];
        let selected = select(&episodes, &FilterCriteria::name("rust").unwrap());
        assert_eq!(titles(&selected), vec!["The Rust Hour", "RUSTACEAN station"]);
    }

    #[test]
    fn name_matches_special_characters_literally() {
        let episodes = vec![
            ep("Q&A (part 1) [live]", "2024-01-15T10:00:00+00:00"),
            ep("QA part 1 live", "2024-01-16T10:00:00+00:00"),
            ep("Costs $5.99?", "2024-01-17T10:00:00+00:00"),
        ];
        assert_eq!(
            titles(&select(&episodes, &FilterCriteria::name("(part 1) [").unwrap())),
            vec!["Q&A (part 1) [live]"]
        );
        assert_eq!(
            titles(&select(&episodes, &FilterCriteria::name("$5.9").unwrap())),
            vec!["Costs $5.99?"]
        );
        assert!(select(&episodes, &FilterCriteria::name(".*").unwrap()).is_empty());
    }

    #[test]
    fn empty_name_is_rejected() {
        assert_eq!(FilterCriteria::name("  "), Err(ValidationError::EmptyName));
    }

    // === Latest ===

    #[test]
    fn latest_picks_newest_and_keeps_feed_order() {
        let episodes = vec![
            ep("middle", "2024-01-16T10:00:00+00:00"),
            ep("oldest", "2024-01-15T10:00:00+00:00"),
            ep("newest", "2024-01-17T10:00:00+00:00"),
        ];
        let selected = select(&episodes, &FilterCriteria::latest(2).unwrap());
        assert_eq!(titles(&selected), vec!["middle", "newest"]);
    }

    #[test]
    fn latest_larger_than_feed_returns_everything() {
        let selected = select(&three_days(), &FilterCriteria::Latest(10));
        assert_eq!(selected.len(), 3);
    }

    #[test]
    fn zero_latest_is_rejected() {
        assert_eq!(FilterCriteria::latest(0), Err(ValidationError::ZeroLatest));
    }

    // === Sorting ===

    #[test]
    fn sorting_returns_new_vectors() {
        let episodes = vec![
            ep("b", "2024-01-16T10:00:00+00:00"),
            ep("c", "2024-01-17T10:00:00+00:00"),
            ep("a", "2024-01-15T10:00:00+00:00"),
        ];

        assert_eq!(titles(&sort_by_date_ascending(&episodes)), vec!["a", "b", "c"]);
        assert_eq!(titles(&sort_by_date_descending(&episodes)), vec!["c", "b", "a"]);
        assert_eq!(titles(&episodes), vec!["b", "c", "a"]);
    }

    #[test]
    fn sorting_compares_instants_across_offsets() {
        let episodes = vec![
            // 2024-01-15 12:00 UTC
            ep("later", "2024-01-15T07:00:00-05:00"),
            // 2024-01-15 10:00 UTC
            ep("earlier", "2024-01-15T11:00:00+01:00"),
        ];
        assert_eq!(
            titles(&sort_by_date_ascending(&episodes)),
            vec!["earlier", "later"]
        );
    }
}
