//! Parameter extraction from operator messages.

use chrono::{Datelike, Duration, NaiveDate};
use scm_assistant_resolve::text::words;
use std::fmt;

/// Default and maximum length of ranked lists.
pub const DEFAULT_TOP_N: usize = 10;
pub const MAX_TOP_N: usize = 10;

/// The count a stats query ranks or sums by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Metric {
    #[default]
    Plays,
    Impressions,
}

impl Metric {
    /// Detects the metric named in a message; plays unless impressions are
    /// mentioned.
    #[must_use]
    pub fn detect(message: &str) -> Self {
        let words = words(message);
        if words
            .iter()
            .any(|w| w == "impression" || w == "impressions" || w == "views")
        {
            Self::Impressions
        } else {
            Self::Plays
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plays => "plays",
            Self::Impressions => "impressions",
        }
    }

    /// Row keys that may carry this metric's count.
    #[must_use]
    pub fn count_keys(&self) -> &'static [&'static str] {
        match self {
            Self::Plays => &["plays", "play_count", "playCount", "total_plays", "count", "total"],
            Self::Impressions => &[
                "impressions",
                "impression_count",
                "impressionCount",
                "total_impressions",
                "count",
                "total",
            ],
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reads "top N"; `None` when the message has no number after "top".
/// The result is capped at [`MAX_TOP_N`].
#[must_use]
pub fn top_n(message: &str) -> Option<usize> {
    let words = words(message);
    words
        .windows(2)
        .find(|pair| pair[0] == "top")
        .and_then(|pair| pair[1].parse::<usize>().ok())
        .filter(|n| *n > 0)
        .map(|n| n.min(MAX_TOP_N))
}

/// An inclusive date range; either end may be open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    /// Parses the first date phrase found:
    /// "from X to Y", "between X and Y", "since X", "today", "yesterday",
    /// "last N days", "this week". Dates are `YYYY-MM-DD`.
    #[must_use]
    pub fn parse(message: &str, today: NaiveDate) -> Self {
        let lower = message.to_lowercase();
        let tokens: Vec<&str> = lower
            .split(|c: char| c.is_whitespace() || matches!(c, ',' | '?' | '!' | '(' | ')'))
            .filter(|t| !t.is_empty())
            .collect();

        for (i, token) in tokens.iter().enumerate() {
            let next_date = |offset: usize| tokens.get(i + offset).and_then(|t| parse_date(t));
            match *token {
                "from" | "between" => {
                    if let Some(start) = next_date(1) {
                        let end = match tokens.get(i + 2) {
                            Some(&"to" | &"and" | &"until" | &"through") => next_date(3),
                            _ => None,
                        };
                        return Self {
                            start: Some(start),
                            end,
                        };
                    }
                }
                "since" | "after" => {
                    if let Some(start) = next_date(1) {
                        return Self {
                            start: Some(start),
                            end: None,
                        };
                    }
                }
                "today" => return Self::single(today),
                "yesterday" => return Self::single(today - Duration::days(1)),
                "last" | "past" => {
                    if let Some(n) = tokens.get(i + 1).and_then(|t| t.parse::<i64>().ok())
                        && tokens
                            .get(i + 2)
                            .is_some_and(|t| t.trim_end_matches('.').starts_with("day"))
                        && n > 0
                    {
                        return Self {
                            start: Some(today - Duration::days(n - 1)),
                            end: Some(today),
                        };
                    }
                }
                "this" if tokens.get(i + 1).is_some_and(|t| t.starts_with("week")) => {
                    let monday = today
                        - Duration::days(i64::from(today.weekday().num_days_from_monday()));
                    return Self {
                        start: Some(monday),
                        end: Some(today),
                    };
                }
                _ => {}
            }
        }
        Self::default()
    }

    fn single(day: NaiveDate) -> Self {
        Self {
            start: Some(day),
            end: Some(day),
        }
    }

    /// Renders as `2024-05-01 to 2024-05-07`, `since 2024-05-01`, or
    /// `all time`.
    #[must_use]
    pub fn describe(&self) -> String {
        match (self.start, self.end) {
            (Some(start), Some(end)) if start == end => format!("on {start}"),
            (Some(start), Some(end)) => format!("{start} to {end}"),
            (Some(start), None) => format!("since {start}"),
            (None, Some(end)) => format!("until {end}"),
            (None, None) => "all time".to_string(),
        }
    }
}

fn parse_date(token: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(token.trim_end_matches('.'), "%Y-%m-%d").ok()
}

/// Text following the first occurrence of `keyword`, up to a word that
/// starts a modifier ("in", "since", "for", ...). Used to pull an entity
/// name out of "plays for poster Spring Sale in brt".
#[must_use]
pub fn phrase_after(message: &str, keyword: &str) -> Option<String> {
    const STOP: &[&str] = &[
        "in", "at", "on", "since", "from", "between", "for", "today", "yesterday", "last",
        "this", "by", "during", "region", "city", "with", "stats", "statistics", "impressions",
        "plays", "info", "details", "performance", "summary", "report",
    ];
    const SKIP: &[&str] = &["named", "called", "the", "id"];

    let lower = message.to_lowercase();
    let raw: Vec<&str> = lower.split_whitespace().collect();
    let start = raw
        .iter()
        .position(|w| w.trim_matches(|c: char| !c.is_alphanumeric()) == keyword)?;
    let phrase: Vec<&str> = raw[start + 1..]
        .iter()
        .map(|w| w.trim_matches(|c: char| !(c.is_alphanumeric() || c == '-')))
        .skip_while(|w| SKIP.contains(w))
        .take_while(|w| !STOP.contains(w))
        .filter(|w| !w.is_empty())
        .collect();
    (!phrase.is_empty()).then(|| phrase.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn top_n_defaults_and_caps() {
        assert_eq!(top_n("top 5 posters in brt"), Some(5));
        assert_eq!(top_n("top 25 posters"), Some(MAX_TOP_N));
        assert_eq!(top_n("top posters"), None);
        assert_eq!(top_n("top 0 posters"), None);
    }

    #[test]
    fn metric_detection() {
        assert_eq!(Metric::detect("top 5 posters in brt by plays"), Metric::Plays);
        assert_eq!(Metric::detect("campaign impressions"), Metric::Impressions);
        assert_eq!(Metric::detect("top posters"), Metric::Plays);
    }

    #[test]
    fn explicit_ranges() {
        let today = day("2024-05-10");
        assert_eq!(
            DateRange::parse("plays from 2024-05-01 to 2024-05-07", today),
            DateRange {
                start: Some(day("2024-05-01")),
                end: Some(day("2024-05-07"))
            }
        );
        assert_eq!(
            DateRange::parse("between 2024-04-01 and 2024-04-30?", today).end,
            Some(day("2024-04-30"))
        );
        let since = DateRange::parse("plays since 2024-05-03", today);
        assert_eq!(since.start, Some(day("2024-05-03")));
        assert_eq!(since.end, None);
    }

    #[test]
    fn relative_ranges() {
        let today = day("2024-05-10"); // a Friday
        assert_eq!(DateRange::parse("plays today", today).describe(), "on 2024-05-10");
        assert_eq!(DateRange::parse("yesterday", today).start, Some(day("2024-05-09")));
        assert_eq!(
            DateRange::parse("last 7 days", today),
            DateRange {
                start: Some(day("2024-05-04")),
                end: Some(today)
            }
        );
        assert_eq!(DateRange::parse("this week", today).start, Some(day("2024-05-06")));
        assert!(DateRange::parse("top posters", today).is_empty());
    }

    #[test]
    fn phrase_after_keyword() {
        assert_eq!(
            phrase_after("plays for poster Spring Sale in brt", "poster"),
            Some("spring sale".to_string())
        );
        assert_eq!(
            phrase_after("venue named Union Station?", "venue"),
            Some("union station".to_string())
        );
        assert_eq!(phrase_after("campaign stats", "campaign"), None);
        assert_eq!(
            phrase_after("campaign Spring Promo impressions", "campaign"),
            Some("spring promo".to_string())
        );
        assert_eq!(phrase_after("show the campaign", "campaign"), None);
    }
}
