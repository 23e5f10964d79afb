//! City and region detection in free text.

use crate::cache::{EntityCache, LocationCodes};
use crate::text::words;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Codes this short only match as standalone words next to a marker word.
const SHORT_CODE_LEN: usize = 2;
const MARKER_WORDS: &[&str] = &["city", "region"];

/// A geographic filter: either, both, or neither of city and region.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationScope {
    pub city: Option<String>,
    pub region: Option<String>,
}

impl LocationScope {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.city.is_none() && self.region.is_none()
    }

    /// Fills missing fields from `fallback`, usually remembered scope.
    ///
    /// A scope that names anything is taken as-is so "in brt" after
    /// "city moco" does not silently keep the old city.
    #[must_use]
    pub fn or_remembered(self, fallback: &LocationScope) -> LocationScope {
        if self.is_empty() {
            fallback.clone()
        } else {
            self
        }
    }

    /// Renders as `city=moco region=brt` for answers and prompts.
    #[must_use]
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if let Some(city) = &self.city {
            parts.push(format!("city={city}"));
        }
        if let Some(region) = &self.region {
            parts.push(format!("region={region}"));
        }
        if parts.is_empty() {
            "all locations".to_string()
        } else {
            parts.join(" ")
        }
    }
}

struct Message {
    lower: String,
    words: Vec<String>,
}

impl Message {
    fn new(text: &str) -> Self {
        Self {
            lower: text.to_lowercase(),
            words: words(text),
        }
    }

    fn has_word(&self, word: &str) -> bool {
        self.words.iter().any(|w| w == word)
    }

    fn has_marker(&self) -> bool {
        MARKER_WORDS.iter().any(|m| self.has_word(m))
    }

    /// The word right after `marker`, else the word right before it.
    fn adjacent_to(&self, marker: &str, accept: impl Fn(&str) -> bool) -> Option<String> {
        let positions = self
            .words
            .iter()
            .enumerate()
            .filter(|(_, w)| *w == marker)
            .map(|(i, _)| i);
        let mut before = None;
        for i in positions {
            if let Some(next) = self.words.get(i + 1)
                && accept(next.as_str())
            {
                return Some(next.clone());
            }
            if before.is_none()
                && let Some(prev) = i.checked_sub(1).and_then(|p| self.words.get(p))
                && accept(prev.as_str())
            {
                before = Some(prev.clone());
            }
        }
        before
    }

    fn is_adjacent_to(&self, marker: &str, code: &str) -> bool {
        self.words.windows(2).any(|pair| {
            (pair[0] == marker && pair[1] == code) || (pair[0] == code && pair[1] == marker)
        })
    }
}

impl LocationCodes {
    /// Detects both city and region in one message.
    #[must_use]
    pub fn detect(&self, message: &str) -> LocationScope {
        let region = self.detect_region(message);
        let city = self.detect_city(message, region.as_deref());
        LocationScope { city, region }
    }

    /// Detects a region code.
    ///
    /// "region X" and "X region" win outright. Otherwise codes are tried
    /// longest first; a code that is also a city or project is only taken
    /// with the word "region" present, and never when it sits next to "city".
    #[must_use]
    pub fn detect_region(&self, message: &str) -> Option<String> {
        let msg = Message::new(message);
        if let Some(code) = msg.adjacent_to("region", |w| self.regions.contains(w)) {
            return Some(code);
        }

        let explicit_region = msg.has_word("region");
        longest_first(self.regions.iter())
            .into_iter()
            .filter(|code| explicit_region || !self.is_city_like(code))
            .filter(|code| !msg.is_adjacent_to("city", code))
            .find(|code| self.mentions(&msg, code))
            .cloned()
    }

    /// Detects a city code, resolving project codes to their city.
    ///
    /// `region` is the region already detected in the same message; a code
    /// claimed as the region is not also taken as the city.
    #[must_use]
    pub fn detect_city(&self, message: &str, region: Option<&str>) -> Option<String> {
        let msg = Message::new(message);
        let candidates: Vec<&String> = self.cities.iter().chain(self.projects.keys()).collect();

        let explicit = msg.adjacent_to("city", |w| self.is_city_like(w));
        let code = explicit.or_else(|| {
            longest_first(candidates.into_iter())
                .into_iter()
                .filter(|code| Some(code.as_str()) != region)
                .find(|code| self.mentions(&msg, code))
                .cloned()
        })?;

        match self.projects.get(&code) {
            Some(city) if !self.cities.contains(&code) => Some(city.clone()),
            _ => Some(code),
        }
    }

    /// Returns true if `word` is a known code or one word of a project code.
    #[must_use]
    pub fn is_code_word(&self, word: &str) -> bool {
        self.cities.contains(word)
            || self.regions.contains(word)
            || self.projects.keys().any(|code| words(code).iter().any(|w| w == word))
    }

    fn mentions(&self, msg: &Message, code: &str) -> bool {
        if code.len() <= SHORT_CODE_LEN {
            return msg.has_marker() && msg.has_word(code);
        }
        // A longer known code containing this one is not a mention of it.
        let mut text = msg.lower.clone();
        for longer in self.all_codes() {
            if longer.len() > code.len() && longer.contains(code) {
                text = text.replace(longer.as_str(), " ");
            }
        }
        text.contains(code)
    }

    fn all_codes(&self) -> impl Iterator<Item = &String> {
        self.cities
            .iter()
            .chain(self.regions.iter())
            .chain(self.projects.keys())
    }
}

fn longest_first<'a>(codes: impl Iterator<Item = &'a String>) -> Vec<&'a String> {
    let mut codes: Vec<&String> = codes.collect();
    codes.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    codes.dedup();
    codes
}

/// Detects location scope using the shared code cache.
#[derive(Clone)]
pub struct LocationResolver {
    cache: Arc<EntityCache>,
}

impl LocationResolver {
    #[must_use]
    pub fn new(cache: Arc<EntityCache>) -> Self {
        Self { cache }
    }

    /// Detects the scope named in `message`. Returns an empty scope when the
    /// cache holds no codes.
    pub async fn detect(&self, message: &str) -> LocationScope {
        self.cache.codes().await.detect(message)
    }

    /// The known codes, for callers that inspect more than the detected
    /// scope.
    pub async fn codes(&self) -> LocationCodes {
        self.cache.codes().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, BTreeSet};

    fn codes() -> LocationCodes {
        let set = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>();
        LocationCodes {
            cities: set(&["moco", "dc", "balt"]),
            regions: set(&["brt", "nw", "moco", "bal"]),
            projects: BTreeMap::from([("purple-line".to_string(), "moco".to_string())]),
        }
    }

    #[test]
    fn short_codes_need_a_marker_word() {
        let codes = codes();
        assert_eq!(codes.detect_city("posters shown today", None), None);
        assert_eq!(codes.detect_city("dc posters", None), None);
        assert_eq!(codes.detect_city("posters in city dc", None), Some("dc".into()));
        assert_eq!(codes.detect_region("nw region plays"), Some("nw".into()));
        assert_eq!(codes.detect_region("the snow is bad"), None);
    }

    #[test]
    fn longer_codes_match_by_containment() {
        let codes = codes();
        assert_eq!(codes.detect_region("top 5 posters in brt by plays"), Some("brt".into()));
        assert_eq!(codes.detect_city("stats for baltimore", None), Some("balt".into()));
    }

    #[test]
    fn shorter_code_inside_longer_one_is_ignored() {
        let codes = codes();
        assert_eq!(codes.detect_region("kiosks in balt"), None);
    }

    #[test]
    fn city_wins_for_shared_code_without_region_word() {
        let codes = codes();
        let scope = codes.detect("top posters in moco");
        assert_eq!(scope.city.as_deref(), Some("moco"));
        assert_eq!(scope.region, None);

        let scope = codes.detect("top posters region moco");
        assert_eq!(scope.region.as_deref(), Some("moco"));
        assert_eq!(scope.city, None);
    }

    #[test]
    fn explicit_city_and_region_in_one_message() {
        let scope = codes().detect("city moco region brt");
        assert_eq!(scope.city.as_deref(), Some("moco"));
        assert_eq!(scope.region.as_deref(), Some("brt"));
    }

    #[test]
    fn region_adjacency_prefers_following_word() {
        let codes = codes();
        assert_eq!(codes.detect_region("brt region moco"), Some("moco".into()));
        assert_eq!(codes.detect_region("brt region stats"), Some("brt".into()));
    }

    #[test]
    fn project_code_resolves_to_city() {
        let scope = codes().detect("plays on the purple-line project");
        assert_eq!(scope.city.as_deref(), Some("moco"));
    }

    #[test]
    fn code_words_include_project_parts() {
        let codes = codes();
        assert!(codes.is_code_word("brt"));
        assert!(codes.is_code_word("purple"));
        assert!(!codes.is_code_word("posters"));
    }

    #[test]
    fn scope_fallback_and_description() {
        let remembered = LocationScope {
            city: Some("moco".into()),
            region: Some("brt".into()),
        };
        assert_eq!(LocationScope::default().or_remembered(&remembered), remembered);

        let explicit = LocationScope {
            city: Some("dc".into()),
            region: None,
        };
        assert_eq!(explicit.clone().or_remembered(&remembered), explicit);
        assert_eq!(remembered.describe(), "city=moco region=brt");
        assert_eq!(LocationScope::default().describe(), "all locations");
    }
}
