//! Poster, campaign, and venue lookup by name.

use crate::text::{compact, tokens, words};
use scm_assistant_gateway::{Gateway, GatewayRequest, json_str, unwrap_rows};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use tracing::{debug, instrument};

const PAGE_SIZE: u32 = 100;

const EXACT_SCORE: usize = 1000;
const SUBSTRING_SCORE: usize = 500;

const NAME_STOPWORDS: &[&str] = &[
    "about", "and", "campaign", "for", "from", "how", "many", "plays", "poster", "show", "stats",
    "the", "this", "venue", "what", "with",
];

/// Kinds of entity resolvable by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Poster,
    Campaign,
    Venue,
}

impl EntityKind {
    /// Gateway list path for this kind.
    #[must_use]
    pub fn list_path(&self) -> &'static str {
        match self {
            Self::Poster => "/posters",
            Self::Campaign => "/ads/campaigns",
            Self::Venue => "/venues",
        }
    }

    fn id_keys(&self) -> &'static [&'static str] {
        match self {
            Self::Poster => &["id", "poster_id", "posterId", "uuid"],
            Self::Campaign => &["id", "campaign_id", "campaignId", "uuid"],
            Self::Venue => &["id", "venue_id", "venueId", "uuid"],
        }
    }

    fn name_keys(&self) -> &'static [&'static str] {
        match self {
            Self::Poster => &["name", "title", "poster_name", "posterName"],
            Self::Campaign => &["name", "title", "campaign_name", "campaignName"],
            Self::Venue => &["name", "venue_name", "venueName", "display_name"],
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Poster => write!(f, "poster"),
            Self::Campaign => write!(f, "campaign"),
            Self::Venue => write!(f, "venue"),
        }
    }
}

/// An entity found by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedEntity {
    pub kind: EntityKind,
    pub id: String,
    pub name: String,
    pub city: Option<String>,
    pub region: Option<String>,
}

impl NamedEntity {
    fn from_row(kind: EntityKind, row: &JsonValue) -> Option<Self> {
        Some(Self {
            kind,
            id: json_str(row, kind.id_keys())?,
            name: json_str(row, kind.name_keys())?,
            city: json_str(row, &["city", "city_code"]).map(|c| c.to_lowercase()),
            region: json_str(row, &["region", "region_code"]).map(|r| r.to_lowercase()),
        })
    }
}

/// Returns true if `name`'s tokens appear as one contiguous run of
/// `fragment`'s tokens.
fn contains_run(fragment: &str, name: &str) -> bool {
    let name = tokens(name);
    !name.is_empty() && tokens(fragment).windows(name.len()).any(|w| w == name.as_slice())
}

/// Scores `name` against the words of `fragment`: exact > substring >
/// count of shared significant words.
///
/// The substring tier needs the whole fragment inside the name, or the
/// name's words as a run inside the fragment; a short name hidden inside
/// one of the fragment's words does not count.
fn score(fragment: &str, name: &str) -> usize {
    let fragment_compact = compact(fragment);
    let name_compact = compact(name);
    if name_compact.is_empty() || fragment_compact.is_empty() {
        return 0;
    }
    if name_compact == fragment_compact {
        return EXACT_SCORE;
    }
    if name_compact.contains(&fragment_compact) || contains_run(fragment, name) {
        return SUBSTRING_SCORE;
    }
    let name_words = words(name);
    significant_words(fragment)
        .iter()
        .filter(|w| name_words.contains(*w))
        .count()
}

fn significant_words(text: &str) -> Vec<String> {
    words(text)
        .into_iter()
        .filter(|w| w.len() >= 3 && !NAME_STOPWORDS.contains(&w.as_str()))
        .collect()
}

/// Resolves entity names through the Gateway.
#[derive(Debug, Clone, Copy, Default)]
pub struct NameResolver;

impl NameResolver {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Finds the entity of `kind` whose name best matches `fragment`.
    ///
    /// Tries a server-side search first, then an unfiltered page. Gateway
    /// errors are logged and yield `None`.
    #[instrument(skip(self, gateway))]
    pub async fn resolve(
        &self,
        gateway: &dyn Gateway,
        kind: EntityKind,
        fragment: &str,
    ) -> Option<NamedEntity> {
        if compact(fragment).is_empty() {
            return None;
        }
        let path = kind.list_path();
        let searched = GatewayRequest::get(path)
            .with_query("search", fragment.trim())
            .with_query("limit", PAGE_SIZE);
        let unfiltered = GatewayRequest::get(path).with_query("limit", PAGE_SIZE);

        for request in [searched, unfiltered] {
            let rows = match gateway.get_json(&request).await {
                Ok(body) => unwrap_rows(&body).map(|e| e.rows).unwrap_or_default(),
                Err(e) => {
                    debug!(%kind, error = %e, "name lookup failed");
                    continue;
                }
            };
            if let Some(found) = Self::best(kind, fragment, &rows) {
                return Some(found);
            }
        }
        None
    }

    fn best(kind: EntityKind, fragment: &str, rows: &[JsonValue]) -> Option<NamedEntity> {
        let mut best: Option<(usize, NamedEntity)> = None;
        for entity in rows.iter().filter_map(|row| NamedEntity::from_row(kind, row)) {
            let score = score(fragment, &entity.name);
            if score > 0 && best.as_ref().is_none_or(|(s, _)| score > *s) {
                best = Some((score, entity));
            }
        }
        best.map(|(_, entity)| entity)
    }
}
