//! Fuzzy device description to canonical host resolution.
//!
//! Deployments name their full-text search parameter differently, so the
//! resolver tries `query`, `q` and `search` in turn (each scoped by the
//! remembered city first), scores every returned row locally, and only
//! then falls back to a bounded walk of the whole device list.

use crate::text::{compact, device_tokens, find_host_token, tokens, words};
use scm_assistant_core::RequestContext;
use scm_assistant_gateway::{
    Gateway, GatewayRequest, PageLimits, json_str, unwrap_rows, walk_pages,
};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::collections::BTreeSet;
use tracing::{debug, instrument};

const SEARCH_PARAMS: &[&str] = &["query", "q", "search"];

const NAME_FIELDS: &[&str] = &[
    "kiosk_name",
    "kioskName",
    "device_name",
    "deviceName",
    "display_name",
    "displayName",
    "name",
    "description",
    "stop_name",
    "stopName",
    "facing",
    "host",
    "hostname",
    "host_name",
    "hostName",
    "server_id",
    "serverId",
];

const HOST_FIELDS: &[&str] = &["host", "hostname", "host_name", "hostName", "server_id", "serverId"];
const LABEL_FIELDS: &[&str] = &["kiosk_name", "kioskName", "display_name", "displayName", "device_name", "deviceName", "name"];

/// Independent query tokens a row must hit before it is scored at all.
pub const MIN_TOKEN_HITS: usize = 2;

const EXACT_SCORE: f64 = 1.0;
const CONTAINS_SCORE: f64 = 0.8;
const TOKEN_SCORE: f64 = 0.6;

/// Tuning for device search.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DeviceSearchConfig {
    /// Rows requested per search or page.
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Page ceiling for the full-list fallback.
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
    /// Minimum score to accept a match.
    #[serde(default = "default_threshold")]
    pub threshold: f64,
}

fn default_page_size() -> u32 {
    100
}

fn default_max_pages() -> u32 {
    5
}

fn default_threshold() -> f64 {
    0.5
}

impl Default for DeviceSearchConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            max_pages: default_max_pages(),
            threshold: default_threshold(),
        }
    }
}

/// A resolved device.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceMatch {
    /// Canonical host identifier.
    pub host: String,
    /// Human-readable name, when the row had one.
    pub label: Option<String>,
    /// Match score in `0.0..=1.0`.
    pub score: f64,
}

struct Query {
    text: String,
    compact: String,
    tokens: Vec<String>,
}

impl Query {
    fn parse(description: &str) -> Option<Self> {
        let tokens = device_tokens(description);
        if tokens.len() < MIN_TOKEN_HITS {
            return None;
        }
        let stripped: Vec<String> = words(description)
            .into_iter()
            .filter(|w| device_tokens(w).iter().any(|t| tokens.contains(t)))
            .collect();
        Some(Self {
            compact: tokens.concat(),
            text: stripped.join(" "),
            tokens,
        })
    }

    /// Scores one row, or `None` when it hits too few tokens.
    fn score(&self, row: &JsonValue) -> Option<f64> {
        let mut hits = BTreeSet::new();
        let mut best = 0.0_f64;

        for field in NAME_FIELDS {
            let Some(value) = json_str(row, &[*field]) else {
                continue;
            };
            let field_compact = compact(&value);
            let field_tokens = tokens(&value);

            let score = if field_compact == self.compact {
                EXACT_SCORE
            } else if !field_compact.is_empty() && field_compact.contains(&self.compact) {
                CONTAINS_SCORE
            } else {
                let matched = self
                    .tokens
                    .iter()
                    .filter(|t| field_tokens.contains(*t))
                    .count();
                // Lossless: both counts are tiny.
                TOKEN_SCORE * matched as f64 / self.tokens.len() as f64
            };
            best = best.max(score);
            // Only whole tokens count as hits: "dart2" inside "dart20" is a
            // substring, not a second hit.
            hits.extend(self.tokens.iter().filter(|t| field_tokens.contains(*t)).cloned());
        }

        (hits.len() >= MIN_TOKEN_HITS).then_some(best)
    }

    /// Best-scoring row, earliest first on ties.
    fn best(&self, rows: &[JsonValue]) -> Option<DeviceMatch> {
        let mut best: Option<DeviceMatch> = None;
        for row in rows {
            let Some(score) = self.score(row) else {
                continue;
            };
            let Some(host) = json_str(row, HOST_FIELDS) else {
                continue;
            };
            if best.as_ref().is_none_or(|b| score > b.score) {
                best = Some(DeviceMatch {
                    host: host.to_lowercase(),
                    label: json_str(row, LABEL_FIELDS),
                    score,
                });
            }
        }
        best
    }
}

/// Resolves free-text device descriptions to hosts.
#[derive(Debug, Clone, Default)]
pub struct DeviceResolver {
    config: DeviceSearchConfig,
}

impl DeviceResolver {
    #[must_use]
    pub fn new(config: DeviceSearchConfig) -> Self {
        Self { config }
    }

    /// Resolves `description` to a host.
    ///
    /// A canonical host token in the text is returned as-is. Otherwise the
    /// Gateway is searched; `None` means nothing cleared the threshold,
    /// including when every Gateway call failed.
    #[instrument(skip(self, gateway, ctx))]
    pub async fn resolve(
        &self,
        gateway: &dyn Gateway,
        ctx: &RequestContext,
        description: &str,
        city: Option<&str>,
    ) -> Option<DeviceMatch> {
        if let Some(host) = find_host_token(description) {
            return Some(DeviceMatch {
                host,
                label: None,
                score: EXACT_SCORE,
            });
        }
        let query = Query::parse(description)?;

        let scopes = match city {
            Some(city) => vec![Some(city), None],
            None => vec![None],
        };
        let mut best: Option<DeviceMatch> = None;
        for param in SEARCH_PARAMS {
            for scope in &scopes {
                if ctx.is_done() {
                    return self.accept(best);
                }
                let request = GatewayRequest::get("/devices")
                    .with_query(*param, &query.text)
                    .with_query("limit", self.config.page_size)
                    .with_query_opt("city", *scope);
                let rows = match gateway.get_json(&request).await {
                    Ok(body) => unwrap_rows(&body).map(|e| e.rows).unwrap_or_default(),
                    Err(e) => {
                        debug!(param, error = %e, "device search failed");
                        continue;
                    }
                };
                if let Some(candidate) = query.best(&rows)
                    && best.as_ref().is_none_or(|b| candidate.score > b.score)
                {
                    best = Some(candidate);
                }
                if best
                    .as_ref()
                    .is_some_and(|b| b.score >= self.config.threshold)
                {
                    return best;
                }
            }
        }

        let limits = PageLimits::new(self.config.page_size, self.config.max_pages);
        match walk_pages(gateway, ctx, &GatewayRequest::get("/devices"), limits).await {
            Ok(walk) => {
                debug!(rows = walk.rows.len(), stop = ?walk.stop, "device list walked");
                if let Some(candidate) = query.best(&walk.rows)
                    && best.as_ref().is_none_or(|b| candidate.score > b.score)
                {
                    best = Some(candidate);
                }
            }
            Err(e) => debug!(error = %e, "device list walk failed"),
        }
        self.accept(best)
    }

    fn accept(&self, best: Option<DeviceMatch>) -> Option<DeviceMatch> {
        best.filter(|b| b.score >= self.config.threshold)
    }
}
