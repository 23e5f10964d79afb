//! The deterministic intent handlers.
//!
//! Each handler follows the same shape: a keyword gate, parameter
//! extraction with memory fallback, a clarifying question when a required
//! piece is missing, one or more Gateway reads with at most one
//! shape-guessing retry, and a rendered answer.

mod campaign_stats;
mod device_telemetry;
mod pop_stats;
mod poster_plays;
mod scope;
mod top_posters;
mod venue_info;

pub use campaign_stats::CampaignStatsHandler;
pub use device_telemetry::DeviceTelemetryHandler;
pub use pop_stats::PopStatsHandler;
pub use poster_plays::PosterPlaysHandler;
pub use scope::ScopeHandler;
pub use top_posters::TopPostersHandler;
pub use venue_info::VenueInfoHandler;

use crate::handler::{HandlerOutcome, IntentRouter};
use crate::params::DateRange;
use rootcause::Report;
use scm_assistant_gateway::{
    Gateway, GatewayError, GatewayRequest, GatewayResponse, json_number, json_str,
};
use scm_assistant_resolve::LocationScope;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::debug;

/// Replies longer than this are treated as new requests, not answers to a
/// clarifying question.
pub(crate) const MAX_ANSWER_WORDS: usize = 6;

/// The standard handler chain, highest priority first.
#[must_use]
pub fn default_router() -> IntentRouter {
    IntentRouter::new()
        .with_handler(Arc::new(ScopeHandler))
        .with_handler(Arc::new(DeviceTelemetryHandler))
        .with_handler(Arc::new(TopPostersHandler))
        .with_handler(Arc::new(PosterPlaysHandler))
        .with_handler(Arc::new(CampaignStatsHandler))
        .with_handler(Arc::new(VenueInfoHandler))
        .with_handler(Arc::new(PopStatsHandler))
}

/// Returns true if `reply` is short enough to be an answer to a question.
pub(crate) fn looks_like_answer(reply: &str) -> bool {
    let count = reply.split_whitespace().count();
    count > 0 && count <= MAX_ANSWER_WORDS
}

/// Sends `primary`; when it comes back with one of `retry_on`, sends
/// `fallback` once instead.
pub(crate) async fn send_with_fallback(
    gateway: &dyn Gateway,
    primary: &GatewayRequest,
    fallback: Option<&GatewayRequest>,
    retry_on: &[u16],
) -> Result<GatewayResponse, Report<GatewayError>> {
    let response = gateway.send(primary).await?;
    match fallback {
        Some(fallback) if retry_on.contains(&response.status) => {
            debug!(
                status = response.status,
                retry = %fallback.display_target(),
                "retrying with alternate request shape"
            );
            gateway.send(fallback).await
        }
        _ => Ok(response),
    }
}

/// Parses a 2xx body or renders the failure as a handled answer.
pub(crate) fn success_body(
    what: &str,
    outcome: Result<GatewayResponse, Report<GatewayError>>,
) -> Result<JsonValue, HandlerOutcome> {
    let response = match outcome {
        Ok(response) => response,
        Err(e) => {
            return Err(HandlerOutcome::failed(
                format!("I couldn't reach the Gateway for {what}."),
                e.to_string(),
            ));
        }
    };
    if !response.is_success() {
        return Err(HandlerOutcome::failed(
            format!("The Gateway returned status {} for {what}.", response.status),
            format!("status {}", response.status),
        ));
    }
    response.into_json().map_err(|e| {
        HandlerOutcome::failed(
            format!("The Gateway sent an unreadable response for {what}."),
            e.to_string(),
        )
    })
}

pub(crate) fn with_scope(request: GatewayRequest, scope: &LocationScope) -> GatewayRequest {
    request
        .with_query_opt("city", scope.city.as_deref())
        .with_query_opt("region", scope.region.as_deref())
}

pub(crate) fn with_dates(
    request: GatewayRequest,
    range: &DateRange,
    start_key: &str,
    end_key: &str,
) -> GatewayRequest {
    request
        .with_query_opt(start_key, range.start)
        .with_query_opt(end_key, range.end)
}

/// Renders a count without a trailing `.0` and with thousands separators.
pub(crate) fn format_count(value: f64) -> String {
    if value.fract() != 0.0 {
        return format!("{value:.2}");
    }
    // Lossless for any count a stats endpoint reports.
    let digits = (value.abs() as u64).to_string();
    let mut out = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    if value < 0.0 {
        out.insert(0, '-');
    }
    out
}

/// Renders the scalar fields of `object` named in `keys` as `- label: value`
/// lines, in `keys` order.
pub(crate) fn field_lines(object: &JsonValue, keys: &[(&str, &str)]) -> Vec<String> {
    keys.iter()
        .filter_map(|(key, label)| {
            let value = json_str(object, &[*key])
                .or_else(|| object.get(*key).and_then(JsonValue::as_bool).map(|b| b.to_string()))?;
            let value = json_number(object, &[*key])
                .filter(|_| object.get(*key).is_some_and(JsonValue::is_number))
                .map_or(value, format_count);
            Some(format!("- {label}: {value}"))
        })
        .collect()
}
