//! "top 5 posters in brt by plays".

use super::{format_count, send_with_fallback, success_body, with_dates, with_scope};
use crate::context::HandlerContext;
use crate::handler::{HandlerOutcome, IntentHandler, IntentRequest};
use crate::params::{DEFAULT_TOP_N, DateRange, Metric, top_n};
use async_trait::async_trait;
use scm_assistant_conversation::ConversationState;
use scm_assistant_gateway::{GatewayRequest, json_number, json_str, unwrap_rows};
use scm_assistant_resolve::text::words;
use serde_json::Value as JsonValue;
use std::collections::HashMap;

const POSTER_KEYS: &[&str] = &["poster_name", "posterName", "poster", "name", "title", "poster_id", "posterId"];

/// Ranks posters by plays or impressions.
#[derive(Debug, Clone, Copy, Default)]
pub struct TopPostersHandler;

/// Sums `metric` per poster and ranks descending; ties keep first-seen
/// order.
fn rank(rows: &[JsonValue], metric: Metric, n: usize) -> Vec<(String, f64)> {
    let mut totals: Vec<(String, f64)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for row in rows {
        let Some(poster) = json_str(row, POSTER_KEYS) else {
            continue;
        };
        let count = json_number(row, metric.count_keys()).unwrap_or(0.0);
        match index.get(&poster) {
            Some(&i) => totals[i].1 += count,
            None => {
                index.insert(poster.clone(), totals.len());
                totals.push((poster, count));
            }
        }
    }
    totals.sort_by(|a, b| b.1.total_cmp(&a.1));
    totals.truncate(n);
    totals
}

#[async_trait]
impl IntentHandler for TopPostersHandler {
    fn id(&self) -> &'static str {
        "topPosters"
    }

    fn matches(&self, request: &IntentRequest, _state: &ConversationState) -> bool {
        let words = words(&request.message);
        words.iter().any(|w| w == "top")
            && words.iter().any(|w| w == "poster" || w == "posters")
    }

    async fn handle(&self, cx: &HandlerContext<'_>, request: &IntentRequest) -> HandlerOutcome {
        let scope = cx.scope_for(&request.message).await;
        let metric = Metric::detect(&request.message);
        let n = top_n(&request.message).unwrap_or(DEFAULT_TOP_N);
        let dates = DateRange::parse(&request.message, cx.today);

        let base = with_dates(
            with_scope(GatewayRequest::get("/pop/stats"), &scope),
            &dates,
            "start",
            "end",
        )
        .with_query("limit", n);
        let primary = base
            .clone()
            .with_query("metric", metric)
            .with_query("order", "top");
        let fallback = base
            .with_query("sort_by", metric)
            .with_query("sort", "desc");

        let outcome = send_with_fallback(cx.gateway(), &primary, Some(&fallback), &[400]).await;
        let body = match success_body("poster stats", outcome) {
            Ok(body) => body,
            Err(failure) => return failure,
        };
        cx.remember_scope(&scope);

        let rows = unwrap_rows(&body).map(|e| e.rows).unwrap_or_default();
        let ranked = rank(&rows, metric, n);
        let heading = format!("{} ({})", scope.describe(), dates.describe());
        if ranked.is_empty() {
            return HandlerOutcome::answer(format!("No poster {metric} found for {heading}."));
        }
        let lines: Vec<String> = ranked
            .iter()
            .enumerate()
            .map(|(i, (poster, count))| format!("{}. {poster}: {} {metric}", i + 1, format_count(*count)))
            .collect();
        HandlerOutcome::answer(format!(
            "Top {} posters by {metric} for {heading}:\n{}",
            lines.len(),
            lines.join("\n")
        ))
    }
}
