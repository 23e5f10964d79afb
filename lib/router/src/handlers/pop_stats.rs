//! Generic proof-of-play totals for a scope and date range.

use super::{format_count, success_body, with_dates, with_scope};
use crate::context::HandlerContext;
use crate::handler::{HandlerOutcome, IntentHandler, IntentRequest};
use crate::params::{DateRange, Metric};
use async_trait::async_trait;
use scm_assistant_conversation::ConversationState;
use scm_assistant_gateway::{GatewayRequest, json_number, unwrap_object, unwrap_rows};
use scm_assistant_resolve::text::words;

const GATE_WORDS: &[&str] = &["pop", "plays", "impressions"];

/// Catch-all for proof-of-play questions.
#[derive(Debug, Clone, Copy, Default)]
pub struct PopStatsHandler;

#[async_trait]
impl IntentHandler for PopStatsHandler {
    fn id(&self) -> &'static str {
        "popStats"
    }

    fn matches(&self, request: &IntentRequest, _state: &ConversationState) -> bool {
        request.lower().contains("proof of play")
            || words(&request.message)
                .iter()
                .any(|w| GATE_WORDS.contains(&w.as_str()))
    }

    async fn handle(&self, cx: &HandlerContext<'_>, request: &IntentRequest) -> HandlerOutcome {
        let scope = cx.scope_for(&request.message).await;
        let metric = Metric::detect(&request.message);
        let dates = DateRange::parse(&request.message, cx.today);

        let query = with_dates(
            with_scope(GatewayRequest::get("/pop/stats"), &scope),
            &dates,
            "start",
            "end",
        )
        .with_query("metric", metric);
        let outcome = cx.gateway().send(&query).await;
        let body = match success_body("proof-of-play stats", outcome) {
            Ok(body) => body,
            Err(failure) => return failure,
        };
        cx.remember_scope(&scope);

        // A row list is summed; a top-level figure counts only for bodies
        // without rows, so an envelope's row count is never read as a total.
        let keys = metric.count_keys();
        let (rows, total) = match unwrap_rows(&body) {
            Ok(envelope) => {
                let total = envelope.rows.iter().filter_map(|row| json_number(row, keys)).sum();
                (envelope.rows, total)
            }
            Err(_) => (Vec::new(), json_number(unwrap_object(&body), keys).unwrap_or(0.0)),
        };

        HandlerOutcome::answer(format!(
            "Proof of play for {} ({}): {} {metric} across {} rows.",
            scope.describe(),
            dates.describe(),
            format_count(total),
            rows.len()
        ))
    }
}
