//! "city moco", "region brt", "clear scope".

use crate::context::HandlerContext;
use crate::handler::{HandlerOutcome, IntentHandler, IntentRequest};
use async_trait::async_trait;
use scm_assistant_conversation::ConversationState;
use scm_assistant_resolve::text::words;

const MAX_SCOPE_WORDS: usize = 5;
/// Words a bare scope change may carry besides the codes themselves.
const SCOPE_WORDS: &[&str] = &["city", "region", "scope", "set", "to", "is", "the", "in", "and", "please", "use"];

/// Sets or clears the remembered location scope.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScopeHandler;

fn is_clear(words: &[String]) -> bool {
    words
        .windows(2)
        .any(|w| matches!(w[0].as_str(), "clear" | "reset") && matches!(w[1].as_str(), "scope" | "location"))
}

#[async_trait]
impl IntentHandler for ScopeHandler {
    fn id(&self) -> &'static str {
        "scope"
    }

    fn matches(&self, request: &IntentRequest, _state: &ConversationState) -> bool {
        let words = words(&request.message);
        if is_clear(&words) {
            return true;
        }
        words.len() <= MAX_SCOPE_WORDS
            && words
                .first()
                .is_some_and(|w| matches!(w.as_str(), "city" | "region" | "scope"))
    }

    async fn handle(&self, cx: &HandlerContext<'_>, request: &IntentRequest) -> HandlerOutcome {
        if is_clear(&words(&request.message)) {
            cx.remember(ConversationState::clear_scope);
            return HandlerOutcome::answer("Scope cleared. Queries now cover all locations.");
        }

        let codes = cx.resolvers.locations.codes().await;
        let detected = codes.detect(&request.message);
        if detected.is_empty() {
            return HandlerOutcome::NotMine;
        }
        cx.remember(|state| {
            if detected.city.is_some() {
                state.city.clone_from(&detected.city);
            }
            if detected.region.is_some() {
                state.region.clone_from(&detected.region);
            }
        });
        // "region brt top posters" is a query with a scope prefix: keep the
        // scope and let the query's handler answer.
        let has_query = words(&request.message)
            .iter()
            .any(|w| !SCOPE_WORDS.contains(&w.as_str()) && !codes.is_code_word(w));
        if has_query {
            return HandlerOutcome::NotMine;
        }
        let scope = cx.remembered_scope();
        HandlerOutcome::answer(format!("Scope set to {}.", scope.describe()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::test_support::Fixture;
    use crate::handlers::default_router;
    use scm_assistant_gateway::testing::ScriptedGateway;
    use serde_json::json;

    #[tokio::test]
    async fn merges_city_then_region() {
        let fixture = Fixture::new(ScriptedGateway::new());
        let cx = fixture.cx();
        let handler = ScopeHandler;

        let outcome = handler.handle(&cx, &IntentRequest::new("city moco")).await;
        assert_eq!(outcome, HandlerOutcome::answer("Scope set to city=moco."));
        let outcome = handler.handle(&cx, &IntentRequest::new("region brt")).await;
        assert_eq!(outcome, HandlerOutcome::answer("Scope set to city=moco region=brt."));

        let state = fixture.memory.snapshot(fixture.conversation);
        assert_eq!(state.city.as_deref(), Some("moco"));
        assert_eq!(state.region.as_deref(), Some("brt"));
    }

    #[tokio::test]
    async fn clear_scope_forgets_both() {
        let fixture = Fixture::new(ScriptedGateway::new());
        let cx = fixture.cx();
        cx.remember(|state| {
            state.city = Some("moco".to_string());
            state.host = Some("moco-brt-briggs-001".to_string());
        });

        let outcome = ScopeHandler.handle(&cx, &IntentRequest::new("clear scope")).await;
        assert!(matches!(outcome, HandlerOutcome::Handled { .. }));
        let state = fixture.memory.snapshot(fixture.conversation);
        assert_eq!(state.city, None);
        assert_eq!(state.host.as_deref(), Some("moco-brt-briggs-001"));
    }

    #[tokio::test]
    async fn unknown_code_is_not_mine() {
        let fixture = Fixture::new(ScriptedGateway::new());
        let outcome = ScopeHandler
            .handle(&fixture.cx(), &IntentRequest::new("city atlantis"))
            .await;
        assert_eq!(outcome, HandlerOutcome::NotMine);
    }

    #[tokio::test]
    async fn scope_prefixed_query_reaches_its_handler() {
        let fixture = Fixture::new(ScriptedGateway::new().json(
            "/pop/stats",
            json!({"data": [{"poster_name": "Metro Card", "plays": 55}]}),
        ));
        let cx = fixture.cx();
        let routed = default_router()
            .route(&cx, "region brt top posters")
            .await
            .expect("a handler answers");
        assert_eq!(routed.handler, "topPosters");
        assert!(routed.answer.contains("1. Metro Card: 55 plays"));

        let request = &fixture.scripted.requests_for("/pop/stats")[0];
        assert_eq!(request.query.get("region").map(String::as_str), Some("brt"));
        assert_eq!(
            fixture.memory.snapshot(fixture.conversation).region.as_deref(),
            Some("brt")
        );
    }

    #[tokio::test]
    async fn filler_words_still_set_scope() {
        let fixture = Fixture::new(ScriptedGateway::new());
        let outcome = ScopeHandler
            .handle(&fixture.cx(), &IntentRequest::new("scope is region gtw"))
            .await;
        assert_eq!(outcome, HandlerOutcome::answer("Scope set to region=gtw."));
    }

    #[test]
    fn gate() {
        let state = ConversationState::default();
        assert!(ScopeHandler.matches(&IntentRequest::new("city moco"), &state));
        assert!(ScopeHandler.matches(&IntentRequest::new("please clear scope"), &state));
        assert!(!ScopeHandler.matches(&IntentRequest::new("top 5 posters in region brt by plays"), &state));
        assert!(!ScopeHandler.matches(&IntentRequest::new("show telemetry"), &state));
    }
}
