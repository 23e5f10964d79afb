//! The LLM tool-calling loop.
//!
//! Used only when no deterministic handler claims a message. The model is
//! offered the single `scm_request` tool; every call it makes is decoded,
//! checked against the [`ToolCatalog`], given path-family defaults,
//! executed, and its clipped response fed back. Calls and response bytes
//! are both budgeted. When either budget runs out, remaining calls in the
//! batch are answered `tool_limit_exceeded` and a final answer is forced.

use crate::backend::{ChatMessage, LlmBackend, ToolCall, ToolChoice};
use crate::catalog::ToolCatalog;
use crate::error::LlmError;
use crate::tool_call::{SCM_REQUEST, apply_defaults, clip, decode, scm_request_spec};
use rootcause::Report;
use scm_assistant_core::RequestContext;
use scm_assistant_gateway::Gateway;
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

const CORRECTIVE_PROMPT: &str = "You must call the scm_request tool at least once to fetch data \
     before answering. Do not answer from memory.";
const FINAL_PROMPT: &str = "The tool budget is exhausted. Answer now using only the data \
     already returned by the tools.";

/// Tool loop limits.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OrchestratorConfig {
    /// Tool calls executed per message.
    #[serde(default = "default_max_tool_calls")]
    pub max_tool_calls: usize,
    /// Total tool response bytes fed back per message.
    #[serde(default = "default_max_tool_bytes")]
    pub max_tool_bytes: usize,
    /// Bytes kept from any single tool response.
    #[serde(default = "default_max_tool_response_bytes")]
    pub max_tool_response_bytes: usize,
    /// Tool choice for the first round.
    #[serde(default)]
    pub tool_choice: ToolChoice,
    /// Prior messages included in the transcript.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

fn default_max_tool_calls() -> usize {
    8
}

fn default_max_tool_bytes() -> usize {
    48_000
}

fn default_max_tool_response_bytes() -> usize {
    12_000
}

fn default_history_limit() -> usize {
    20
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_tool_calls: default_max_tool_calls(),
            max_tool_bytes: default_max_tool_bytes(),
            max_tool_response_bytes: default_max_tool_response_bytes(),
            tool_choice: ToolChoice::default(),
            history_limit: default_history_limit(),
        }
    }
}

/// The result of one loop run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorOutcome {
    /// Final answer text.
    pub answer: String,
    /// Tool calls executed against the Gateway.
    pub tool_calls: usize,
    /// Tool calls rejected by the allowlist.
    pub forbidden: usize,
    /// True when a budget forced the final answer.
    pub exhausted: bool,
}

/// Runs the tool-calling loop.
pub struct ToolOrchestrator {
    llm: Arc<dyn LlmBackend>,
    catalog: Arc<ToolCatalog>,
    config: OrchestratorConfig,
}

#[derive(Default)]
struct Budget {
    calls: usize,
    bytes: usize,
    forbidden: usize,
}

impl ToolOrchestrator {
    #[must_use]
    pub fn new(llm: Arc<dyn LlmBackend>, catalog: Arc<ToolCatalog>, config: OrchestratorConfig) -> Self {
        Self {
            llm,
            catalog,
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    #[must_use]
    pub fn catalog(&self) -> &Arc<ToolCatalog> {
        &self.catalog
    }

    /// Answers the transcript in `messages`, calling tools through `gateway`.
    ///
    /// A forced tool choice applies until the first tool call is made; a
    /// model that answers without calling anything gets a corrective user
    /// message instead, bounded by the same round budget.
    ///
    /// # Errors
    ///
    /// Returns an error only if the LLM call itself fails. Tool failures are
    /// reported to the model.
    #[instrument(skip_all, fields(messages = messages.len()))]
    pub async fn run(
        &self,
        gateway: &dyn Gateway,
        ctx: &RequestContext,
        mut messages: Vec<ChatMessage>,
    ) -> Result<OrchestratorOutcome, Report<LlmError>> {
        let tools = [scm_request_spec()];
        let max_rounds = self.config.max_tool_calls + 1;
        let mut budget = Budget::default();

        for round in 0..max_rounds {
            if ctx.is_done() {
                debug!(round, "request context done, forcing final answer");
                break;
            }
            let choice = if budget.calls == 0 {
                self.config.tool_choice
            } else {
                ToolChoice::Auto
            };
            let reply = self.llm.chat_with_tools(&messages, &tools, choice).await?;

            if reply.tool_calls.is_empty() {
                if choice == ToolChoice::Required && round + 1 < max_rounds {
                    debug!(round, "model answered without a tool call, correcting");
                    if !reply.content.is_empty() {
                        messages.push(ChatMessage::assistant(reply.content));
                    }
                    messages.push(ChatMessage::user(CORRECTIVE_PROMPT));
                    continue;
                }
                return Ok(self.outcome(reply.content, &budget, false));
            }

            messages.push(ChatMessage::assistant_tool_calls(
                reply.content,
                reply.tool_calls.clone(),
            ));
            let mut exhausted = false;
            for call in &reply.tool_calls {
                if exhausted || self.is_spent(&budget) {
                    exhausted = true;
                    messages.push(ChatMessage::tool_result(
                        &call.id,
                        json!({"error": "tool_limit_exceeded"}).to_string(),
                    ));
                    continue;
                }
                let result = self.execute(gateway, call, &mut budget).await;
                messages.push(ChatMessage::tool_result(&call.id, result));
            }

            if exhausted || self.is_spent(&budget) {
                break;
            }
        }

        info!(
            calls = budget.calls,
            forbidden = budget.forbidden,
            "tool loop stopped, forcing final answer"
        );
        messages.push(ChatMessage::user(FINAL_PROMPT));
        let reply = self
            .llm
            .chat_with_tools(&messages, &tools, ToolChoice::None)
            .await?;
        Ok(self.outcome(reply.content, &budget, true))
    }

    fn outcome(&self, answer: String, budget: &Budget, exhausted: bool) -> OrchestratorOutcome {
        OrchestratorOutcome {
            answer,
            tool_calls: budget.calls,
            forbidden: budget.forbidden,
            exhausted,
        }
    }

    fn is_spent(&self, budget: &Budget) -> bool {
        budget.calls >= self.config.max_tool_calls || budget.bytes >= self.config.max_tool_bytes
    }

    async fn execute(&self, gateway: &dyn Gateway, call: &ToolCall, budget: &mut Budget) -> String {
        if call.name != SCM_REQUEST {
            return json!({"error": "unknown_tool", "name": call.name}).to_string();
        }
        let mut request = match decode(&call.arguments) {
            Ok(request) => request,
            Err(e) => {
                return json!({"error": "invalid_arguments", "detail": e.to_string()}).to_string();
            }
        };

        if !self.catalog.is_allowed(request.method, &request.path).await {
            warn!(method = %request.method, path = %request.path, "tool call rejected by allowlist");
            budget.forbidden += 1;
            return json!({
                "error": "forbidden_tool",
                "method": request.method.as_str(),
                "path": request.path,
            })
            .to_string();
        }

        apply_defaults(&mut request);
        budget.calls += 1;
        debug!(method = %request.method, request = %request.display_target(), "executing tool call");

        let content = match gateway.send(&request).await {
            Ok(response) => {
                let room = self
                    .config
                    .max_tool_response_bytes
                    .min(self.config.max_tool_bytes.saturating_sub(budget.bytes));
                let body = response.body.trim();
                if body.len() <= room
                    && let Ok(value) = serde_json::from_str::<JsonValue>(body)
                {
                    json!({"status": response.status, "body": value}).to_string()
                } else {
                    json!({
                        "status": response.status,
                        "truncated": body.len() > room,
                        "body": clip(body, room),
                    })
                    .to_string()
                }
            }
            Err(e) => json!({"error": "gateway_error", "detail": e.to_string()}).to_string(),
        };
        budget.bytes += content.len();
        content
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{ChatRole, LlmReply};
    use crate::testing::ScriptedLlm;
    use scm_assistant_gateway::testing::ScriptedGateway;
    use std::time::Duration;

    fn gateway() -> Arc<ScriptedGateway> {
        Arc::new(
            ScriptedGateway::new()
                .json(
                    "/openapi.json",
                    json!({"paths": {
                        "/pop/stats": {"get": {}},
                        "/devices/{host}": {"get": {}}
                    }}),
                )
                .json("/pop/stats", json!({"data": [{"poster": "Spring", "plays": 12}]}))
                .json("/devices/moco-brt-001", json!({"data": {"host": "moco-brt-001"}})),
        )
    }

    fn orchestrator(llm: Arc<ScriptedLlm>, gateway: Arc<ScriptedGateway>, config: OrchestratorConfig) -> ToolOrchestrator {
        let catalog = ToolCatalog::new(gateway, "/openapi.json", Duration::from_secs(60));
        ToolOrchestrator::new(llm, Arc::new(catalog), config)
    }

    fn call(id: &str, arguments: &str) -> ToolCall {
        ToolCall::new(id, SCM_REQUEST, arguments)
    }

    fn tool_results(messages: &[ChatMessage]) -> Vec<&str> {
        messages
            .iter()
            .filter(|m| m.role == ChatRole::Tool)
            .map(|m| m.content.as_str())
            .collect()
    }

    #[tokio::test]
    async fn forbidden_call_does_not_stop_the_loop() {
        let llm = Arc::new(
            ScriptedLlm::new()
                .reply(LlmReply::calls(vec![call("c1", r#"{"path":"/admin/users"}"#)]))
                .reply(LlmReply::calls(vec![call("c2", r#"{"path":"/pop/stats?region=brt"}"#)]))
                .reply(LlmReply::text("Spring had 12 plays.")),
        );
        let gateway = gateway();
        let outcome = orchestrator(llm.clone(), gateway.clone(), OrchestratorConfig::default())
            .run(gateway.as_ref(), &RequestContext::new(), vec![ChatMessage::user("plays in brt?")])
            .await
            .unwrap();

        assert_eq!(outcome.answer, "Spring had 12 plays.");
        assert_eq!(outcome.forbidden, 1);
        assert_eq!(outcome.tool_calls, 1);
        assert!(gateway.requests_for("/admin/users").is_empty());
        let stats = gateway.requests_for("/pop/stats");
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].query["region"], "brt");
        assert_eq!(stats[0].query["page"], "1");

        let calls = llm.calls();
        let last = &calls.last().unwrap().messages;
        let results = tool_results(last);
        assert!(results[0].contains("forbidden_tool"));
        assert!(results[1].contains("Spring"));
    }

    #[tokio::test]
    async fn required_choice_corrects_an_ungrounded_answer() {
        let llm = Arc::new(
            ScriptedLlm::new()
                .reply(LlmReply::text("I think about 10."))
                .reply(LlmReply::calls(vec![call("c1", r#"{"path":"/pop/stats"}"#)]))
                .reply(LlmReply::text("12 plays.")),
        );
        let gateway = gateway();
        let outcome = orchestrator(llm.clone(), gateway.clone(), OrchestratorConfig::default())
            .run(gateway.as_ref(), &RequestContext::new(), vec![ChatMessage::user("plays?")])
            .await
            .unwrap();

        assert_eq!(outcome.answer, "12 plays.");
        let calls = llm.calls();
        assert_eq!(calls[0].choice, Some(ToolChoice::Required));
        assert_eq!(calls[1].choice, Some(ToolChoice::Required));
        assert_eq!(calls[2].choice, Some(ToolChoice::Auto));
        let second = &calls[1].messages;
        assert_eq!(second.last().unwrap().content, CORRECTIVE_PROMPT);
    }

    #[tokio::test]
    async fn auto_choice_accepts_a_direct_answer() {
        let llm = Arc::new(ScriptedLlm::new().reply(LlmReply::text("Hello.")));
        let gateway = gateway();
        let config = OrchestratorConfig {
            tool_choice: ToolChoice::Auto,
            ..OrchestratorConfig::default()
        };
        let outcome = orchestrator(llm.clone(), gateway.clone(), config)
            .run(gateway.as_ref(), &RequestContext::new(), vec![ChatMessage::user("hi")])
            .await
            .unwrap();
        assert_eq!(outcome.answer, "Hello.");
        assert_eq!(llm.calls().len(), 1);
    }

    #[tokio::test]
    async fn calls_beyond_budget_are_stubbed_and_final_answer_forced() {
        let llm = Arc::new(
            ScriptedLlm::new()
                .reply(LlmReply::calls(vec![
                    call("c1", r#"{"path":"/pop/stats"}"#),
                    call("c2", r#"{"path":"/devices/moco-brt-001"}"#),
                    call("c3", r#"{"path":"/pop/stats"}"#),
                ]))
                .reply(LlmReply::text("Summary from two calls.")),
        );
        let gateway = gateway();
        let config = OrchestratorConfig {
            max_tool_calls: 2,
            ..OrchestratorConfig::default()
        };
        let outcome = orchestrator(llm.clone(), gateway.clone(), config)
            .run(gateway.as_ref(), &RequestContext::new(), vec![ChatMessage::user("all")])
            .await
            .unwrap();

        assert!(outcome.exhausted);
        assert_eq!(outcome.tool_calls, 2);
        assert_eq!(outcome.answer, "Summary from two calls.");

        let calls = llm.calls();
        let last = calls.last().unwrap();
        assert_eq!(last.choice, Some(ToolChoice::None));
        let results = tool_results(&last.messages);
        assert_eq!(results.len(), 3);
        assert!(results[2].contains("tool_limit_exceeded"));
        assert_eq!(last.messages.last().unwrap().content, FINAL_PROMPT);
    }

    #[tokio::test]
    async fn large_responses_are_clipped() {
        let big = "x".repeat(500);
        let gateway = Arc::new(
            ScriptedGateway::new()
                .json("/openapi.json", json!({"paths": {"/blobs": {"get": {}}}}))
                .json("/blobs", json!({"data": big})),
        );
        let llm = Arc::new(
            ScriptedLlm::new()
                .reply(LlmReply::calls(vec![call("c1", r#"{"path":"/blobs"}"#)]))
                .reply(LlmReply::text("done")),
        );
        let config = OrchestratorConfig {
            max_tool_response_bytes: 100,
            ..OrchestratorConfig::default()
        };
        orchestrator(llm.clone(), gateway.clone(), config)
            .run(gateway.as_ref(), &RequestContext::new(), vec![ChatMessage::user("blob")])
            .await
            .unwrap();

        let calls = llm.calls();
        let result: JsonValue = serde_json::from_str(tool_results(&calls[1].messages)[0]).unwrap();
        assert_eq!(result["truncated"], true);
        assert_eq!(result["body"].as_str().unwrap().len(), 100);
    }

    #[tokio::test]
    async fn invalid_arguments_are_reported_to_the_model() {
        let llm = Arc::new(
            ScriptedLlm::new()
                .reply(LlmReply::calls(vec![call("c1", "{not json")]))
                .reply(LlmReply::text("sorry")),
        );
        let gateway = gateway();
        let config = OrchestratorConfig {
            tool_choice: ToolChoice::Auto,
            ..OrchestratorConfig::default()
        };
        let outcome = orchestrator(llm.clone(), gateway.clone(), config)
            .run(gateway.as_ref(), &RequestContext::new(), vec![ChatMessage::user("x")])
            .await
            .unwrap();
        assert_eq!(outcome.tool_calls, 0);
        let calls = llm.calls();
        assert!(tool_results(&calls[1].messages)[0].contains("invalid_arguments"));
    }

    #[tokio::test]
    async fn llm_failure_propagates() {
        let llm = Arc::new(ScriptedLlm::new().fail(LlmError::Timeout));
        let gateway = gateway();
        let result = orchestrator(llm, gateway.clone(), OrchestratorConfig::default())
            .run(gateway.as_ref(), &RequestContext::new(), vec![ChatMessage::user("x")])
            .await;
        assert!(result.is_err());
    }
}
