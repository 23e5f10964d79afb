//! The chat entry points.
//!
//! Both entry points share one flow:
//!
//! 1. Hydrate conversation memory from persisted history (once)
//! 2. Persist the user message
//! 3. Offer the message to the intent router
//! 4. Otherwise prefetch context and run the LLM tool loop
//! 5. Emit the answer, persist it, and return the recorded Gateway steps
//!
//! A request without a conversation id gets a fresh id and nothing is
//! persisted for it.

use crate::context::{HandlerContext, MemoryConfig, Resolvers};
use crate::error::AssistantError;
use crate::handler::IntentRouter;
use crate::handlers::default_router;
use chrono::Utc;
use rootcause::Report;
use scm_assistant_ai::tool_call::clip;
use scm_assistant_ai::{ChatMessage, LlmBackend, OrchestratorConfig, ToolCatalog, ToolOrchestrator};
use scm_assistant_conversation::{ConversationMemory, MessageRole, MessageStore};
use scm_assistant_core::{ConversationId, RequestContext, UserId};
use scm_assistant_gateway::{Gateway, GatewayRequest, RecordingGateway, StepRecord};
use scm_assistant_resolve::text::find_host_token;
use scm_assistant_resolve::{
    CacheConfig, DeviceResolver, DeviceSearchConfig, EntityCache, LocationResolver, NameResolver,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

const SYSTEM_PROMPT: &str = "You are an operations assistant for a network of digital kiosks and \
     advertising screens. Answer questions using data from the Gateway API, fetched with the \
     scm_request tool. Only call the endpoints listed below. Keep answers short and factual, and \
     say so when the data does not answer the question.";
const CATALOG_LINES: usize = 200;
const DEVICE_SNAPSHOT_BYTES: usize = 2_000;
const LLM_FAILURE_ANSWER: &str =
    "Sorry, I couldn't reach the language model to answer that. Please try again shortly.";
const EMPTY_ANSWER: &str = "I don't have an answer for that.";

/// An inbound chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    /// Continue this conversation; `None` starts an unpersisted one.
    #[serde(default)]
    pub conversation_id: Option<ConversationId>,
}

impl ChatRequest {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            conversation_id: None,
        }
    }

    #[must_use]
    pub fn in_conversation(mut self, conversation_id: ConversationId) -> Self {
        self.conversation_id = Some(conversation_id);
        self
    }
}

/// The answer to one message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub conversation_id: ConversationId,
    pub answer: String,
    /// Id of the deterministic handler that answered, if any.
    pub handler: Option<String>,
    /// Gateway calls made while answering.
    pub steps: Vec<StepRecord>,
    /// Failure detail, even when an answer was produced.
    pub error: Option<String>,
}

/// Tuning for everything the assistant owns.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AssistantSettings {
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub devices: DeviceSearchConfig,
}

/// The conversational front-end.
pub struct Assistant {
    gateway: Arc<dyn Gateway>,
    llm: Arc<dyn LlmBackend>,
    store: Arc<dyn MessageStore>,
    memory: ConversationMemory,
    resolvers: Resolvers,
    router: IntentRouter,
    orchestrator: ToolOrchestrator,
    memory_config: MemoryConfig,
}

impl Assistant {
    /// Wires the shared caches and the standard handler chain.
    #[must_use]
    pub fn new(
        gateway: Arc<dyn Gateway>,
        llm: Arc<dyn LlmBackend>,
        store: Arc<dyn MessageStore>,
        settings: &AssistantSettings,
    ) -> Self {
        let cache = Arc::new(EntityCache::new(gateway.clone(), &settings.cache));
        let catalog = Arc::new(ToolCatalog::new(
            gateway.clone(),
            settings.cache.catalog_path.clone(),
            settings.cache.catalog_ttl(),
        ));
        Self {
            resolvers: Resolvers {
                locations: LocationResolver::new(cache),
                devices: DeviceResolver::new(settings.devices.clone()),
                names: NameResolver::new(),
            },
            orchestrator: ToolOrchestrator::new(llm.clone(), catalog, settings.orchestrator.clone()),
            router: default_router(),
            memory: ConversationMemory::new(),
            memory_config: settings.memory.clone(),
            gateway,
            llm,
            store,
        }
    }

    /// Replaces the handler chain.
    #[must_use]
    pub fn with_router(mut self, router: IntentRouter) -> Self {
        self.router = router;
        self
    }

    /// The per-conversation memory.
    #[must_use]
    pub fn memory(&self) -> &ConversationMemory {
        &self.memory
    }

    /// Answers one message.
    ///
    /// # Errors
    ///
    /// Returns an error if the message is empty or cannot be persisted.
    pub async fn chat(
        &self,
        ctx: &RequestContext,
        owner: UserId,
        request: ChatRequest,
    ) -> Result<ChatResponse, Report<AssistantError>> {
        self.chat_stream(ctx, owner, request, &|_| {}).await
    }

    /// Answers one message, emitting the answer through `on_token` in
    /// pieces before returning the same response as [`chat`](Self::chat).
    ///
    /// # Errors
    ///
    /// Returns an error if the message is empty or cannot be persisted.
    #[instrument(skip_all, fields(owner = %owner))]
    pub async fn chat_stream(
        &self,
        ctx: &RequestContext,
        owner: UserId,
        request: ChatRequest,
        on_token: &(dyn Fn(&str) + Send + Sync),
    ) -> Result<ChatResponse, Report<AssistantError>> {
        let message = request.message.trim();
        if message.is_empty() {
            return Err(AssistantError::EmptyMessage.into());
        }
        let (conversation, persistent) = match request.conversation_id {
            Some(id) => (id, true),
            None => (ConversationId::new(), false),
        };

        if persistent {
            self.hydrate(owner, conversation).await;
            self.store
                .append_message(owner, conversation, MessageRole::User, message)
                .await
                .map_err(|e| AssistantError::Persistence {
                    reason: e.to_string(),
                })?;
        }

        let recording = RecordingGateway::new(self.gateway.clone());
        let cx = HandlerContext {
            gateway: &recording,
            ctx,
            memory: &self.memory,
            conversation,
            resolvers: &self.resolvers,
            today: Utc::now().date_naive(),
        };

        let (answer, handler, error) = match self.router.route(&cx, message).await {
            Some(routed) => {
                info!(handler = routed.handler, %conversation, "answered by handler");
                (routed.answer, Some(routed.handler.to_string()), routed.error)
            }
            None => {
                let (answer, error) = self.answer_with_llm(&cx, owner, persistent, message).await;
                (answer, None, error)
            }
        };

        for piece in answer.split_inclusive(' ') {
            on_token(piece);
        }

        if persistent
            && let Err(e) = self
                .store
                .append_message(owner, conversation, MessageRole::Assistant, &answer)
                .await
        {
            warn!(%conversation, error = %e, "failed to persist answer");
        }

        Ok(ChatResponse {
            conversation_id: conversation,
            answer,
            handler,
            steps: recording.take_steps(),
            error,
        })
    }

    /// Replays persisted user messages into an empty memory, once per
    /// conversation.
    async fn hydrate(&self, owner: UserId, conversation: ConversationId) {
        if !self.memory.begin_hydration(conversation) {
            return;
        }
        let history = match self
            .store
            .list_messages(owner, conversation, self.memory_config.hydration_limit)
            .await
        {
            Ok(history) => history,
            Err(e) => {
                debug!(%conversation, error = %e, "hydration skipped");
                return;
            }
        };

        let mut replayed = 0usize;
        for message in history.iter().filter(|m| m.is_user()) {
            let scope = self.resolvers.locations.detect(&message.content).await;
            let host = find_host_token(&message.content);
            if scope.is_empty() && host.is_none() {
                continue;
            }
            replayed += 1;
            self.memory.update(conversation, |state| {
                if !scope.is_empty() {
                    state.city = scope.city;
                    state.region = scope.region;
                }
                if host.is_some() {
                    state.host = host;
                }
            });
        }
        debug!(%conversation, messages = history.len(), replayed, "memory hydrated");
    }

    async fn answer_with_llm(
        &self,
        cx: &HandlerContext<'_>,
        owner: UserId,
        persistent: bool,
        message: &str,
    ) -> (String, Option<String>) {
        let catalog = match self.orchestrator.catalog().spec().await {
            Ok(spec) => Some(spec),
            Err(e) => {
                warn!(error = %e, "tool catalog unavailable, answering without tools");
                None
            }
        };

        let mut system = SYSTEM_PROMPT.to_string();
        match &catalog {
            Some(spec) => {
                system.push_str("\n\nAvailable endpoints:\n");
                system.push_str(&spec.describe(CATALOG_LINES).join("\n"));
            }
            None => system.push_str("\n\nNo Gateway endpoints are available right now."),
        }

        let mut messages = vec![ChatMessage::system(system)];
        if let Some(context) = self.prefetch(cx).await {
            messages.push(ChatMessage::system(context));
        }
        if persistent {
            messages.extend(self.history(cx, owner, message).await);
        }
        messages.push(ChatMessage::user(message));

        let answer = if catalog.is_some() {
            self.orchestrator
                .run(cx.gateway(), cx.ctx, messages)
                .await
                .map(|outcome| outcome.answer)
        } else {
            self.llm.chat(&messages).await
        };
        match answer {
            Ok(answer) if answer.trim().is_empty() => (EMPTY_ANSWER.to_string(), None),
            Ok(answer) => (answer, None),
            Err(e) => {
                warn!(error = %e, "LLM fallback failed");
                (LLM_FAILURE_ANSWER.to_string(), Some(e.to_string()))
            }
        }
    }

    /// Remembered scope and, when a host is remembered, a clipped device
    /// snapshot.
    async fn prefetch(&self, cx: &HandlerContext<'_>) -> Option<String> {
        let state = cx.state();
        let scope = cx.remembered_scope();
        let mut lines = Vec::new();
        if !scope.is_empty() {
            lines.push(format!("Current scope: {}.", scope.describe()));
        }
        if let Some(host) = &state.host {
            lines.push(format!("Last device discussed: {host}."));
            match cx
                .gateway()
                .get_json(&GatewayRequest::get(format!("/devices/{host}")))
                .await
            {
                Ok(body) => {
                    let body = body.to_string();
                    lines.push(format!(
                        "Device snapshot: {}",
                        clip(&body, DEVICE_SNAPSHOT_BYTES)
                    ));
                }
                Err(e) => debug!(%host, error = %e, "device prefetch failed"),
            }
        }
        (!lines.is_empty()).then(|| format!("Conversation context:\n{}", lines.join("\n")))
    }

    /// Prior turns, excluding the message being answered.
    async fn history(&self, cx: &HandlerContext<'_>, owner: UserId, message: &str) -> Vec<ChatMessage> {
        let limit = self.orchestrator.config().history_limit + 1;
        let mut history = match self.store.list_messages(owner, cx.conversation, limit).await {
            Ok(history) => history,
            Err(e) => {
                debug!(error = %e, "history unavailable");
                return Vec::new();
            }
        };
        if history.last().is_some_and(|m| m.is_user() && m.content == message) {
            history.pop();
        }
        history
            .into_iter()
            .filter_map(|m| match m.role {
                MessageRole::User => Some(ChatMessage::user(m.content)),
                MessageRole::Assistant => Some(ChatMessage::assistant(m.content)),
                MessageRole::System => None,
            })
            .collect()
    }
}
