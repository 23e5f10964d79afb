//! The intent handler interface and the priority router.
//!
//! Handlers are tried strictly in registration order; the first that
//! reports [`HandlerOutcome::Handled`] owns the message. Before any of
//! them, an outstanding [`PendingContinuation`] is offered back to the
//! handler that recorded it.

use crate::context::HandlerContext;
use async_trait::async_trait;
use scm_assistant_conversation::{ConversationState, PendingContinuation};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, instrument};

/// A message as presented to handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentRequest {
    /// The message text.
    pub message: String,
    /// Arguments supplied by a resumed continuation, keyed by name.
    pub injected: BTreeMap<String, String>,
}

impl IntentRequest {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            injected: BTreeMap::new(),
        }
    }

    /// Adds an injected argument.
    #[must_use]
    pub fn with_injected(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.injected.insert(key.into(), value.into());
        self
    }

    /// Lower-cased message.
    #[must_use]
    pub fn lower(&self) -> String {
        self.message.to_lowercase()
    }

    #[must_use]
    pub fn injected(&self, key: &str) -> Option<&str> {
        self.injected.get(key).map(String::as_str)
    }
}

/// What a handler did with a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerOutcome {
    /// Not this handler's message; routing continues.
    NotMine,
    /// The handler owns the message. `error` carries a failure detail even
    /// though an answer was produced.
    Handled {
        answer: String,
        error: Option<String>,
    },
}

impl HandlerOutcome {
    #[must_use]
    pub fn answer(answer: impl Into<String>) -> Self {
        Self::Handled {
            answer: answer.into(),
            error: None,
        }
    }

    #[must_use]
    pub fn failed(answer: impl Into<String>, error: impl Into<String>) -> Self {
        Self::Handled {
            answer: answer.into(),
            error: Some(error.into()),
        }
    }
}

/// One deterministic intent.
#[async_trait]
pub trait IntentHandler: Send + Sync {
    /// Stable id, also used as the pending-continuation key.
    fn id(&self) -> &'static str;

    /// Cheap keyword gate. Returning false skips [`handle`](Self::handle).
    fn matches(&self, request: &IntentRequest, state: &ConversationState) -> bool;

    /// Answers the message or declines it.
    async fn handle(&self, cx: &HandlerContext<'_>, request: &IntentRequest) -> HandlerOutcome;

    /// Decides whether `reply` answers the question this handler asked.
    ///
    /// Returns the request to replay, with the missing piece injected, or
    /// `None` to discard the continuation and route `reply` normally.
    async fn resume(
        &self,
        _cx: &HandlerContext<'_>,
        _pending: &PendingContinuation,
        _reply: &str,
    ) -> Option<IntentRequest> {
        None
    }
}

/// A message answered by a deterministic handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Routed {
    pub handler: &'static str,
    pub answer: String,
    pub error: Option<String>,
}

/// Ordered handler chain.
#[derive(Clone, Default)]
pub struct IntentRouter {
    handlers: Vec<Arc<dyn IntentHandler>>,
}

impl IntentRouter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a handler at the lowest priority so far.
    #[must_use]
    pub fn with_handler(mut self, handler: Arc<dyn IntentHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    /// Handler ids in priority order.
    #[must_use]
    pub fn handler_ids(&self) -> Vec<&'static str> {
        self.handlers.iter().map(|h| h.id()).collect()
    }

    fn find(&self, id: &str) -> Option<&Arc<dyn IntentHandler>> {
        self.handlers.iter().find(|h| h.id() == id)
    }

    /// Routes `message`; `None` means no handler claimed it.
    #[instrument(skip(self, cx), fields(conversation = %cx.conversation))]
    pub async fn route(&self, cx: &HandlerContext<'_>, message: &str) -> Option<Routed> {
        if let Some(routed) = self.resume_pending(cx, message).await {
            return Some(routed);
        }

        let request = IntentRequest::new(message);
        let state = cx.state();
        for handler in &self.handlers {
            if !handler.matches(&request, &state) {
                continue;
            }
            debug!(handler = handler.id(), "handler gate passed");
            if let Some(routed) = Self::run(handler.as_ref(), cx, &request).await {
                return Some(routed);
            }
        }
        None
    }

    async fn resume_pending(&self, cx: &HandlerContext<'_>, reply: &str) -> Option<Routed> {
        let pending = cx.memory.take_pending(cx.conversation)?;
        let Some(handler) = self.find(&pending.handler_id) else {
            debug!(handler = %pending.handler_id, "pending handler no longer registered");
            return None;
        };
        match handler.resume(cx, &pending, reply).await {
            Some(request) => {
                debug!(handler = handler.id(), "resuming pending continuation");
                Self::run(handler.as_ref(), cx, &request).await
            }
            None => {
                debug!(handler = handler.id(), "pending continuation discarded");
                None
            }
        }
    }

    async fn run(
        handler: &dyn IntentHandler,
        cx: &HandlerContext<'_>,
        request: &IntentRequest,
    ) -> Option<Routed> {
        match handler.handle(cx, request).await {
            HandlerOutcome::NotMine => None,
            HandlerOutcome::Handled { answer, error } => Some(Routed {
                handler: handler.id(),
                answer,
                error,
            }),
        }
    }
}
