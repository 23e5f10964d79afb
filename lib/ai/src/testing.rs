//! Scripted LLM backend for tests in this and downstream crates.
//!
//! Enabled for downstream crates with the `testing` feature.

use crate::backend::{ChatMessage, LlmBackend, LlmReply, ToolChoice, ToolSpec};
use crate::error::LlmError;
use async_trait::async_trait;
use rootcause::Report;
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

/// One recorded call to the backend.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub messages: Vec<ChatMessage>,
    /// `None` for plain `chat` calls.
    pub choice: Option<ToolChoice>,
}

/// Backend that replays queued replies in order and records every call.
///
/// Once the queue is empty every call answers with a fixed final text.
#[derive(Default)]
pub struct ScriptedLlm {
    replies: Mutex<VecDeque<Result<LlmReply, LlmError>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedLlm {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a reply.
    #[must_use]
    pub fn reply(self, reply: LlmReply) -> Self {
        self.replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(Ok(reply));
        self
    }

    /// Queues a failure.
    #[must_use]
    pub fn fail(self, error: LlmError) -> Self {
        self.replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(Err(error));
        self
    }

    /// Every call made so far.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn next(&self, messages: &[ChatMessage], choice: Option<ToolChoice>) -> Result<LlmReply, Report<LlmError>> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedCall {
                messages: messages.to_vec(),
                choice,
            });
        let next = self
            .replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        match next {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(e)) => Err(e.into()),
            None => Ok(LlmReply::text("(no more scripted replies)")),
        }
    }
}

#[async_trait]
impl LlmBackend for ScriptedLlm {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String, Report<LlmError>> {
        Ok(self.next(messages, None)?.content)
    }

    async fn chat_with_tools(
        &self,
        messages: &[ChatMessage],
        _tools: &[ToolSpec],
        choice: ToolChoice,
    ) -> Result<LlmReply, Report<LlmError>> {
        self.next(messages, Some(choice))
    }

    fn model(&self) -> &str {
        "scripted"
    }
}
