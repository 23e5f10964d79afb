//! Error types for the router crate.

use std::fmt;

/// Errors from the chat entry points.
///
/// Gateway and LLM failures never surface here; they become answer text
/// and `ChatResponse::error`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssistantError {
    /// The message was empty after trimming.
    EmptyMessage,
    /// The message could not be persisted.
    Persistence { reason: String },
}

impl fmt::Display for AssistantError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyMessage => write!(f, "message is empty"),
            Self::Persistence { reason } => write!(f, "failed to persist message: {reason}"),
        }
    }
}

impl std::error::Error for AssistantError {}
