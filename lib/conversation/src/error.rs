//! Error types for the conversation crate.

use scm_assistant_core::ConversationId;
use std::fmt;

/// Errors from message persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backing store rejected or failed the operation.
    StorageFailed { reason: String },
    /// The conversation exists but belongs to another owner.
    NotOwner { conversation: ConversationId },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StorageFailed { reason } => write!(f, "message storage failed: {reason}"),
            Self::NotOwner { conversation } => {
                write!(f, "conversation {conversation} belongs to another owner")
            }
        }
    }
}

impl std::error::Error for StoreError {}
