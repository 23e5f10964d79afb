//! Conversation state for the scm-assistant platform.
//!
//! This crate provides:
//!
//! - **Conversation Memory**: per-conversation scope and last-referenced entities
//! - **Pending Continuations**: a single resumable clarification per conversation
//! - **Message Store**: the persistence interface plus an in-memory implementation

pub mod error;
pub mod memory;
pub mod message;
pub mod state;
pub mod store;

pub use error::StoreError;
pub use memory::ConversationMemory;
pub use message::{Message, MessageRole};
pub use state::{ConversationState, PendingContinuation};
pub use store::{InMemoryMessageStore, MessageStore};
