//! Process-wide conversation memory.
//!
//! One exclusive lock guards the whole map. States are small and each
//! operation is a short in-memory read or write, so no per-conversation
//! locking is needed. Entries are never evicted.

use crate::state::{ConversationState, PendingContinuation};
use chrono::Utc;
use scm_assistant_core::ConversationId;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

#[derive(Debug, Default)]
struct Entry {
    state: ConversationState,
    hydrated: bool,
}

/// Shared per-conversation state.
#[derive(Debug, Default)]
pub struct ConversationMemory {
    entries: Mutex<HashMap<ConversationId, Entry>>,
}

impl ConversationMemory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ConversationId, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns a copy of the state; a conversation never seen reads as empty.
    #[must_use]
    pub fn snapshot(&self, conversation: ConversationId) -> ConversationState {
        self.lock()
            .get(&conversation)
            .map(|entry| entry.state.clone())
            .unwrap_or_default()
    }

    /// Mutates the state, creating it if needed, and stamps `updated_at`.
    pub fn update<R>(
        &self,
        conversation: ConversationId,
        f: impl FnOnce(&mut ConversationState) -> R,
    ) -> R {
        let mut entries = self.lock();
        let entry = entries.entry(conversation).or_default();
        let result = f(&mut entry.state);
        entry.state.updated_at = Some(Utc::now());
        result
    }

    /// Records a clarification, replacing any earlier one.
    pub fn set_pending(&self, conversation: ConversationId, pending: PendingContinuation) {
        debug!(%conversation, handler = %pending.handler_id, "pending continuation recorded");
        self.update(conversation, |state| state.pending = Some(pending));
    }

    /// Removes and returns the outstanding clarification.
    pub fn take_pending(&self, conversation: ConversationId) -> Option<PendingContinuation> {
        let mut entries = self.lock();
        entries
            .get_mut(&conversation)
            .and_then(|entry| entry.state.pending.take())
    }

    /// Claims the one-time hydration of a conversation.
    ///
    /// Returns true for exactly one caller per conversation, and only while
    /// the memory is still empty.
    pub fn begin_hydration(&self, conversation: ConversationId) -> bool {
        let mut entries = self.lock();
        let entry = entries.entry(conversation).or_default();
        if entry.hydrated || entry.state.is_populated() {
            entry.hydrated = true;
            return false;
        }
        entry.hydrated = true;
        true
    }
}
