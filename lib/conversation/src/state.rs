//! Per-conversation state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A clarification awaiting the user's next message.
///
/// Recorded by a handler that needs one more piece of information. The
/// router's continuation dispatcher offers the next message back to the
/// handler named by `handler_id` before any other routing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingContinuation {
    /// Id of the handler that asked.
    pub handler_id: String,
    /// The message that could not be completed.
    pub message: String,
    /// Arguments already extracted, keyed by name.
    pub captured: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
}

impl PendingContinuation {
    #[must_use]
    pub fn new(handler_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            handler_id: handler_id.into(),
            message: message.into(),
            captured: BTreeMap::new(),
            created_at: Utc::now(),
        }
    }

    /// Records an argument already known when the question was asked.
    #[must_use]
    pub fn with_captured(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.captured.insert(key.into(), value.into());
        self
    }
}

/// What a conversation remembers between messages.
///
/// Location codes are lower-cased. `updated_at` is informational; nothing
/// expires on it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationState {
    pub city: Option<String>,
    pub region: Option<String>,
    /// Last resolved device host.
    pub host: Option<String>,
    pub poster_name: Option<String>,
    /// Poster UUID when known.
    pub poster_id: Option<String>,
    pub poster_city: Option<String>,
    pub poster_region: Option<String>,
    pub campaign_id: Option<String>,
    pub venue_id: Option<String>,
    /// At most one outstanding clarification.
    pub pending: Option<PendingContinuation>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl ConversationState {
    /// Returns true once anything beyond the timestamp has been recorded.
    #[must_use]
    pub fn is_populated(&self) -> bool {
        self.city.is_some()
            || self.region.is_some()
            || self.host.is_some()
            || self.poster_name.is_some()
            || self.poster_id.is_some()
            || self.campaign_id.is_some()
            || self.venue_id.is_some()
            || self.pending.is_some()
    }

    /// Forgets the remembered city and region.
    pub fn clear_scope(&mut self) {
        self.city = None;
        self.region = None;
    }
}
