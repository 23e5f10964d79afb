//! What a handler can reach while answering one message.

use crate::handler::HandlerOutcome;
use chrono::NaiveDate;
use scm_assistant_conversation::{ConversationMemory, ConversationState, PendingContinuation};
use scm_assistant_core::{ConversationId, RequestContext};
use scm_assistant_gateway::{Gateway, RecordingGateway};
use scm_assistant_resolve::{DeviceResolver, LocationResolver, LocationScope, NameResolver};
use serde::Deserialize;

/// Memory hydration settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MemoryConfig {
    /// Persisted messages replayed into an empty memory.
    #[serde(default = "default_hydration_limit")]
    pub hydration_limit: usize,
}

fn default_hydration_limit() -> usize {
    50
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            hydration_limit: default_hydration_limit(),
        }
    }
}

/// The entity resolvers, constructed once per process.
#[derive(Clone)]
pub struct Resolvers {
    pub locations: LocationResolver,
    pub devices: DeviceResolver,
    pub names: NameResolver,
}

/// Per-message handler environment.
pub struct HandlerContext<'a> {
    /// Records every call as a step of this message.
    pub gateway: &'a RecordingGateway,
    pub ctx: &'a RequestContext,
    pub memory: &'a ConversationMemory,
    pub conversation: ConversationId,
    pub resolvers: &'a Resolvers,
    /// Anchor for relative date phrases.
    pub today: NaiveDate,
}

impl HandlerContext<'_> {
    /// The gateway as a trait object, for resolvers and the page walker.
    #[must_use]
    pub fn gateway(&self) -> &dyn Gateway {
        self.gateway
    }

    #[must_use]
    pub fn state(&self) -> ConversationState {
        self.memory.snapshot(self.conversation)
    }

    /// The remembered city and region.
    #[must_use]
    pub fn remembered_scope(&self) -> LocationScope {
        let state = self.state();
        LocationScope {
            city: state.city,
            region: state.region,
        }
    }

    /// The scope named in `message`, or the remembered one when the message
    /// names none.
    pub async fn scope_for(&self, message: &str) -> LocationScope {
        self.resolvers
            .locations
            .detect(message)
            .await
            .or_remembered(&self.remembered_scope())
    }

    /// Mutates the conversation state.
    pub fn remember(&self, f: impl FnOnce(&mut ConversationState)) {
        self.memory.update(self.conversation, f);
    }

    /// Remembers a non-empty scope as the conversation's scope.
    pub fn remember_scope(&self, scope: &LocationScope) {
        if scope.is_empty() {
            return;
        }
        let scope = scope.clone();
        self.remember(move |state| {
            state.city = scope.city;
            state.region = scope.region;
        });
    }

    /// Asks the user for a missing piece and records `pending` so the reply
    /// is offered back to the asking handler.
    pub fn ask(&self, pending: PendingContinuation, question: impl Into<String>) -> HandlerOutcome {
        self.memory.set_pending(self.conversation, pending);
        HandlerOutcome::answer(question)
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::Fixture;
    use super::*;
    use scm_assistant_gateway::testing::ScriptedGateway;

    #[tokio::test]
    async fn scope_falls_back_to_memory_only_when_message_has_none() {
        let fixture = Fixture::new(ScriptedGateway::new());
        let cx = fixture.cx();
        cx.remember(|state| {
            state.city = Some("moco".to_string());
            state.region = Some("brt".to_string());
        });

        let scope = cx.scope_for("show top posters").await;
        assert_eq!(scope.city.as_deref(), Some("moco"));
        assert_eq!(scope.region.as_deref(), Some("brt"));

        let scope = cx.scope_for("top posters in gtw").await;
        assert_eq!(scope.region.as_deref(), Some("gtw"));
        assert_eq!(scope.city, None);
    }

    #[tokio::test]
    async fn ask_records_pending() {
        let fixture = Fixture::new(ScriptedGateway::new());
        let cx = fixture.cx();
        let outcome = cx.ask(PendingContinuation::new("deviceTelemetry", "show telemetry"), "Which device?");
        assert_eq!(outcome, HandlerOutcome::answer("Which device?"));
        let pending = fixture.memory.take_pending(fixture.conversation);
        assert_eq!(pending.map(|p| p.handler_id), Some("deviceTelemetry".to_string()));
    }

    #[test]
    fn memory_config_defaults() {
        assert_eq!(MemoryConfig::default().hydration_limit, 50);
    }
}
