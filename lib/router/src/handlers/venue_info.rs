//! Venue details.

use super::{field_lines, looks_like_answer, success_body};
use crate::context::HandlerContext;
use crate::handler::{HandlerOutcome, IntentHandler, IntentRequest};
use crate::params::phrase_after;
use async_trait::async_trait;
use scm_assistant_conversation::{ConversationState, PendingContinuation};
use scm_assistant_gateway::{GatewayRequest, json_str, unwrap_object};
use scm_assistant_resolve::EntityKind;
use scm_assistant_resolve::text::{find_uuid, has_word};

const ID: &str = "venueInfo";

const FIELDS: &[(&str, &str)] = &[
    ("address", "Address"),
    ("city", "City"),
    ("region", "Region"),
    ("type", "Type"),
    ("status", "Status"),
    ("screens", "Screens"),
    ("screen_count", "Screens"),
    ("device_count", "Devices"),
    ("latitude", "Latitude"),
    ("longitude", "Longitude"),
];

/// Describes one venue.
#[derive(Debug, Clone, Copy, Default)]
pub struct VenueInfoHandler;

fn explicit_id(fragment: &str) -> Option<String> {
    find_uuid(fragment).or_else(|| {
        (!fragment.is_empty() && fragment.chars().all(|c| c.is_ascii_digit()))
            .then(|| fragment.to_string())
    })
}

#[async_trait]
impl IntentHandler for VenueInfoHandler {
    fn id(&self) -> &'static str {
        ID
    }

    fn matches(&self, request: &IntentRequest, _state: &ConversationState) -> bool {
        request.injected("venue_id").is_some() || has_word(&request.message, "venue")
    }

    async fn handle(&self, cx: &HandlerContext<'_>, request: &IntentRequest) -> HandlerOutcome {
        let fragment = phrase_after(&request.message, "venue");
        let id = match request.injected("venue_id") {
            Some(id) => Some(id.to_string()),
            None => match fragment.as_deref() {
                Some(fragment) => match explicit_id(fragment) {
                    Some(id) => Some(id),
                    None => cx
                        .resolvers
                        .names
                        .resolve(cx.gateway(), EntityKind::Venue, fragment)
                        .await
                        .map(|entity| entity.id),
                },
                None => cx.state().venue_id,
            },
        };
        let Some(id) = id else {
            let question = match fragment {
                Some(fragment) => format!(
                    "I couldn't find a venue matching \"{fragment}\". Which venue did you mean?"
                ),
                None => "Which venue? Give me its name or id.".to_string(),
            };
            return cx.ask(PendingContinuation::new(ID, request.message.clone()), question);
        };

        let outcome = cx
            .gateway()
            .send(&GatewayRequest::get(format!("/venues/{id}")))
            .await;
        let body = match success_body("venue details", outcome) {
            Ok(body) => body,
            Err(failure) => return failure,
        };
        cx.remember(|state| state.venue_id = Some(id.clone()));

        let venue = unwrap_object(&body);
        let name = json_str(venue, &["name", "venue_name", "display_name"]).unwrap_or_else(|| id.clone());
        let lines = field_lines(venue, FIELDS);
        if lines.is_empty() {
            return HandlerOutcome::answer(format!("Venue {name} ({id})."));
        }
        HandlerOutcome::answer(format!("Venue {name} ({id}):\n{}", lines.join("\n")))
    }

    async fn resume(
        &self,
        cx: &HandlerContext<'_>,
        pending: &PendingContinuation,
        reply: &str,
    ) -> Option<IntentRequest> {
        if !looks_like_answer(reply) {
            return None;
        }
        let reply = reply.trim();
        let id = match explicit_id(reply) {
            Some(id) => id,
            None => {
                cx.resolvers
                    .names
                    .resolve(cx.gateway(), EntityKind::Venue, reply)
                    .await?
                    .id
            }
        };
        Some(IntentRequest::new(format!("{} {reply}", pending.message)).with_injected("venue_id", id))
    }
}
