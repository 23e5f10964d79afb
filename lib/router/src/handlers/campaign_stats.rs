//! Campaign impressions.

use super::{format_count, looks_like_answer, send_with_fallback, success_body, with_dates};
use crate::context::HandlerContext;
use crate::handler::{HandlerOutcome, IntentHandler, IntentRequest};
use crate::params::{DateRange, Metric, phrase_after};
use async_trait::async_trait;
use scm_assistant_conversation::{ConversationState, PendingContinuation};
use scm_assistant_gateway::{GatewayRequest, json_number, unwrap_object, unwrap_rows};
use scm_assistant_resolve::EntityKind;
use scm_assistant_resolve::text::{find_uuid, has_word};

const ID: &str = "campaignStats";

/// Reports impressions for one campaign.
#[derive(Debug, Clone, Copy, Default)]
pub struct CampaignStatsHandler;

fn is_numeric_id(text: &str) -> bool {
    !text.is_empty() && text.chars().all(|c| c.is_ascii_digit())
}

enum Lookup {
    Found { id: String, name: Option<String> },
    NotFound(String),
    Missing,
}

impl CampaignStatsHandler {
    async fn lookup(&self, cx: &HandlerContext<'_>, request: &IntentRequest) -> Lookup {
        if let Some(id) = request.injected("campaign_id") {
            return Lookup::Found {
                id: id.to_string(),
                name: None,
            };
        }
        if let Some(id) = find_uuid(&request.message) {
            return Lookup::Found { id, name: None };
        }
        if let Some(fragment) = phrase_after(&request.message, "campaign") {
            if is_numeric_id(&fragment) {
                return Lookup::Found {
                    id: fragment,
                    name: None,
                };
            }
            return match cx
                .resolvers
                .names
                .resolve(cx.gateway(), EntityKind::Campaign, &fragment)
                .await
            {
                Some(entity) => Lookup::Found {
                    id: entity.id,
                    name: Some(entity.name),
                },
                None => Lookup::NotFound(fragment),
            };
        }
        match cx.state().campaign_id {
            Some(id) => Lookup::Found { id, name: None },
            None => Lookup::Missing,
        }
    }
}

#[async_trait]
impl IntentHandler for CampaignStatsHandler {
    fn id(&self) -> &'static str {
        ID
    }

    fn matches(&self, request: &IntentRequest, _state: &ConversationState) -> bool {
        request.injected("campaign_id").is_some() || has_word(&request.message, "campaign")
    }

    async fn handle(&self, cx: &HandlerContext<'_>, request: &IntentRequest) -> HandlerOutcome {
        let (id, name) = match self.lookup(cx, request).await {
            Lookup::Found { id, name } => (id, name),
            Lookup::NotFound(fragment) => {
                return cx.ask(
                    PendingContinuation::new(ID, request.message.clone()),
                    format!("I couldn't find a campaign matching \"{fragment}\". Which campaign did you mean?"),
                );
            }
            Lookup::Missing => {
                return cx.ask(
                    PendingContinuation::new(ID, request.message.clone()),
                    "Which campaign? Give me its name or id.",
                );
            }
        };

        let dates = DateRange::parse(&request.message, cx.today);
        let base = GatewayRequest::get(format!("/ads/campaigns/{id}/impressions"));
        let primary = with_dates(base.clone(), &dates, "from", "to");
        let fallback = (!dates.is_empty()).then(|| with_dates(base, &dates, "start", "end"));
        let outcome = send_with_fallback(cx.gateway(), &primary, fallback.as_ref(), &[400]).await;
        let body = match success_body("campaign impressions", outcome) {
            Ok(body) => body,
            Err(failure) => return failure,
        };

        cx.remember(|state| state.campaign_id = Some(id.clone()));

        let keys = Metric::Impressions.count_keys();
        let total = match unwrap_rows(&body) {
            Ok(envelope) => Some(
                envelope
                    .rows
                    .iter()
                    .filter_map(|row| json_number(row, keys))
                    .sum(),
            ),
            Err(_) => json_number(unwrap_object(&body), keys),
        };
        let label = name.unwrap_or(id);
        match total {
            Some(total) => HandlerOutcome::answer(format!(
                "Campaign {label} had {} impressions ({}).",
                format_count(total),
                dates.describe()
            )),
            None => HandlerOutcome::answer(format!(
                "Campaign {label} returned no impression figures ({}).",
                dates.describe()
            )),
        }
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
        let replay = format!("{} {reply}", pending.message);
        if let Some(id) = find_uuid(reply) {
            return Some(IntentRequest::new(replay).with_injected("campaign_id", id));
        }
        if is_numeric_id(reply) {
            return Some(IntentRequest::new(replay).with_injected("campaign_id", reply));
        }
        let entity = cx
            .resolvers
            .names
            .resolve(cx.gateway(), EntityKind::Campaign, reply)
            .await?;
        Some(IntentRequest::new(replay).with_injected("campaign_id", entity.id))
    }
}
