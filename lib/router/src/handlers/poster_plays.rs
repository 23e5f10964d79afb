//! Play counts for a single poster.

use super::{format_count, looks_like_answer, with_dates, with_scope};
use crate::context::HandlerContext;
use crate::handler::{HandlerOutcome, IntentHandler, IntentRequest};
use crate::params::{DateRange, Metric, phrase_after};
use async_trait::async_trait;
use scm_assistant_conversation::{ConversationState, PendingContinuation};
use scm_assistant_gateway::{GatewayRequest, PageLimits, PageStop, json_number, json_str, walk_pages};
use scm_assistant_resolve::text::{find_uuid, words};
use scm_assistant_resolve::{EntityKind, LocationScope};
use std::collections::BTreeSet;

const ID: &str = "posterPlays";
const PAGE_SIZE: u32 = 200;
const MAX_PAGES: u32 = 10;
/// Records summed per answer; a larger result is reported as partial.
const MAX_RECORDS: usize = 1_000;
const HOST_KEYS: &[&str] = &["host", "device", "device_host", "hostname", "server_id"];

/// Sums proof-of-play records for one poster.
#[derive(Debug, Clone, Copy, Default)]
pub struct PosterPlaysHandler;

struct Poster {
    id: String,
    name: Option<String>,
    scope: LocationScope,
}

enum Lookup {
    Found(Poster),
    NotFound(String),
    Missing,
}

impl PosterPlaysHandler {
    async fn lookup(&self, cx: &HandlerContext<'_>, request: &IntentRequest) -> Lookup {
        if let Some(id) = request.injected("poster_id") {
            return Lookup::Found(Poster {
                id: id.to_string(),
                name: request.injected("poster_name").map(str::to_string),
                scope: LocationScope::default(),
            });
        }
        if let Some(id) = find_uuid(&request.message) {
            return Lookup::Found(Poster {
                id,
                name: None,
                scope: LocationScope::default(),
            });
        }
        if let Some(fragment) = phrase_after(&request.message, "poster") {
            return match cx
                .resolvers
                .names
                .resolve(cx.gateway(), EntityKind::Poster, &fragment)
                .await
            {
                Some(entity) => Lookup::Found(Poster {
                    id: entity.id,
                    name: Some(entity.name),
                    scope: LocationScope {
                        city: entity.city,
                        region: entity.region,
                    },
                }),
                None => Lookup::NotFound(fragment),
            };
        }
        let state = cx.state();
        match state.poster_id {
            Some(id) => Lookup::Found(Poster {
                id,
                name: state.poster_name,
                scope: LocationScope {
                    city: state.poster_city,
                    region: state.poster_region,
                },
            }),
            None => Lookup::Missing,
        }
    }
}

#[async_trait]
impl IntentHandler for PosterPlaysHandler {
    fn id(&self) -> &'static str {
        ID
    }

    fn matches(&self, request: &IntentRequest, _state: &ConversationState) -> bool {
        if request.injected("poster_id").is_some() {
            return true;
        }
        let words = words(&request.message);
        words.iter().any(|w| w == "poster")
            && words.iter().any(|w| matches!(w.as_str(), "play" | "plays" | "played"))
    }

    async fn handle(&self, cx: &HandlerContext<'_>, request: &IntentRequest) -> HandlerOutcome {
        let poster = match self.lookup(cx, request).await {
            Lookup::Found(poster) => poster,
            Lookup::NotFound(fragment) => {
                return cx.ask(
                    PendingContinuation::new(ID, request.message.clone()),
                    format!("I couldn't find a poster matching \"{fragment}\". Which poster did you mean?"),
                );
            }
            Lookup::Missing => {
                return cx.ask(
                    PendingContinuation::new(ID, request.message.clone()),
                    "Which poster? Give me its name or id.",
                );
            }
        };

        let scope = cx.scope_for(&request.message).await;
        let dates = DateRange::parse(&request.message, cx.today);
        let base = with_dates(
            with_scope(
                GatewayRequest::get("/pop/records").with_query("poster_id", &poster.id),
                &scope,
            ),
            &dates,
            "start",
            "end",
        );
        let walk = match walk_pages(
            cx.gateway(),
            cx.ctx,
            &base,
            PageLimits::new(PAGE_SIZE, MAX_PAGES).with_max_total(MAX_RECORDS),
        )
        .await
        {
            Ok(walk) => walk,
            Err(e) => {
                return HandlerOutcome::failed(
                    "I couldn't fetch proof-of-play records for that poster.",
                    e.to_string(),
                );
            }
        };

        let mut plays = 0.0;
        let mut hosts = BTreeSet::new();
        for row in &walk.rows {
            plays += json_number(row, Metric::Plays.count_keys()).unwrap_or(1.0);
            if let Some(host) = json_str(row, HOST_KEYS) {
                hosts.insert(host.to_lowercase());
            }
        }

        let label = poster.name.clone().unwrap_or_else(|| poster.id.clone());
        cx.remember_scope(&scope);
        cx.remember(|state| {
            state.poster_id = Some(poster.id.clone());
            state.poster_name = poster.name.clone();
            state.poster_city = poster.scope.city.clone();
            state.poster_region = poster.scope.region.clone();
        });

        let mut answer = format!(
            "Poster {label} played {} times on {} {} ({}, {}).",
            format_count(plays),
            hosts.len(),
            if hosts.len() == 1 { "device" } else { "devices" },
            scope.describe(),
            dates.describe()
        );
        if walk.is_truncated() {
            let reason = match &walk.stop {
                PageStop::Failed(e) => format!("a later page failed: {e}"),
                PageStop::RowBound => format!("stopped after {} records", walk.rows.len()),
                _ => format!("stopped after {} pages", walk.pages),
            };
            answer.push_str(&format!(" Partial result: {reason}."));
        }
        HandlerOutcome::answer(answer)
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
        let replay = format!("{} {}", pending.message, reply.trim());
        if let Some(id) = find_uuid(reply) {
            return Some(IntentRequest::new(replay).with_injected("poster_id", id));
        }
        let entity = cx
            .resolvers
            .names
            .resolve(cx.gateway(), EntityKind::Poster, reply)
            .await?;
        Some(
            IntentRequest::new(replay)
                .with_injected("poster_id", entity.id)
                .with_injected("poster_name", entity.name),
        )
    }
}
