//! Device telemetry: CPU temperature, load, disk, uptime.

use super::{field_lines, looks_like_answer, send_with_fallback, success_body};
use crate::context::HandlerContext;
use crate::handler::{HandlerOutcome, IntentHandler, IntentRequest};
use async_trait::async_trait;
use scm_assistant_conversation::{ConversationState, PendingContinuation};
use scm_assistant_gateway::{GatewayRequest, unwrap_object};
use scm_assistant_resolve::LocationCodes;
use scm_assistant_resolve::text::{device_tokens, find_host_token, words};
use tracing::debug;

const ID: &str = "deviceTelemetry";

const GATE_WORDS: &[&str] = &[
    "telemetry", "cpu", "temp", "temperature", "uptime", "disk", "load",
];

const FIELDS: &[(&str, &str)] = &[
    ("cpu_temp", "CPU temperature"),
    ("cpu_temperature", "CPU temperature"),
    ("temperature", "Temperature"),
    ("cpu_load", "CPU load"),
    ("cpu_usage", "CPU usage"),
    ("load", "Load"),
    ("memory_used_pct", "Memory used %"),
    ("memory_usage", "Memory usage"),
    ("disk_used_pct", "Disk used %"),
    ("disk_usage", "Disk usage"),
    ("disk_free", "Disk free"),
    ("uptime", "Uptime"),
    ("uptime_seconds", "Uptime (s)"),
    ("status", "Status"),
    ("online", "Online"),
    ("last_seen", "Last seen"),
    ("timestamp", "Reported at"),
];

/// Answers device telemetry questions.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeviceTelemetryHandler;

/// Returns true if the message describes a device of its own, as opposed to
/// a follow-up like "and the uptime in city moco?" about the remembered one.
fn names_device(message: &str, codes: &LocationCodes) -> bool {
    find_host_token(message).is_some()
        || device_tokens(message).iter().any(|t| {
            !GATE_WORDS.contains(&t.as_str())
                && !matches!(t.as_str(), "city" | "region")
                && !codes.is_code_word(t)
        })
}

impl DeviceTelemetryHandler {
    async fn resolve_host(&self, cx: &HandlerContext<'_>, text: &str, city: Option<&str>) -> Option<String> {
        cx.resolvers
            .devices
            .resolve(cx.gateway(), cx.ctx, text, city)
            .await
            .map(|found| found.host)
    }

    fn ask_for_device(&self, cx: &HandlerContext<'_>, request: &IntentRequest, city: Option<String>) -> HandlerOutcome {
        let mut pending = PendingContinuation::new(ID, request.message.clone());
        if let Some(city) = city {
            pending = pending.with_captured("city", city);
        }
        cx.ask(
            pending,
            "Which device? Give me its host (e.g. moco-brt-briggs-001) or its name.",
        )
    }
}

#[async_trait]
impl IntentHandler for DeviceTelemetryHandler {
    fn id(&self) -> &'static str {
        ID
    }

    fn matches(&self, request: &IntentRequest, _state: &ConversationState) -> bool {
        request.injected("host").is_some()
            || words(&request.message)
                .iter()
                .any(|w| GATE_WORDS.contains(&w.as_str()))
    }

    async fn handle(&self, cx: &HandlerContext<'_>, request: &IntentRequest) -> HandlerOutcome {
        let city = cx.scope_for(&request.message).await.city;
        let codes = cx.resolvers.locations.codes().await;
        let host = match request.injected("host") {
            Some(host) => Some(host.to_string()),
            // A named device that does not resolve is asked about, never
            // swapped for the remembered one.
            None if names_device(&request.message, &codes) => {
                self.resolve_host(cx, &request.message, city.as_deref()).await
            }
            None => cx.state().host,
        };
        let Some(host) = host else {
            return self.ask_for_device(cx, request, city);
        };

        let primary = GatewayRequest::get(format!("/devices/{host}/telemetry"));
        let fallback = GatewayRequest::get("/telemetry").with_query("host", &host);
        let outcome =
            send_with_fallback(cx.gateway(), &primary, Some(&fallback), &[400, 404]).await;
        let body = match success_body(&format!("telemetry of {host}"), outcome) {
            Ok(body) => body,
            Err(failure) => return failure,
        };

        cx.remember(|state| state.host = Some(host.clone()));

        let object = unwrap_object(&body);
        let lines = field_lines(object, FIELDS);
        if lines.is_empty() {
            return HandlerOutcome::answer(format!("{host} reported no telemetry fields."));
        }
        HandlerOutcome::answer(format!("Telemetry for {host}:\n{}", lines.join("\n")))
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
        let city = match pending.captured.get("city") {
            Some(city) => Some(city.clone()),
            None => cx.scope_for(reply).await.city,
        };
        let host = self.resolve_host(cx, reply, city.as_deref()).await?;
        debug!(%host, "clarifying reply resolved to a device");
        Some(
            IntentRequest::new(format!("{} {}", pending.message, reply.trim()))
                .with_injected("host", host),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::test_support::Fixture;
    use scm_assistant_gateway::testing::ScriptedGateway;
    use serde_json::json;

    fn telemetry() -> serde_json::Value {
        json!({"data": {"cpu_temp": 61.5, "uptime": "3d 4h", "status": "online"}})
    }

    #[tokio::test]
    async fn explicit_host_is_used_and_remembered() {
        let fixture = Fixture::new(
            ScriptedGateway::new().json("/devices/moco-brt-briggs-001/telemetry", telemetry()),
        );
        let cx = fixture.cx();
        let outcome = DeviceTelemetryHandler
            .handle(&cx, &IntentRequest::new("cpu temp of moco-brt-briggs-001"))
            .await;

        let HandlerOutcome::Handled { answer, error } = outcome else {
            panic!("expected an answer");
        };
        assert!(answer.starts_with("Telemetry for moco-brt-briggs-001:"));
        assert!(answer.contains("- CPU temperature: 61.50"));
        assert!(answer.contains("- Uptime: 3d 4h"));
        assert_eq!(error, None);
        assert_eq!(
            fixture.memory.snapshot(fixture.conversation).host.as_deref(),
            Some("moco-brt-briggs-001")
        );
    }

    #[tokio::test]
    async fn falls_back_to_query_shape_on_404() {
        let fixture = Fixture::new(
            ScriptedGateway::new()
                .status("/devices/moco-brt-briggs-001/telemetry", 404, "not found")
                .json_when("/telemetry", &[("host", "moco-brt-briggs-001")], telemetry()),
        );
        let outcome = DeviceTelemetryHandler
            .handle(&fixture.cx(), &IntentRequest::new("telemetry moco-brt-briggs-001"))
            .await;
        assert!(matches!(outcome, HandlerOutcome::Handled { error: None, .. }));
        assert_eq!(fixture.scripted.requests_for("/telemetry").len(), 1);
    }

    #[tokio::test]
    async fn failure_status_is_reported() {
        let fixture = Fixture::new(
            ScriptedGateway::new().status("/devices/moco-brt-briggs-001/telemetry", 500, "boom"),
        );
        let outcome = DeviceTelemetryHandler
            .handle(&fixture.cx(), &IntentRequest::new("telemetry moco-brt-briggs-001"))
            .await;
        let HandlerOutcome::Handled { answer, error } = outcome else {
            panic!("expected an answer");
        };
        assert!(answer.contains("status 500"));
        assert_eq!(error.as_deref(), Some("status 500"));
    }

    #[tokio::test]
    async fn remembered_host_answers_follow_up() {
        let fixture = Fixture::new(
            ScriptedGateway::new().json("/devices/moco-brt-briggs-001/telemetry", telemetry()),
        );
        let cx = fixture.cx();
        cx.remember(|state| state.host = Some("moco-brt-briggs-001".to_string()));
        let outcome = DeviceTelemetryHandler
            .handle(&cx, &IntentRequest::new("and the uptime?"))
            .await;
        assert!(matches!(outcome, HandlerOutcome::Handled { error: None, .. }));
    }

    #[tokio::test]
    async fn missing_host_asks_and_records_pending() {
        let fixture = Fixture::new(ScriptedGateway::new());
        let cx = fixture.cx();
        let outcome = DeviceTelemetryHandler
            .handle(&cx, &IntentRequest::new("show telemetry"))
            .await;
        let HandlerOutcome::Handled { answer, .. } = outcome else {
            panic!("expected a question");
        };
        assert!(answer.starts_with("Which device?"));
        let pending = fixture.memory.snapshot(fixture.conversation).pending;
        assert_eq!(pending.map(|p| p.handler_id), Some(ID.to_string()));
    }

    #[tokio::test]
    async fn resume_injects_resolved_host() {
        let fixture = Fixture::new(ScriptedGateway::new().json(
            "/devices",
            json!({"data": [{"host": "moco-brt-briggs-001", "name": "Dart 2"}]}),
        ));
        let pending = PendingContinuation::new(ID, "show telemetry");
        let request = DeviceTelemetryHandler
            .resume(&fixture.cx(), &pending, "dart2")
            .await
            .expect("reply resolves");
        assert_eq!(request.message, "show telemetry dart2");
        assert_eq!(request.injected("host"), Some("moco-brt-briggs-001"));
    }

    #[tokio::test]
    async fn unresolved_device_asks_instead_of_using_memory() {
        let fixture = Fixture::new(ScriptedGateway::new().json("/devices", json!({"data": []})));
        let cx = fixture.cx();
        cx.remember(|state| state.host = Some("moco-brt-briggs-001".to_string()));
        let outcome = DeviceTelemetryHandler
            .handle(&cx, &IntentRequest::new("cpu temp of union station 9"))
            .await;

        let HandlerOutcome::Handled { answer, .. } = outcome else {
            panic!("expected a question");
        };
        assert!(answer.starts_with("Which device?"));
        assert!(fixture.scripted.requests_for("/devices/moco-brt-briggs-001/telemetry").is_empty());
        let pending = fixture.memory.snapshot(fixture.conversation).pending;
        assert_eq!(pending.map(|p| p.handler_id), Some(ID.to_string()));
    }

    #[tokio::test]
    async fn location_words_do_not_name_a_device() {
        let fixture = Fixture::new(
            ScriptedGateway::new().json("/devices/moco-brt-briggs-001/telemetry", telemetry()),
        );
        let cx = fixture.cx();
        cx.remember(|state| state.host = Some("moco-brt-briggs-001".to_string()));
        let outcome = DeviceTelemetryHandler
            .handle(&cx, &IntentRequest::new("and the uptime in city moco?"))
            .await;
        assert!(matches!(outcome, HandlerOutcome::Handled { error: None, .. }));
        assert!(fixture.scripted.requests_for("/devices").is_empty());
    }

    #[tokio::test]
    async fn question_captures_city_for_the_reply() {
        let fixture = Fixture::new(
            ScriptedGateway::new()
                .json_when(
                    "/devices",
                    &[("query", "briggs ave"), ("city", "moco")],
                    json!({"data": [{"stop_name": "Briggs Ave", "host": "moco-brt-briggs-001"}]}),
                )
                .json("/devices", json!({"data": []})),
        );
        let cx = fixture.cx();
        DeviceTelemetryHandler
            .handle(&cx, &IntentRequest::new("telemetry for the kiosk in city moco"))
            .await;
        let pending = fixture
            .memory
            .take_pending(fixture.conversation)
            .expect("question asked");
        assert_eq!(pending.captured.get("city").map(String::as_str), Some("moco"));

        let request = DeviceTelemetryHandler
            .resume(&cx, &pending, "briggs ave")
            .await
            .expect("reply resolves within the captured city");
        assert_eq!(request.injected("host"), Some("moco-brt-briggs-001"));
    }

    #[tokio::test]
    async fn resume_declines_long_replies() {
        let fixture = Fixture::new(ScriptedGateway::new());
        let pending = PendingContinuation::new(ID, "show telemetry");
        let request = DeviceTelemetryHandler
            .resume(&fixture.cx(), &pending, "actually show me the top posters in brt today")
            .await;
        assert_eq!(request, None);
    }
}
