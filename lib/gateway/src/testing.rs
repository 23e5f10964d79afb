//! In-memory Gateway for tests in this and downstream crates.
//!
//! Enabled for downstream crates with the `testing` feature.

use crate::client::{Gateway, GatewayRequest, GatewayResponse, Method};
use crate::error::GatewayError;
use async_trait::async_trait;
use rootcause::Report;
use serde_json::Value as JsonValue;
use std::sync::{Mutex, PoisonError};

type Responder = Box<dyn Fn(&GatewayRequest) -> Option<GatewayResponse> + Send + Sync>;

struct Route {
    method: Method,
    path: String,
    respond: Responder,
}

/// Gateway that answers from routes registered up front and records every
/// request it receives.
///
/// Routes are matched on exact method and path; the first route whose
/// responder returns `Some` wins. Unmatched requests get a 404.
#[derive(Default)]
pub struct ScriptedGateway {
    routes: Vec<Route>,
    requests: Mutex<Vec<GatewayRequest>>,
}

impl ScriptedGateway {
    /// Creates a gateway with no routes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers every request for `method path` with `respond`.
    #[must_use]
    pub fn route(
        mut self,
        method: Method,
        path: impl Into<String>,
        respond: impl Fn(&GatewayRequest) -> Option<GatewayResponse> + Send + Sync + 'static,
    ) -> Self {
        self.routes.push(Route {
            method,
            path: path.into(),
            respond: Box::new(respond),
        });
        self
    }

    /// Answers `GET path` with a fixed 200 JSON body.
    #[must_use]
    pub fn json(self, path: impl Into<String>, body: JsonValue) -> Self {
        self.route(Method::Get, path, move |_| Some(GatewayResponse::ok_json(&body)))
    }

    /// Answers `GET path` with a fixed status and body.
    #[must_use]
    pub fn status(self, path: impl Into<String>, status: u16, body: &str) -> Self {
        let body = body.to_string();
        self.route(Method::Get, path, move |_| {
            Some(GatewayResponse::new(status, body.clone()))
        })
    }

    /// Answers `GET path` only when every `(key, value)` pair is in the query.
    #[must_use]
    pub fn json_when(
        self,
        path: impl Into<String>,
        params: &[(&str, &str)],
        body: JsonValue,
    ) -> Self {
        let params: Vec<(String, String)> = params
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        self.route(Method::Get, path, move |request| {
            params
                .iter()
                .all(|(k, v)| request.query.get(k) == Some(v))
                .then(|| GatewayResponse::ok_json(&body))
        })
    }

    /// Returns every request received, in order.
    pub fn requests(&self) -> Vec<GatewayRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the requests received for `path`.
    pub fn requests_for(&self, path: &str) -> Vec<GatewayRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.path == path)
            .collect()
    }
}

#[async_trait]
impl Gateway for ScriptedGateway {
    async fn send(&self, request: &GatewayRequest) -> Result<GatewayResponse, Report<GatewayError>> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        if request.path == "/__unreachable" {
            return Err(GatewayError::Transport {
                reason: "connection refused".to_string(),
            }
            .into());
        }

        let response = self
            .routes
            .iter()
            .filter(|route| route.method == request.method && route.path == request.path)
            .find_map(|route| (route.respond)(request));
        Ok(response.unwrap_or_else(|| GatewayResponse::new(404, r#"{"error":"not found"}"#)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn routes_by_path_and_query() {
        let gateway = ScriptedGateway::new()
            .json_when("/devices", &[("q", "dart")], json!({"data": [1]}))
            .json("/devices", json!({"data": []}));

        let hit = gateway
            .get_json(&GatewayRequest::get("/devices").with_query("q", "dart"))
            .await
            .unwrap();
        assert_eq!(hit, json!({"data": [1]}));

        let fallback = gateway
            .get_json(&GatewayRequest::get("/devices"))
            .await
            .unwrap();
        assert_eq!(fallback, json!({"data": []}));

        let missing = gateway.send(&GatewayRequest::get("/nope")).await.unwrap();
        assert_eq!(missing.status, 404);
        assert_eq!(gateway.requests().len(), 3);
    }

    #[tokio::test]
    async fn unreachable_path_is_a_transport_error() {
        let gateway = ScriptedGateway::new();
        assert!(
            gateway
                .send(&GatewayRequest::get("/__unreachable"))
                .await
                .is_err()
        );
    }
}
