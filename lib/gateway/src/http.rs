//! reqwest-backed Gateway transport.

use crate::client::{Gateway, GatewayRequest, GatewayResponse, Method, RequestBody};
use crate::error::GatewayError;
use async_trait::async_trait;
use reqwest::Client;
use rootcause::Report;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};

/// Configuration for the HTTP Gateway client.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Base URL of the Gateway, e.g. "https://gateway.example.com/api".
    pub base_url: String,
    /// Bearer token, if the Gateway requires one.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_timeout_seconds() -> u64 {
    30
}

impl GatewayConfig {
    /// Creates a configuration with defaults for optional fields.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

/// Gateway client over HTTP.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpGateway {
    /// Builds a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is empty or the HTTP client cannot be built.
    pub fn new(config: &GatewayConfig) -> Result<Self, Report<GatewayError>> {
        let base_url = config.base_url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(GatewayError::InvalidConfig {
                reason: "base_url is empty".to_string(),
            }
            .into());
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| GatewayError::InvalidConfig {
                reason: format!("failed to create HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            base_url,
            api_key: config.api_key.clone(),
        })
    }

    fn url_for(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }
}

fn reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
    }
}

#[async_trait]
impl Gateway for HttpGateway {
    #[instrument(skip(self, request), fields(method = %request.method, path = %request.path))]
    async fn send(&self, request: &GatewayRequest) -> Result<GatewayResponse, Report<GatewayError>> {
        let mut builder = self
            .client
            .request(reqwest_method(request.method), self.url_for(&request.path))
            .header("Accept", "application/json");

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }

        if let Some(ref key) = self.api_key {
            builder = builder.bearer_auth(key);
        }

        builder = match &request.body {
            Some(RequestBody::Json(value)) => builder.json(value),
            Some(RequestBody::Multipart(fields)) => {
                let form = fields
                    .iter()
                    .fold(reqwest::multipart::Form::new(), |form, (k, v)| {
                        form.text(k.clone(), v.clone())
                    });
                builder.multipart(form)
            }
            None => builder,
        };

        let response = builder.send().await.map_err(|e| GatewayError::Transport {
            reason: e.to_string(),
        })?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| GatewayError::Transport {
            reason: format!("failed to read body: {e}"),
        })?;

        debug!(status, bytes = body.len(), "gateway response");

        Ok(GatewayResponse::new(status, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config: GatewayConfig =
            serde_json::from_str(r#"{"base_url":"http://gw"}"#).expect("deserialize");
        assert_eq!(config.timeout_seconds, 30);
        assert!(config.api_key.is_none());
    }

    #[test]
    fn empty_base_url_is_rejected() {
        assert!(HttpGateway::new(&GatewayConfig::new("  ")).is_err());
    }

    #[test]
    fn url_joins_with_single_slash() {
        let gateway = HttpGateway::new(&GatewayConfig::new("http://gw/api/")).expect("client");
        assert_eq!(gateway.url_for("/devices"), "http://gw/api/devices");
        assert_eq!(gateway.url_for("devices"), "http://gw/api/devices");
    }
}
