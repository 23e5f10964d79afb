//! Gateway trait and request/response types.
//!
//! Every Gateway interaction, whether issued by a deterministic handler, an
//! entity resolver, or the LLM tool loop, goes through the [`Gateway`] trait
//! so tests can substitute an in-memory backend.

use crate::error::GatewayError;
use async_trait::async_trait;
use rootcause::Report;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// HTTP methods the Gateway understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    /// Returns the upper-case wire name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }

    /// Returns the lower-case name used as a key in API descriptions.
    #[must_use]
    pub fn as_lower(&self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Post => "post",
            Self::Put => "put",
            Self::Patch => "patch",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            other => Err(GatewayError::InvalidConfig {
                reason: format!("unsupported method '{other}'"),
            }),
        }
    }
}

/// A request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum RequestBody {
    /// JSON body.
    Json(JsonValue),
    /// Multipart form with text fields.
    Multipart(BTreeMap<String, String>),
}

/// A request to the Gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayRequest {
    /// HTTP method.
    pub method: Method,
    /// Path relative to the Gateway base URL, starting with `/`.
    pub path: String,
    /// Query parameters, ordered for stable logging and tests.
    pub query: BTreeMap<String, String>,
    /// Optional body.
    pub body: Option<RequestBody>,
}

impl GatewayRequest {
    /// Creates a request.
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: BTreeMap::new(),
            body: None,
        }
    }

    /// Creates a GET request.
    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    /// Adds a query parameter, replacing any previous value.
    #[must_use]
    pub fn with_query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.insert(key.into(), value.to_string());
        self
    }

    /// Adds a query parameter when a value is present.
    #[must_use]
    pub fn with_query_opt(self, key: impl Into<String>, value: Option<impl ToString>) -> Self {
        match value {
            Some(value) => self.with_query(key, value),
            None => self,
        }
    }

    /// Sets the body.
    #[must_use]
    pub fn with_body(mut self, body: RequestBody) -> Self {
        self.body = Some(body);
        self
    }

    /// Renders `path?query` for logs and step records.
    #[must_use]
    pub fn display_target(&self) -> String {
        if self.query.is_empty() {
            return self.path.clone();
        }
        let query: Vec<String> = self
            .query
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        format!("{}?{}", self.path, query.join("&"))
    }
}

/// A raw Gateway response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayResponse {
    /// HTTP status code.
    pub status: u16,
    /// Raw body text.
    pub body: String,
}

impl GatewayResponse {
    /// Creates a response.
    #[must_use]
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Creates a 200 response with a JSON body.
    #[must_use]
    pub fn ok_json(body: &JsonValue) -> Self {
        Self::new(200, body.to_string())
    }

    /// Returns true for 2xx statuses.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Parses the body as JSON. An empty body parses as `null`.
    pub fn json(&self) -> Result<JsonValue, Report<GatewayError>> {
        if self.body.trim().is_empty() {
            return Ok(JsonValue::Null);
        }
        Ok(
            serde_json::from_str(&self.body).map_err(|e| GatewayError::ResponseParseFailed {
                reason: e.to_string(),
            })?,
        )
    }

    /// Converts a non-2xx response into a status error, otherwise parses JSON.
    pub fn into_json(self) -> Result<JsonValue, Report<GatewayError>> {
        if !self.is_success() {
            return Err(GatewayError::Status {
                status: self.status,
                body: self.body,
            }
            .into());
        }
        self.json()
    }
}

/// Trait for Gateway transports.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Sends a request and returns the raw response, whatever its status.
    ///
    /// # Errors
    ///
    /// Returns an error only when no HTTP response was obtained.
    async fn send(&self, request: &GatewayRequest) -> Result<GatewayResponse, Report<GatewayError>>;

    /// Sends a GET and parses a 2xx JSON body.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, non-2xx status, or invalid JSON.
    async fn get_json(&self, request: &GatewayRequest) -> Result<JsonValue, Report<GatewayError>> {
        self.send(request).await?.into_json()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_builder_orders_query() {
        let request = GatewayRequest::get("/pop/stats")
            .with_query("region", "brt")
            .with_query("limit", 5)
            .with_query_opt("city", None::<String>);

        assert_eq!(request.display_target(), "/pop/stats?limit=5&region=brt");
    }

    #[test]
    fn method_parses_case_insensitively() {
        assert_eq!("get".parse::<Method>().unwrap(), Method::Get);
        assert_eq!(" Post ".parse::<Method>().unwrap(), Method::Post);
        assert!("TRACE".parse::<Method>().is_err());
    }

    #[test]
    fn non_success_response_becomes_status_error() {
        let response = GatewayResponse::new(404, "missing");
        assert!(!response.is_success());
        assert!(response.into_json().is_err());
    }

    #[test]
    fn empty_body_parses_as_null() {
        let response = GatewayResponse::new(204, "");
        assert_eq!(response.into_json().unwrap(), JsonValue::Null);
    }
}
