//! Endpoint allowlist derived from the Gateway's API description.
//!
//! The description is fetched once per TTL window. The lock is held across
//! the fetch, so callers arriving mid-refresh wait for it instead of
//! issuing their own. A failed fetch is cached as well: until the TTL
//! passes, every check is denied without touching the Gateway again.

use crate::error::CatalogError;
use rootcause::Report;
use scm_assistant_gateway::{Gateway, GatewayRequest, Method};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

const METHODS: &[&str] = &["get", "post", "put", "patch", "delete"];

/// Path template to lower-case method to operation descriptor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogSpec {
    paths: BTreeMap<String, BTreeMap<String, JsonValue>>,
}

impl CatalogSpec {
    /// Reads the `paths` table of an OpenAPI-like document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document has no `paths` object.
    pub fn from_document(document: &JsonValue) -> Result<Self, CatalogError> {
        let paths = document
            .get("paths")
            .and_then(JsonValue::as_object)
            .ok_or_else(|| CatalogError::InvalidSpec {
                reason: "document has no paths object".to_string(),
            })?;

        let paths = paths
            .iter()
            .filter_map(|(template, operations)| {
                let operations: BTreeMap<String, JsonValue> = operations
                    .as_object()?
                    .iter()
                    .map(|(method, op)| (method.to_lowercase(), op.clone()))
                    .filter(|(method, _)| METHODS.contains(&method.as_str()))
                    .collect();
                (!operations.is_empty()).then(|| (normalize_path(template), operations))
            })
            .collect();
        Ok(Self { paths })
    }

    /// Returns true if `method path` is described.
    ///
    /// An exact template match is tried first; otherwise each template is
    /// compared segment by segment, where `{param}` matches any non-empty
    /// segment and the segment counts must be equal.
    #[must_use]
    pub fn allows(&self, method: Method, path: &str) -> bool {
        self.operation(method, path).is_some()
    }

    /// Returns the descriptor for `method path`, if described.
    #[must_use]
    pub fn operation(&self, method: Method, path: &str) -> Option<&JsonValue> {
        let path = normalize_path(path);
        let method = method.as_lower();
        if let Some(op) = self.paths.get(&path).and_then(|ops| ops.get(method)) {
            return Some(op);
        }
        self.paths
            .iter()
            .filter(|(template, _)| template_matches(template, &path))
            .find_map(|(_, ops)| ops.get(method))
    }

    /// Number of path templates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// One `METHOD /template - summary` line per operation, for prompts.
    #[must_use]
    pub fn describe(&self, max_lines: usize) -> Vec<String> {
        self.paths
            .iter()
            .flat_map(|(template, ops)| {
                ops.iter().map(move |(method, op)| {
                    let summary = op
                        .get("summary")
                        .and_then(JsonValue::as_str)
                        .unwrap_or_default();
                    let line = format!("{} {template}", method.to_uppercase());
                    if summary.is_empty() {
                        line
                    } else {
                        format!("{line} - {summary}")
                    }
                })
            })
            .take(max_lines)
            .collect()
    }
}

fn normalize_path(path: &str) -> String {
    let path = path.split('?').next().unwrap_or_default().trim();
    let path = if path.len() > 1 {
        path.trim_end_matches('/')
    } else {
        path
    };
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

fn template_matches(template: &str, path: &str) -> bool {
    let template: Vec<&str> = template.split('/').collect();
    let path: Vec<&str> = path.split('/').collect();
    template.len() == path.len()
        && template.iter().zip(&path).all(|(t, p)| {
            if t.starts_with('{') && t.ends_with('}') {
                !p.is_empty()
            } else {
                t == p
            }
        })
}

struct Cached {
    fetched_at: Instant,
    spec: Result<Arc<CatalogSpec>, String>,
}

/// Shared, TTL-cached allowlist.
pub struct ToolCatalog {
    gateway: Arc<dyn Gateway>,
    path: String,
    ttl: Duration,
    cached: Mutex<Option<Cached>>,
}

impl ToolCatalog {
    #[must_use]
    pub fn new(gateway: Arc<dyn Gateway>, path: impl Into<String>, ttl: Duration) -> Self {
        Self {
            gateway,
            path: path.into(),
            ttl,
            cached: Mutex::new(None),
        }
    }

    /// Returns the current spec, refreshing it when the TTL has passed.
    ///
    /// # Errors
    ///
    /// Returns the cached or fresh fetch failure.
    pub async fn spec(&self) -> Result<Arc<CatalogSpec>, Report<CatalogError>> {
        let mut cached = self.cached.lock().await;
        if let Some(entry) = cached.as_ref()
            && entry.fetched_at.elapsed() < self.ttl
        {
            return entry.spec.clone().map_err(|reason| {
                Report::from(CatalogError::FetchFailed { reason })
            });
        }

        let spec = self.fetch().await.map(Arc::new).map_err(|e| e.to_string());
        *cached = Some(Cached {
            fetched_at: Instant::now(),
            spec: spec.clone(),
        });
        spec.map_err(|reason| Report::from(CatalogError::FetchFailed { reason }))
    }

    /// Returns true if `method path` may be called. Denies when the catalog
    /// is unavailable.
    pub async fn is_allowed(&self, method: Method, path: &str) -> bool {
        match self.spec().await {
            Ok(spec) => spec.allows(method, path),
            Err(e) => {
                warn!(error = %e, %method, path, "tool catalog unavailable, denying");
                false
            }
        }
    }

    #[instrument(skip(self), fields(path = %self.path))]
    async fn fetch(&self) -> Result<CatalogSpec, Report<CatalogError>> {
        let document = self
            .gateway
            .get_json(&GatewayRequest::get(&self.path))
            .await
            .map_err(|e| CatalogError::FetchFailed {
                reason: e.to_string(),
            })?;
        let spec = CatalogSpec::from_document(&document)?;
        debug!(templates = spec.len(), "tool catalog refreshed");
        Ok(spec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scm_assistant_gateway::testing::ScriptedGateway;
    use serde_json::json;

    fn document() -> JsonValue {
        json!({
            "openapi": "3.0.0",
            "paths": {
                "/pop/stats": {"get": {"summary": "Proof-of-play stats"}},
                "/ads/campaigns/{id}/impressions": {"get": {}},
                "/devices/{host}": {"get": {}, "parameters": []},
                "/venues/": {"GET": {}, "post": {}}
            }
        })
    }

    #[test]
    fn templated_segments_match_non_empty_literals() {
        let spec = CatalogSpec::from_document(&document()).unwrap();
        assert!(spec.allows(Method::Get, "/ads/campaigns/abc-123/impressions"));
        assert!(!spec.allows(Method::Get, "/ads/campaigns/impressions"));
        assert!(!spec.allows(Method::Get, "/ads/campaigns//impressions"));
        assert!(!spec.allows(Method::Post, "/ads/campaigns/abc/impressions"));
    }

    #[test]
    fn exact_paths_and_normalization() {
        let spec = CatalogSpec::from_document(&document()).unwrap();
        assert!(spec.allows(Method::Get, "/pop/stats?limit=5"));
        assert!(spec.allows(Method::Get, "/venues"));
        assert!(spec.allows(Method::Post, "venues/"));
        assert!(!spec.allows(Method::Delete, "/venues"));
        assert!(!spec.allows(Method::Get, "/secrets"));
    }

    #[test]
    fn non_method_keys_are_ignored() {
        let spec = CatalogSpec::from_document(&document()).unwrap();
        let ops = spec.paths.get("/devices/{host}").unwrap();
        assert_eq!(ops.keys().collect::<Vec<_>>(), ["get"]);
    }

    #[test]
    fn describe_lists_operations() {
        let spec = CatalogSpec::from_document(&document()).unwrap();
        let lines = spec.describe(100);
        assert!(lines.contains(&"GET /pop/stats - Proof-of-play stats".to_string()));
        assert_eq!(spec.describe(2).len(), 2);
    }

    #[test]
    fn missing_paths_is_invalid() {
        assert!(CatalogSpec::from_document(&json!({"openapi": "3"})).is_err());
    }

    #[tokio::test]
    async fn spec_is_cached_within_ttl() {
        let gateway = Arc::new(ScriptedGateway::new().json("/openapi.json", document()));
        let catalog = ToolCatalog::new(gateway.clone(), "/openapi.json", Duration::from_secs(60));

        assert!(catalog.is_allowed(Method::Get, "/pop/stats").await);
        assert!(catalog.is_allowed(Method::Get, "/devices/moco-brt-001").await);
        assert_eq!(gateway.requests().len(), 1);
    }

    #[tokio::test]
    async fn failed_fetch_is_cached_and_denies() {
        let gateway = Arc::new(ScriptedGateway::new().status("/openapi.json", 502, "bad gateway"));
        let catalog = ToolCatalog::new(gateway.clone(), "/openapi.json", Duration::from_secs(60));

        assert!(!catalog.is_allowed(Method::Get, "/pop/stats").await);
        assert!(!catalog.is_allowed(Method::Get, "/pop/stats").await);
        assert!(catalog.spec().await.is_err());
        assert_eq!(gateway.requests().len(), 1);
    }

    #[tokio::test]
    async fn expired_spec_is_refetched() {
        let gateway = Arc::new(ScriptedGateway::new().json("/openapi.json", document()));
        let catalog = ToolCatalog::new(gateway.clone(), "/openapi.json", Duration::ZERO);

        catalog.spec().await.unwrap();
        catalog.spec().await.unwrap();
        assert_eq!(gateway.requests().len(), 2);
    }

    #[tokio::test]
    async fn concurrent_checks_share_one_fetch() {
        let gateway = Arc::new(ScriptedGateway::new().json("/openapi.json", document()));
        let catalog = Arc::new(ToolCatalog::new(
            gateway.clone(),
            "/openapi.json",
            Duration::from_secs(60),
        ));

        let checks: Vec<_> = (0..4)
            .map(|_| {
                let catalog = Arc::clone(&catalog);
                tokio::spawn(async move { catalog.is_allowed(Method::Get, "/pop/stats").await })
            })
            .collect();
        for check in checks {
            assert!(check.await.unwrap());
        }
        assert_eq!(gateway.requests().len(), 1);
    }
}
