//! Process-wide cache of location codes.
//!
//! Three independent slots (city codes, region codes, project to city) each
//! carry their own refresh timestamp. A slot's lock is held across its
//! refresh, so concurrent readers wait for one fetch instead of issuing
//! their own. A refresh that fails or comes back empty never replaces data
//! already held.

use crate::error::ResolveError;
use chrono::{DateTime, Utc};
use rootcause::Report;
use scm_assistant_gateway::{Gateway, GatewayRequest, json_str, unwrap_rows};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

const CITY_KEYS: &[&str] = &["city", "city_code", "key", "code", "name", "value"];
const REGION_KEYS: &[&str] = &["region", "region_code", "key", "code", "name", "value"];
const PROJECT_CODE_KEYS: &[&str] = &["code", "project_code", "projectCode", "slug", "id"];
const PROJECT_CITY_KEYS: &[&str] = &["city", "city_code", "cityCode"];

/// Cache and catalog refresh settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CacheConfig {
    /// Lifetime of location code sets.
    #[serde(default = "default_entity_ttl")]
    pub entity_ttl_seconds: u64,
    /// Lifetime of the tool catalog.
    #[serde(default = "default_catalog_ttl")]
    pub catalog_ttl_seconds: u64,
    /// Gateway path serving the API description.
    #[serde(default = "default_catalog_path")]
    pub catalog_path: String,
}

fn default_entity_ttl() -> u64 {
    600
}

fn default_catalog_ttl() -> u64 {
    120
}

fn default_catalog_path() -> String {
    "/openapi.json".to_string()
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            entity_ttl_seconds: default_entity_ttl(),
            catalog_ttl_seconds: default_catalog_ttl(),
            catalog_path: default_catalog_path(),
        }
    }
}

impl CacheConfig {
    #[must_use]
    pub fn entity_ttl(&self) -> Duration {
        Duration::from_secs(self.entity_ttl_seconds)
    }

    #[must_use]
    pub fn catalog_ttl(&self) -> Duration {
        Duration::from_secs(self.catalog_ttl_seconds)
    }
}

/// A snapshot of every known location code.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocationCodes {
    /// Lower-cased city codes.
    pub cities: BTreeSet<String>,
    /// Lower-cased region codes.
    pub regions: BTreeSet<String>,
    /// Lower-cased project code to city code.
    pub projects: BTreeMap<String, String>,
}

impl LocationCodes {
    /// Returns true if `code` names a city or a project.
    #[must_use]
    pub fn is_city_like(&self, code: &str) -> bool {
        self.cities.contains(code) || self.projects.contains_key(code)
    }
}

#[derive(Debug, Default)]
struct Slot<T> {
    value: T,
    refreshed_at: Option<DateTime<Utc>>,
}

impl<T> Slot<T> {
    fn is_fresh(&self, ttl: chrono::Duration, now: DateTime<Utc>) -> bool {
        self.refreshed_at.is_some_and(|at| now - at < ttl)
    }
}

trait SlotValue: Default + Clone {
    fn is_empty(&self) -> bool;
}

impl SlotValue for BTreeSet<String> {
    fn is_empty(&self) -> bool {
        BTreeSet::is_empty(self)
    }
}

impl SlotValue for BTreeMap<String, String> {
    fn is_empty(&self) -> bool {
        BTreeMap::is_empty(self)
    }
}

/// Shared location code cache backed by the Gateway.
pub struct EntityCache {
    gateway: Arc<dyn Gateway>,
    ttl: chrono::Duration,
    cities: Mutex<Slot<BTreeSet<String>>>,
    regions: Mutex<Slot<BTreeSet<String>>>,
    projects: Mutex<Slot<BTreeMap<String, String>>>,
}

impl EntityCache {
    /// Creates an empty cache; nothing is fetched until first use.
    #[must_use]
    pub fn new(gateway: Arc<dyn Gateway>, config: &CacheConfig) -> Self {
        Self {
            gateway,
            ttl: chrono::Duration::from_std(config.entity_ttl()).unwrap_or(chrono::Duration::MAX),
            cities: Mutex::new(Slot::default()),
            regions: Mutex::new(Slot::default()),
            projects: Mutex::new(Slot::default()),
        }
    }

    /// Returns every known code, refreshing stale slots first.
    ///
    /// Refresh failures are logged; the previous data is returned.
    pub async fn codes(&self) -> LocationCodes {
        LocationCodes {
            cities: self.city_codes().await,
            regions: self.region_codes().await,
            projects: self.project_cities().await,
        }
    }

    /// Known city codes.
    pub async fn city_codes(&self) -> BTreeSet<String> {
        self.read_slot(&self.cities, "city codes", || self.fetch_group("city", CITY_KEYS))
            .await
    }

    /// Known region codes.
    pub async fn region_codes(&self) -> BTreeSet<String> {
        self.read_slot(&self.regions, "region codes", || {
            self.fetch_group("region", REGION_KEYS)
        })
        .await
    }

    /// Project code to city code.
    pub async fn project_cities(&self) -> BTreeMap<String, String> {
        self.read_slot(&self.projects, "project cities", || self.fetch_projects())
            .await
    }

    async fn read_slot<T, F, Fut>(&self, slot: &Mutex<Slot<T>>, name: &'static str, fetch: F) -> T
    where
        T: SlotValue,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, Report<ResolveError>>>,
    {
        let mut guard = slot.lock().await;
        let now = Utc::now();
        if guard.is_fresh(self.ttl, now) {
            return guard.value.clone();
        }

        match fetch().await {
            Ok(value) if !value.is_empty() => {
                debug!(cache = name, "refreshed");
                guard.value = value;
                guard.refreshed_at = Some(now);
            }
            Ok(_) => {
                warn!(cache = name, "refresh returned no rows, keeping previous data");
                Self::hold_stale(&mut guard, now);
            }
            Err(e) => {
                warn!(cache = name, error = %e, "refresh failed, keeping previous data");
                Self::hold_stale(&mut guard, now);
            }
        }
        guard.value.clone()
    }

    // Stale data is served for another TTL window instead of re-fetching on
    // every read; an empty slot keeps retrying.
    fn hold_stale<T: SlotValue>(slot: &mut Slot<T>, now: DateTime<Utc>) {
        if !slot.value.is_empty() {
            slot.refreshed_at = Some(now);
        }
    }

    #[instrument(skip(self, keys))]
    async fn fetch_group(
        &self,
        group_by: &'static str,
        keys: &[&str],
    ) -> Result<BTreeSet<String>, Report<ResolveError>> {
        let request = GatewayRequest::get("/kiosks/aggregate").with_query("group_by", group_by);
        let body = self.fetch(&request, group_by).await?;
        let envelope = unwrap_rows(&body).map_err(|e| ResolveError::FetchFailed {
            source: group_by,
            reason: e.to_string(),
        })?;

        Ok(envelope
            .rows
            .iter()
            .filter_map(|row| match row {
                JsonValue::String(s) => Some(s.clone()),
                _ => json_str(row, keys),
            })
            .map(|code| code.trim().to_lowercase())
            .filter(|code| !code.is_empty())
            .collect())
    }

    #[instrument(skip(self))]
    async fn fetch_projects(&self) -> Result<BTreeMap<String, String>, Report<ResolveError>> {
        let request = GatewayRequest::get("/projects").with_query("limit", 500);
        let body = self.fetch(&request, "projects").await?;
        let envelope = unwrap_rows(&body).map_err(|e| ResolveError::FetchFailed {
            source: "projects",
            reason: e.to_string(),
        })?;

        Ok(envelope
            .rows
            .iter()
            .filter_map(|row| {
                let code = json_str(row, PROJECT_CODE_KEYS)?.to_lowercase();
                let city = json_str(row, PROJECT_CITY_KEYS)?.to_lowercase();
                Some((code, city))
            })
            .collect())
    }

    async fn fetch(
        &self,
        request: &GatewayRequest,
        source: &'static str,
    ) -> Result<JsonValue, Report<ResolveError>> {
        Ok(self
            .gateway
            .get_json(request)
            .await
            .map_err(|e| ResolveError::FetchFailed {
                source,
                reason: e.to_string(),
            })?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scm_assistant_gateway::testing::ScriptedGateway;
    use scm_assistant_gateway::{GatewayResponse, Method};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn gateway() -> ScriptedGateway {
        ScriptedGateway::new()
            .json_when(
                "/kiosks/aggregate",
                &[("group_by", "city")],
                json!({"data": [{"city": "MOCO", "count": 4}, {"city": "dc"}]}),
            )
            .json_when(
                "/kiosks/aggregate",
                &[("group_by", "region")],
                json!({"items": [{"key": "brt"}, {"key": "nw"}]}),
            )
            .json(
                "/projects",
                json!([{"code": "BRT-PRJ", "city": "moco"}, {"code": "orphan"}]),
            )
    }

    #[tokio::test]
    async fn loads_all_slots() {
        let cache = EntityCache::new(Arc::new(gateway()), &CacheConfig::default());
        let codes = cache.codes().await;

        assert_eq!(codes.cities, BTreeSet::from(["dc".to_string(), "moco".to_string()]));
        assert_eq!(codes.regions, BTreeSet::from(["brt".to_string(), "nw".to_string()]));
        assert_eq!(codes.projects.get("brt-prj"), Some(&"moco".to_string()));
        assert_eq!(codes.projects.len(), 1);
        assert!(codes.is_city_like("brt-prj"));
    }

    #[tokio::test]
    async fn fresh_slots_are_not_refetched() {
        let gateway = Arc::new(gateway());
        let cache = EntityCache::new(gateway.clone(), &CacheConfig::default());
        cache.codes().await;
        cache.codes().await;

        assert_eq!(gateway.requests_for("/kiosks/aggregate").len(), 2);
        assert_eq!(gateway.requests_for("/projects").len(), 1);
    }

    #[tokio::test]
    async fn empty_refresh_keeps_previous_codes() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let gateway = ScriptedGateway::new().route(Method::Get, "/kiosks/aggregate", move |_| {
            let body = if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                json!({"data": [{"city": "moco"}]})
            } else {
                json!({"data": []})
            };
            Some(GatewayResponse::ok_json(&body))
        });
        let config = CacheConfig {
            entity_ttl_seconds: 0,
            ..CacheConfig::default()
        };
        let cache = EntityCache::new(Arc::new(gateway), &config);

        assert_eq!(cache.city_codes().await.len(), 1);
        assert_eq!(cache.city_codes().await, BTreeSet::from(["moco".to_string()]));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failed_refresh_on_empty_slot_retries() {
        let gateway = Arc::new(ScriptedGateway::new().status("/projects", 500, "boom"));
        let cache = EntityCache::new(gateway.clone(), &CacheConfig::default());

        assert!(cache.project_cities().await.is_empty());
        assert!(cache.project_cities().await.is_empty());
        assert_eq!(gateway.requests_for("/projects").len(), 2);
    }

    #[tokio::test]
    async fn concurrent_readers_share_one_refresh() {
        let gateway = Arc::new(gateway());
        let cache = Arc::new(EntityCache::new(gateway.clone(), &CacheConfig::default()));

        let a = tokio::spawn({
            let cache = Arc::clone(&cache);
            async move { cache.region_codes().await }
        });
        let b = tokio::spawn({
            let cache = Arc::clone(&cache);
            async move { cache.region_codes().await }
        });
        assert_eq!(a.await.unwrap(), b.await.unwrap());
        assert_eq!(gateway.requests_for("/kiosks/aggregate").len(), 1);
    }
}
