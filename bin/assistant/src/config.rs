//! Process configuration.
//!
//! Loaded via the `config` crate from environment variables, with `__`
//! separating nested keys: `GATEWAY__BASE_URL`, `LLM__MODEL`,
//! `ORCHESTRATOR__MAX_TOOL_CALLS`, `CACHE__ENTITY_TTL_SECONDS`, ...

use scm_assistant_ai::{LlmConfig, OrchestratorConfig};
use scm_assistant_gateway::GatewayConfig;
use scm_assistant_resolve::{CacheConfig, DeviceSearchConfig};
use scm_assistant_router::{AssistantSettings, MemoryConfig};
use serde::Deserialize;
use std::time::Duration;

/// Configuration composed from the library configs.
#[derive(Debug, Deserialize)]
pub struct AssistantConfig {
    /// Gateway connection.
    pub gateway: GatewayConfig,

    /// LLM provider connection.
    pub llm: LlmConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    #[serde(default)]
    pub memory: MemoryConfig,

    #[serde(default)]
    pub devices: DeviceSearchConfig,

    /// Deadline for answering one message, in seconds.
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
}

fn default_request_timeout_seconds() -> u64 {
    180
}

impl AssistantConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Settings for the assistant's caches, tool loop, and resolvers.
    #[must_use]
    pub fn settings(&self) -> AssistantSettings {
        AssistantSettings {
            cache: self.cache.clone(),
            orchestrator: self.orchestrator.clone(),
            memory: self.memory.clone(),
            devices: self.devices.clone(),
        }
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}
