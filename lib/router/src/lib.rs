//! Intent routing and chat entry points for the scm-assistant platform.
//!
//! This crate provides:
//!
//! - **Intent Router**: the ordered handler chain and the pending-continuation
//!   dispatcher that runs before it
//! - **Handlers**: deterministic answers for scope, telemetry, poster, campaign,
//!   venue, and proof-of-play questions
//! - **Parameter Extraction**: top N, metric, and date ranges from free text
//! - **Assistant**: `chat` and `chat_stream`, falling back to the LLM tool loop

pub mod assistant;
pub mod context;
pub mod error;
pub mod handler;
pub mod handlers;
pub mod params;

pub use assistant::{Assistant, AssistantSettings, ChatRequest, ChatResponse};
pub use context::{HandlerContext, MemoryConfig, Resolvers};
pub use error::AssistantError;
pub use handler::{HandlerOutcome, IntentHandler, IntentRequest, IntentRouter, Routed};
pub use handlers::default_router;
pub use params::{DateRange, Metric};
