//! LLM access for the scm-assistant platform.
//!
//! This crate provides:
//!
//! - **LLM Backend**: the chat / chat-with-tools interface and an
//!   OpenAI-compatible transport
//! - **Tool Catalog**: the method+path allowlist fetched from the Gateway
//! - **Tool Orchestrator**: the bounded `scm_request` tool-calling loop

pub mod backend;
pub mod catalog;
pub mod error;
pub mod openai;
pub mod orchestrator;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod tool_call;

pub use backend::{ChatMessage, ChatRole, LlmBackend, LlmReply, ToolCall, ToolChoice, ToolSpec};
pub use catalog::{CatalogSpec, ToolCatalog};
pub use error::{CatalogError, LlmError, ToolCallError};
pub use openai::{LlmConfig, OpenAiCompatibleBackend};
pub use orchestrator::{OrchestratorConfig, OrchestratorOutcome, ToolOrchestrator};
