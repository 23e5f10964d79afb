//! Error types for the AI crate.
//!
//! Errors are designed for layered context using rootcause:
//! - `LlmError`: LLM backend operations
//! - `CatalogError`: fetching and parsing the endpoint allowlist
//! - `ToolCallError`: malformed tool call arguments

use std::fmt;

/// Errors from LLM backend operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    /// Request could not be sent or no response arrived.
    RequestFailed { reason: String },
    /// The provider answered with a non-success status.
    Api { status: u16, message: String },
    /// Response parsing failed.
    ResponseParseFailed { reason: String },
    /// Timeout waiting for response.
    Timeout,
    /// Rate limit exceeded.
    RateLimited { retry_after_secs: Option<u64> },
    /// Invalid configuration.
    InvalidConfig { reason: String },
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RequestFailed { reason } => write!(f, "LLM request failed: {reason}"),
            Self::Api { status, message } => {
                write!(f, "LLM provider returned {status}: {message}")
            }
            Self::ResponseParseFailed { reason } => {
                write!(f, "failed to parse LLM response: {reason}")
            }
            Self::Timeout => write!(f, "LLM request timed out"),
            Self::RateLimited { retry_after_secs } => {
                if let Some(secs) = retry_after_secs {
                    write!(f, "rate limited, retry after {secs}s")
                } else {
                    write!(f, "rate limited")
                }
            }
            Self::InvalidConfig { reason } => {
                write!(f, "invalid LLM configuration: {reason}")
            }
        }
    }
}

impl std::error::Error for LlmError {}

/// Errors from the tool catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// The API description could not be fetched.
    FetchFailed { reason: String },
    /// The API description has no usable `paths` table.
    InvalidSpec { reason: String },
}

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FetchFailed { reason } => write!(f, "failed to fetch tool catalog: {reason}"),
            Self::InvalidSpec { reason } => write!(f, "invalid tool catalog: {reason}"),
        }
    }
}

impl std::error::Error for CatalogError {}

/// Errors from decoding a tool call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolCallError {
    /// Arguments were not a JSON object of the expected shape.
    InvalidArguments { reason: String },
    /// The model named a tool that does not exist.
    UnknownTool { name: String },
}

impl fmt::Display for ToolCallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArguments { reason } => write!(f, "invalid tool arguments: {reason}"),
            Self::UnknownTool { name } => write!(f, "unknown tool: {name}"),
        }
    }
}

impl std::error::Error for ToolCallError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn llm_error_display() {
        let err = LlmError::Api {
            status: 503,
            message: "overloaded".to_string(),
        };
        assert!(err.to_string().contains("503"));
        assert!(err.to_string().contains("overloaded"));
        assert_eq!(
            LlmError::RateLimited {
                retry_after_secs: Some(3)
            }
            .to_string(),
            "rate limited, retry after 3s"
        );
    }

    #[test]
    fn catalog_error_display() {
        let err = CatalogError::InvalidSpec {
            reason: "missing paths".to_string(),
        };
        assert!(err.to_string().contains("missing paths"));
    }
}
