//! Error types for the gateway crate.
//!
//! - `GatewayError`: transport and status failures talking to the Gateway
//! - `EnvelopeError`: a response body did not match any known shape

use std::fmt;

/// Errors from Gateway requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// The request never produced an HTTP response.
    Transport { reason: String },
    /// The Gateway answered with a non-2xx status.
    Status { status: u16, body: String },
    /// The response body was not valid JSON.
    ResponseParseFailed { reason: String },
    /// Invalid client configuration.
    InvalidConfig { reason: String },
    /// The request context was cancelled or its deadline passed.
    Cancelled,
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport { reason } => write!(f, "gateway request failed: {reason}"),
            Self::Status { status, body } => {
                if body.is_empty() {
                    write!(f, "gateway returned status {status}")
                } else {
                    write!(f, "gateway returned status {status}: {body}")
                }
            }
            Self::ResponseParseFailed { reason } => {
                write!(f, "failed to parse gateway response: {reason}")
            }
            Self::InvalidConfig { reason } => {
                write!(f, "invalid gateway configuration: {reason}")
            }
            Self::Cancelled => write!(f, "gateway request cancelled"),
        }
    }
}

impl std::error::Error for GatewayError {}

/// A response body did not match any of the known envelope shapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvelopeError {
    /// No list of rows could be located.
    UnrecognizedShape { found: &'static str },
}

impl fmt::Display for EnvelopeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnrecognizedShape { found } => {
                write!(f, "unrecognized response envelope: found {found}")
            }
        }
    }
}

impl std::error::Error for EnvelopeError {}
