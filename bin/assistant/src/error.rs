//! Startup errors for the command-line front-end.

use std::fmt;

/// Errors that stop the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliError {
    /// Configuration could not be loaded.
    Config { reason: String },
    /// A client could not be constructed.
    Startup { component: &'static str, reason: String },
    /// Standard input or output failed.
    Io { reason: String },
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config { reason } => write!(f, "invalid configuration: {reason}"),
            Self::Startup { component, reason } => {
                write!(f, "failed to start {component}: {reason}")
            }
            Self::Io { reason } => write!(f, "terminal I/O failed: {reason}"),
        }
    }
}

impl std::error::Error for CliError {}
