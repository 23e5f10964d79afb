//! Error types for the resolve crate.
//!
//! These only surface from cache refreshes; the public resolvers log them
//! and degrade to "not found".

use std::fmt;

/// Errors from refreshing resolver data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// The Gateway request failed.
    FetchFailed { source: &'static str, reason: String },
    /// The Gateway response held no usable rows.
    EmptyResult { source: &'static str },
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FetchFailed { source, reason } => {
                write!(f, "failed to fetch {source}: {reason}")
            }
            Self::EmptyResult { source } => write!(f, "{source} refresh returned no rows"),
        }
    }
}

impl std::error::Error for ResolveError {}
