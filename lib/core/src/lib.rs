//! Core domain types and utilities for the scm-assistant platform.
//!
//! This crate provides the identifiers, request context, and error handling
//! foundation shared by the gateway, resolver, conversation, AI, and router
//! crates.

pub mod context;
pub mod error;
pub mod id;

pub use context::{CancelHandle, RequestContext};
pub use error::Result;
pub use id::{ConversationId, MessageId, ParseIdError, UserId};
