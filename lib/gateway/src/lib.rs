//! Gateway access for the scm-assistant platform.
//!
//! This crate provides:
//!
//! - **Gateway trait**: the read/write interface to the backend REST API
//! - **HttpGateway**: the reqwest transport for that interface
//! - **Envelope unwrap**: typed probing of `data`/`items`/nested response shapes
//! - **Page walker**: bounded pagination over list endpoints
//! - **Step recording**: a per-message log of every Gateway call made

pub mod client;
pub mod envelope;
pub mod error;
pub mod http;
pub mod paginate;
pub mod step;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use client::{Gateway, GatewayRequest, GatewayResponse, Method, RequestBody};
pub use envelope::{Envelope, RowsShape, json_number, json_str, unwrap_object, unwrap_rows};
pub use error::{EnvelopeError, GatewayError};
pub use http::{GatewayConfig, HttpGateway};
pub use paginate::{PageLimits, PageStop, PageWalk, walk_pages};
pub use step::{RecordingGateway, StepRecord};
