//! Per-message record of Gateway calls.

use crate::client::{Gateway, GatewayRequest, GatewayResponse, Method};
use crate::error::GatewayError;
use async_trait::async_trait;
use rootcause::Report;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

/// One Gateway call made while answering a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    /// HTTP method.
    pub method: Method,
    /// Request path.
    pub path: String,
    /// Query parameters sent.
    pub query: BTreeMap<String, String>,
    /// Response status, when a response arrived.
    pub status: Option<u16>,
    /// Transport or status error text.
    pub error: Option<String>,
}

impl StepRecord {
    fn from_outcome(
        request: &GatewayRequest,
        outcome: &Result<GatewayResponse, Report<GatewayError>>,
    ) -> Self {
        let (status, error) = match outcome {
            Ok(response) if response.is_success() => (Some(response.status), None),
            Ok(response) => (
                Some(response.status),
                Some(format!("status {}", response.status)),
            ),
            Err(e) => (None, Some(e.to_string())),
        };
        Self {
            method: request.method,
            path: request.path.clone(),
            query: request.query.clone(),
            status,
            error,
        }
    }

    /// Returns true if the call produced a 2xx response.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Gateway wrapper that records every call as a [`StepRecord`].
pub struct RecordingGateway {
    inner: Arc<dyn Gateway>,
    steps: Mutex<Vec<StepRecord>>,
}

impl RecordingGateway {
    /// Wraps a gateway.
    #[must_use]
    pub fn new(inner: Arc<dyn Gateway>) -> Self {
        Self {
            inner,
            steps: Mutex::new(Vec::new()),
        }
    }

    /// Returns a copy of the steps recorded so far.
    #[must_use]
    pub fn steps(&self) -> Vec<StepRecord> {
        self.steps
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Removes and returns the recorded steps.
    #[must_use]
    pub fn take_steps(&self) -> Vec<StepRecord> {
        std::mem::take(&mut *self.steps.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

#[async_trait]
impl Gateway for RecordingGateway {
    async fn send(&self, request: &GatewayRequest) -> Result<GatewayResponse, Report<GatewayError>> {
        let outcome = self.inner.send(request).await;
        let record = StepRecord::from_outcome(request, &outcome);
        self.steps
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
        outcome
    }
}
