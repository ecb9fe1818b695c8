//! Batch wire types

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::HandlerRequest;
use crate::error::DapiResult;

/// `POST /transaction` body
#[derive(Debug, Clone, Deserialize)]
pub struct BatchRequest {
    pub requests: Vec<SubRequest>,
}

/// One CRUD request replayed inside the batch
#[derive(Debug, Clone, Deserialize)]
pub struct SubRequest {
    pub method: String,
    pub url: String,
    /// Either a JSON-encoded string or an inline JSON value
    #[serde(default)]
    pub body: Option<Value>,
}

impl SubRequest {
    pub fn new(method: impl Into<String>, url: impl Into<String>, body: Option<Value>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            body,
        }
    }

    pub fn body_bytes(&self) -> Vec<u8> {
        match &self.body {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::String(encoded)) => encoded.as_bytes().to_vec(),
            Some(inline) => serde_json::to_vec(inline).unwrap_or_default(),
        }
    }

    pub fn to_handler_request(&self) -> DapiResult<HandlerRequest> {
        HandlerRequest::from_parts(&self.method, &self.url, self.body_bytes())
    }
}

/// Captured status and body of one replayed step
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubResponse {
    pub status: u16,
    pub body: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchOutcome {
    Committed,
    RolledBack,
}

/// Envelope returned for every batch that got as far as opening a transaction
#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    pub outcome: BatchOutcome,
    /// Index of the step that caused the rollback; absent when commit itself failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_step: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub responses: Vec<SubResponse>,
    #[serde(skip)]
    status: u16,
}

impl BatchResult {
    pub fn committed(responses: Vec<SubResponse>) -> Self {
        Self {
            outcome: BatchOutcome::Committed,
            failed_step: None,
            error: None,
            responses,
            status: StatusCode::OK.as_u16(),
        }
    }

    pub fn rolled_back(
        failed_step: Option<usize>,
        status: StatusCode,
        error: impl Into<String>,
        responses: Vec<SubResponse>,
    ) -> Self {
        Self {
            outcome: BatchOutcome::RolledBack,
            failed_step,
            error: Some(error.into()),
            responses,
            status: status.as_u16(),
        }
    }

    pub fn is_committed(&self) -> bool {
        self.outcome == BatchOutcome::Committed
    }

    /// HTTP status for the envelope
    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}
