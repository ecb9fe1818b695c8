//! # Response Formatting
//!
//! Bodies returned by the write handlers.

use serde::Serialize;
use serde_json::Value;

/// POST response
#[derive(Debug, Clone, Serialize)]
pub struct InsertResponse {
    pub message: &'static str,
    /// Rowid of the new row, or its key value for `WITHOUT ROWID` tables
    pub inserted_id: Value,
}

impl InsertResponse {
    pub fn success(inserted_id: impl Into<Value>) -> Self {
        Self {
            message: "success",
            inserted_id: inserted_id.into(),
        }
    }
}

/// PUT and DELETE response
#[derive(Debug, Clone, Serialize)]
pub struct AffectedResponse {
    pub message: &'static str,
    pub rows_affected: usize,
}

impl AffectedResponse {
    pub fn success(rows_affected: usize) -> Self {
        Self {
            message: "success",
            rows_affected,
        }
    }
}

/// `/health` response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

impl HealthResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}
