//! # dapi Errors
//!
//! One error type for the whole request path: composer, execution context,
//! handlers and the batch coordinator all return [`DapiError`].

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

/// Result type for request-path operations
pub type DapiResult<T> = Result<T, DapiError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DapiError {
    // ==================
    // Routing (404)
    // ==================
    #[error("table ({0}) not found")]
    UnknownTable(String),

    #[error("unknown path: {method} {path}")]
    UnknownPath { method: String, path: String },

    // ==================
    // Composition and payload (400)
    // ==================
    #[error("table ({table}) has no column ({column})")]
    UnknownColumn { table: String, column: String },

    #[error("missing primary key: {0}")]
    MissingPrimaryKey(String),

    #[error("missing limit: deletes require a positive integer limit")]
    MissingLimit,

    #[error("missing predicate: updates require at least one filter")]
    MissingPredicate,

    #[error("unfiltered delete on table ({0}) is disabled")]
    UnfilteredDelete(String),

    #[error("malformed body: {0}")]
    MalformedBody(String),

    #[error("malformed query: {0}")]
    MalformedQuery(String),

    #[error("batch contains no requests")]
    EmptyBatch,

    #[error("batch of {0} requests exceeds maximum of {1}")]
    BatchTooLarge(usize, usize),

    // ==================
    // Deadlines (408)
    // ==================
    #[error("batch exceeded its deadline of {0} ms")]
    BatchTimeout(u64),

    // ==================
    // Store (500)
    // ==================
    #[error("unable to execute query: {0}")]
    QueryExecution(String),

    #[error("unable to commit: {0}")]
    CommitFailed(String),

    #[error("execution context is closed")]
    ClosedContext,

    #[error("no database connection available after {0} ms")]
    PoolExhausted(u64),

    #[error("catalog error: {0}")]
    Catalog(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl DapiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            DapiError::UnknownTable(_) | DapiError::UnknownPath { .. } => StatusCode::NOT_FOUND,

            DapiError::UnknownColumn { .. }
            | DapiError::MissingPrimaryKey(_)
            | DapiError::MissingLimit
            | DapiError::MissingPredicate
            | DapiError::UnfilteredDelete(_)
            | DapiError::MalformedBody(_)
            | DapiError::MalformedQuery(_)
            | DapiError::EmptyBatch
            | DapiError::BatchTooLarge(_, _) => StatusCode::BAD_REQUEST,

            DapiError::BatchTimeout(_) => StatusCode::REQUEST_TIMEOUT,

            DapiError::QueryExecution(_)
            | DapiError::CommitFailed(_)
            | DapiError::ClosedContext
            | DapiError::PoolExhausted(_)
            | DapiError::Catalog(_)
            | DapiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn unknown_path(method: impl Into<String>, path: impl Into<String>) -> Self {
        DapiError::UnknownPath {
            method: method.into(),
            path: path.into(),
        }
    }

    pub fn unknown_column(table: impl Into<String>, column: impl Into<String>) -> Self {
        DapiError::UnknownColumn {
            table: table.into(),
            column: column.into(),
        }
    }
}

impl From<rusqlite::Error> for DapiError {
    fn from(err: rusqlite::Error) -> Self {
        DapiError::QueryExecution(err.to_string())
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
}

impl From<&DapiError> for ErrorResponse {
    fn from(err: &DapiError) -> Self {
        Self {
            code: err.status_code().as_u16(),
            error: err.to_string(),
        }
    }
}

impl IntoResponse for DapiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(ErrorResponse::from(&self));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            DapiError::UnknownTable("ghost".to_string()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            DapiError::unknown_path("GET", "/nope").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(DapiError::MissingLimit.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            DapiError::BatchTimeout(10).status_code(),
            StatusCode::REQUEST_TIMEOUT
        );
        assert_eq!(
            DapiError::CommitFailed("disk I/O error".to_string()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_store_errors_keep_text() {
        let err = DapiError::from(rusqlite::Error::InvalidQuery);
        match err {
            DapiError::QueryExecution(text) => assert!(!text.is_empty()),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_error_response_body() {
        let body = ErrorResponse::from(&DapiError::unknown_column("user", "bogus"));
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["code"], 400);
        assert_eq!(json["error"], "table (user) has no column (bogus)");
    }
}
