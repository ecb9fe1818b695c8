//! Response sinks
//!
//! Handlers never touch axum types directly. They write status, content type
//! and body into a [`ResponseSink`]; the live server renders an [`HttpSink`],
//! the batch coordinator keeps a [`CaptureSink`] per step.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::Value;

use crate::batch::SubResponse;
use crate::error::{DapiError, DapiResult, ErrorResponse};

pub const JSON_CONTENT_TYPE: &str = "application/json";

pub trait ResponseSink {
    fn set_status(&mut self, status: StatusCode);

    fn set_content_type(&mut self, content_type: &str);

    fn write_body(&mut self, body: &[u8]);

    fn status(&self) -> StatusCode;

    /// Record an error as a JSON error body with its status code
    fn error(&mut self, err: &DapiError) {
        let body = serde_json::to_vec(&ErrorResponse::from(err)).unwrap_or_default();
        self.set_status(err.status_code());
        self.set_content_type(JSON_CONTENT_TYPE);
        self.write_body(&body);
    }
}

/// Serialize `body` as JSON into the sink
pub fn write_json<T: Serialize + ?Sized>(
    sink: &mut dyn ResponseSink,
    status: StatusCode,
    body: &T,
) -> DapiResult<()> {
    let bytes = serde_json::to_vec(body).map_err(|e| DapiError::Internal(e.to_string()))?;
    sink.set_status(status);
    sink.set_content_type(JSON_CONTENT_TYPE);
    sink.write_body(&bytes);
    Ok(())
}

/// Buffers one sub-response for the batch coordinator
#[derive(Debug)]
pub struct CaptureSink {
    status: StatusCode,
    content_type: Option<String>,
    body: Vec<u8>,
}

impl CaptureSink {
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            content_type: None,
            body: Vec::new(),
        }
    }

    /// Statuses below 300 count as success
    pub fn is_success(&self) -> bool {
        self.status.as_u16() < 300
    }

    /// JSON bodies are embedded as values, anything else as a string
    pub fn into_sub_response(self) -> SubResponse {
        let is_json = self
            .content_type
            .as_deref()
            .map_or(false, |ct| ct.starts_with(JSON_CONTENT_TYPE));

        let body = if self.body.is_empty() {
            Value::Null
        } else if is_json {
            serde_json::from_slice(&self.body)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&self.body).into_owned()))
        } else {
            Value::String(String::from_utf8_lossy(&self.body).into_owned())
        };

        SubResponse {
            status: self.status.as_u16(),
            body,
        }
    }
}

impl Default for CaptureSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseSink for CaptureSink {
    fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    fn set_content_type(&mut self, content_type: &str) {
        self.content_type = Some(content_type.to_string());
    }

    fn write_body(&mut self, body: &[u8]) {
        self.body.extend_from_slice(body);
    }

    fn status(&self) -> StatusCode {
        self.status
    }
}

/// Collects a live response, rendered once the handler returns
#[derive(Debug)]
pub struct HttpSink {
    status: StatusCode,
    content_type: Option<HeaderValue>,
    body: Vec<u8>,
}

impl HttpSink {
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            content_type: None,
            body: Vec::new(),
        }
    }
}

impl Default for HttpSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseSink for HttpSink {
    fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    fn set_content_type(&mut self, content_type: &str) {
        self.content_type = HeaderValue::from_str(content_type).ok();
    }

    fn write_body(&mut self, body: &[u8]) {
        self.body.extend_from_slice(body);
    }

    fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for HttpSink {
    fn into_response(self) -> Response {
        let mut response = (self.status, self.body).into_response();
        if let Some(content_type) = self.content_type {
            response
                .headers_mut()
                .insert(header::CONTENT_TYPE, content_type);
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_capture_defaults_to_ok() {
        let sink = CaptureSink::new();
        assert!(sink.is_success());
        assert_eq!(sink.into_sub_response().body, Value::Null);
    }

    #[test]
    fn test_capture_embeds_json_body() {
        let mut sink = CaptureSink::new();
        write_json(&mut sink, StatusCode::OK, &json!({"rows_affected": 1})).unwrap();

        let response = sink.into_sub_response();
        assert_eq!(response.status, 200);
        assert_eq!(response.body["rows_affected"], 1);
    }

    #[test]
    fn test_capture_records_errors() {
        let mut sink = CaptureSink::new();
        sink.error(&DapiError::MissingLimit);

        assert!(!sink.is_success());
        let response = sink.into_sub_response();
        assert_eq!(response.status, 400);
        assert_eq!(response.body["code"], 400);
    }

    #[test]
    fn test_capture_keeps_text_as_string() {
        let mut sink = CaptureSink::new();
        sink.set_content_type("text/plain");
        sink.write_body(b"Root.");
        assert_eq!(sink.into_sub_response().body, json!("Root."));
    }

    #[test]
    fn test_http_sink_sets_content_type() {
        let mut sink = HttpSink::new();
        write_json(&mut sink, StatusCode::CREATED, &json!([])).unwrap();

        let response = sink.into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            JSON_CONTENT_TYPE
        );
    }
}
