//! Transaction coordinator
//!
//! Replays an ordered list of sub-requests through the shared dispatcher,
//! bound to one transaction. The first step that fails, cannot be routed or
//! runs past the deadline rolls everything back; otherwise the batch commits.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::http::StatusCode;

use super::types::{BatchRequest, BatchResult, SubResponse};
use crate::api::{CaptureSink, Dispatcher, ResponseSink};
use crate::context::{ConnectionPool, TransactionContext};
use crate::error::{DapiError, DapiResult, ErrorResponse};
use crate::observability::{log_event_with_fields, Event};

#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub max_requests: usize,
    /// Checked between steps; a step already running is bounded by the busy timeout
    pub timeout: Duration,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            max_requests: 100,
            timeout: Duration::from_millis(30_000),
        }
    }
}

#[derive(Clone)]
pub struct TransactionCoordinator {
    pool: ConnectionPool,
    dispatcher: Arc<Dispatcher>,
    options: BatchOptions,
}

impl TransactionCoordinator {
    pub fn new(pool: ConnectionPool, dispatcher: Arc<Dispatcher>, options: BatchOptions) -> Self {
        Self {
            pool,
            dispatcher,
            options,
        }
    }

    /// Run a batch atomically.
    ///
    /// `Err` means nothing was attempted: the batch was empty, too large, or
    /// no transaction could be opened. Once a transaction is open the
    /// outcome is always an `Ok` envelope, committed or rolled back.
    pub fn execute(&self, batch: &BatchRequest) -> DapiResult<BatchResult> {
        let total = batch.requests.len();
        if total == 0 {
            return Err(DapiError::EmptyBatch);
        }
        if total > self.options.max_requests {
            return Err(DapiError::BatchTooLarge(total, self.options.max_requests));
        }

        let tx = TransactionContext::begin(&self.pool)?;
        let batch_id = tx.id().to_string();
        log_event_with_fields(
            Event::BatchStart,
            &[("batch_id", &batch_id), ("requests", &total.to_string())],
        );

        let bound = self.dispatcher.bind(&tx);
        // None: the timeout is too far out to represent, never expires
        let deadline = Instant::now().checked_add(self.options.timeout);
        let mut responses = Vec::with_capacity(total);

        for (step, sub) in batch.requests.iter().enumerate() {
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                let err = DapiError::BatchTimeout(self.options.timeout.as_millis() as u64);
                return Ok(abort(&tx, &batch_id, step, err, responses));
            }

            let mut sink = CaptureSink::new();
            let routed = sub
                .to_handler_request()
                .and_then(|req| bound.serve(req, &mut sink));
            if let Err(err) = routed {
                responses.push(error_response(&err));
                return Ok(abort(&tx, &batch_id, step, err, responses));
            }

            let status = sink.status();
            let succeeded = sink.is_success();
            let response = sink.into_sub_response();
            log_event_with_fields(
                Event::BatchStep,
                &[
                    ("batch_id", &batch_id),
                    ("method", &sub.method),
                    ("status", status.as_str()),
                    ("step", &step.to_string()),
                    ("url", &sub.url),
                ],
            );

            if !succeeded {
                let message = failure_message(&response);
                responses.push(response);
                return Ok(rolled_back(&tx, &batch_id, Some(step), status, message, responses));
            }
            responses.push(response);
        }

        match tx.commit() {
            Ok(()) => {
                log_event_with_fields(
                    Event::BatchCommitted,
                    &[("batch_id", &batch_id), ("steps", &total.to_string())],
                );
                Ok(BatchResult::committed(responses))
            }
            Err(err) => {
                log_event_with_fields(
                    Event::BatchRolledBack,
                    &[("batch_id", &batch_id), ("error", &err.to_string())],
                );
                Ok(BatchResult::rolled_back(
                    None,
                    err.status_code(),
                    err.to_string(),
                    responses,
                ))
            }
        }
    }
}

fn abort(
    tx: &TransactionContext,
    batch_id: &str,
    step: usize,
    err: DapiError,
    responses: Vec<SubResponse>,
) -> BatchResult {
    rolled_back(tx, batch_id, Some(step), err.status_code(), err.to_string(), responses)
}

fn rolled_back(
    tx: &TransactionContext,
    batch_id: &str,
    step: Option<usize>,
    status: StatusCode,
    message: String,
    responses: Vec<SubResponse>,
) -> BatchResult {
    let rollback = match tx.rollback() {
        Ok(()) => "ok".to_string(),
        Err(err) => err.to_string(),
    };
    let step_text = step.map(|s| s.to_string()).unwrap_or_default();
    log_event_with_fields(
        Event::BatchRolledBack,
        &[
            ("batch_id", batch_id),
            ("error", &message),
            ("rollback", &rollback),
            ("step", &step_text),
        ],
    );
    BatchResult::rolled_back(step, status, message, responses)
}

fn error_response(err: &DapiError) -> SubResponse {
    SubResponse {
        status: err.status_code().as_u16(),
        body: serde_json::to_value(ErrorResponse::from(err)).unwrap_or_default(),
    }
}

fn failure_message(response: &SubResponse) -> String {
    response
        .body
        .get("error")
        .and_then(|e| e.as_str())
        .map(String::from)
        .unwrap_or_else(|| format!("sub-request failed with status {}", response.status))
}
