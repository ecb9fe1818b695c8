//! HTTP Routes
//!
//! `/health`, the batch endpoint, and a fallback that hands every other
//! request to the dispatcher bound to the pool.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};

use crate::api::{Dispatcher, HandlerRequest, HealthResponse, HttpSink};
use crate::batch::{BatchRequest, TransactionCoordinator};
use crate::context::{ConnectionPool, PoolContext};
use crate::error::DapiError;

/// State shared by every route
pub struct AppState {
    pub pool: ConnectionPool,
    pub dispatcher: Arc<Dispatcher>,
    pub coordinator: TransactionCoordinator,
}

/// Health check handler
pub async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse::ok()))
}

/// `POST {prefix}/transaction`
pub async fn transaction_handler(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let batch: BatchRequest = match serde_json::from_slice(&body) {
        Ok(batch) => batch,
        Err(e) => return DapiError::MalformedBody(e.to_string()).into_response(),
    };

    // The transaction never crosses an await point
    let result =
        tokio::task::spawn_blocking(move || state.coordinator.execute(&batch)).await;

    match result {
        Ok(Ok(outcome)) => (outcome.status(), Json(outcome)).into_response(),
        Ok(Err(err)) => err.into_response(),
        Err(join) => DapiError::Internal(join.to_string()).into_response(),
    }
}

/// Every path not routed by axum goes through the dispatcher
pub async fn dispatch_handler(
    State(state): State<Arc<AppState>>,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> Response {
    let result = tokio::task::spawn_blocking(move || {
        let request = HandlerRequest::new(method, &uri, body.to_vec())?;
        let ctx = PoolContext::new(state.pool.clone());
        let mut sink = HttpSink::new();
        state.dispatcher.bind(&ctx).serve(request, &mut sink)?;
        Ok::<_, DapiError>(sink)
    })
    .await;

    match result {
        Ok(Ok(sink)) => sink.into_response(),
        Ok(Err(err)) => err.into_response(),
        Err(join) => DapiError::Internal(join.to_string()).into_response(),
    }
}
