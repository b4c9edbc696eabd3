//! Shared handler state, the error envelope, and operational endpoints.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use fanscore_core::FanError;
use fanscore_engine::EngagementEngine;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;

/// Shared application state for REST handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<EngagementEngine>,
    pub node_id: String,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(engine: Arc<EngagementEngine>, node_id: impl Into<String>) -> Self {
        Self {
            engine,
            node_id: node_id.into(),
            start_time: Instant::now(),
        }
    }
}

/// Validation is the caller's fault, store trouble is worth a retry,
/// anything else is ours.
pub fn status_for(err: &FanError) -> StatusCode {
    if err.is_validation() {
        StatusCode::BAD_REQUEST
    } else if err.is_retryable() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

/// Failure envelope shared with `ActivityResponse`: `error` is the descriptive
/// text, `code` the machine-readable kind, `message` the caller-facing summary.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub code: String,
    pub message: String,
}

/// Error envelope paired with its HTTP status.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorResponse,
}

impl From<FanError> for ApiError {
    fn from(err: FanError) -> Self {
        Self {
            status: status_for(&err),
            body: ErrorResponse {
                success: false,
                error: err.to_string(),
                code: err.code().to_string(),
                message: err.summary().to_string(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub node_id: String,
    pub uptime_secs: u64,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        node_id: state.node_id.clone(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

/// GET /ready: 200 once the store answers a read.
pub async fn readiness(State(state): State<AppState>) -> StatusCode {
    match state.engine.fan_state("readiness-probe", "readiness-probe").await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            warn!(error = %e, "Readiness probe failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

/// GET /live
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}
