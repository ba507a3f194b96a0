//! Orchestrator error types and their HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

/// Orchestrator errors.
#[derive(Error, Debug)]
pub enum OrchestratorError {
    /// Request body failed validation.
    #[error("{0}")]
    InvalidRequest(String),

    /// Unknown function name.
    #[error("function '{0}' not found")]
    FunctionNotFound(String),

    /// Unknown function id.
    #[error("function not found")]
    FunctionIdNotFound,

    /// A function with this name already exists.
    #[error("function with name '{0}' already exists")]
    DuplicateFunction(String),

    /// No active workers at schedule time.
    #[error("no active worker nodes available")]
    NoWorkersAvailable,

    /// ExecuteFunction dispatch failed (connect, protocol, or timeout).
    #[error("execution failed: {0}")]
    Dispatch(String),

    /// The worker ran the function and reported failure.
    #[error("function execution failed: {0}")]
    ExecutionFailed(String),

    /// Snapshot read/write failure.
    #[error("snapshot store error: {0}")]
    Store(String),
}

/// Result type for orchestrator operations.
pub type Result<T> = std::result::Result<T, OrchestratorError>;

impl OrchestratorError {
    /// Maps the error to the HTTP status reported to callers.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::FunctionNotFound(_) | Self::FunctionIdNotFound => StatusCode::NOT_FOUND,
            Self::DuplicateFunction(_) => StatusCode::CONFLICT,
            Self::NoWorkersAvailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::Dispatch(_) | Self::ExecutionFailed(_) | Self::Store(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for OrchestratorError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = serde_json::json!({
            "status": "error",
            "message": self.to_string(),
        });
        (status, Json(body)).into_response()
    }
}
