use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;


/// Errors raised by the sync transports while exchanging messages with a client.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The client connection is gone; its contribution stays until it reconnects and resyncs.
    #[error("client `{0}` disconnected")]
    Disconnected(String),
    /// A control message could not be decoded or failed validation.
    #[error("malformed message: {0}")]
    MalformedMessage(String),
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        TransportError::MalformedMessage(err.to_string())
    }
}

impl From<ValidationErrors> for TransportError {
    fn from(err: ValidationErrors) -> Self {
        TransportError::MalformedMessage(format!("validation failed: {err}"))
    }
}

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The service is running in degraded mode while the item source is unhealthy.
    #[error("item source unavailable (degraded mode)")]
    Degraded,
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Requested item is not tracked.
    #[error("not found: {0}")]
    NotFound(String),
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Service unavailable or degraded.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Degraded => AppError::ServiceUnavailable("degraded mode".into()),
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::NotFound(message) => AppError::NotFound(message),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}
