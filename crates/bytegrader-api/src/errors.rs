use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde_json::json;
use thiserror::Error;

/// HTTP-facing error type. One variant per synchronous admission/handler
/// failure named in spec §7; dispatch failures never surface here — they
/// are recorded on the Job and read back through `/status/{id}`.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    ValidationError(String),

    #[error("Invalid assignment ID format")]
    InvalidAssignmentId,

    #[error("Payload too large")]
    PayloadTooLarge,

    #[error("IP address not allowed")]
    IpNotAllowed,

    #[error("Invalid or missing API key")]
    Unauthorized,

    #[error("Missing X-Username header")]
    MissingUsername,

    #[error("{0}")]
    RateLimited(String),

    #[error("Queue is full, try again later")]
    QueueFull,

    #[error("Job not found")]
    NotFound,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::ValidationError(_) => StatusCode::BAD_REQUEST,
            ApiError::InvalidAssignmentId => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge => StatusCode::BAD_REQUEST,
            ApiError::IpNotAllowed => StatusCode::FORBIDDEN,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::MissingUsername => StatusCode::BAD_REQUEST,
            ApiError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::QueueFull => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.to_string();

        match status {
            StatusCode::INTERNAL_SERVER_ERROR | StatusCode::SERVICE_UNAVAILABLE => {
                tracing::error!(message = %message, status = status.as_u16(), "request failed");
            }
            _ => {
                tracing::warn!(message = %message, status = status.as_u16(), "request rejected");
            }
        }

        (status, Json(json!({ "error": message }))).into_response()
    }
}
