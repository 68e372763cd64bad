use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::services::generation::GenerationError;
use crate::services::upload::UploadError;
use crate::watcher::WatchError;

/// Error type for HTTP handlers, rendered as `{"error", "code"}` JSON.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Watch(#[from] WatchError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Task {0} not found")]
    NotFound(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::Upload(UploadError::TooLarge { .. }) => {
                (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE")
            }
            ApiError::Upload(UploadError::NotAnImage(_)) => {
                (StatusCode::UNSUPPORTED_MEDIA_TYPE, "UNSUPPORTED_MEDIA_TYPE")
            }
            ApiError::Upload(UploadError::Empty) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Generation(GenerationError::InvalidPayload(_)) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR")
            }
            ApiError::Generation(GenerationError::Unreachable(_)) => {
                (StatusCode::SERVICE_UNAVAILABLE, "GENERATION_UNAVAILABLE")
            }
            ApiError::Generation(_) => (StatusCode::BAD_GATEWAY, "GENERATION_FAILED"),
            ApiError::Watch(WatchError::InvalidArgument(_)) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR")
            }
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        let body = json!({
            "error": self.to_string(),
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}
