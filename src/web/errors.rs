//! HTTP mapping for the core error taxonomy.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

use crate::error::TimetablerError;

/// Error wrapper that renders as a JSON problem body.
#[derive(Debug)]
pub struct ApiError(pub TimetablerError);

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl From<TimetablerError> for ApiError {
    fn from(inner: TimetablerError) -> Self {
        ApiError(inner)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            TimetablerError::NotFound(_) => StatusCode::NOT_FOUND,
            TimetablerError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            TimetablerError::Transport(_) => StatusCode::BAD_GATEWAY,
            TimetablerError::Reconciliation(_)
            | TimetablerError::Database(_)
            | TimetablerError::Serialization(_)
            | TimetablerError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            error!(error = %self.0, "request failed");
        }

        let body = ErrorBody {
            error: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
