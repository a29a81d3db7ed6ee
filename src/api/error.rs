//! HTTP error mapping
//!
//! Converts storage failures into JSON error responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::error::StorageError;
use crate::models::ErrorResponse;

// == Api Error Enum ==
#[derive(Error, Debug)]
pub enum ApiError {
    /// Key absent, expired or unreadable
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Blocking task panicked or was cancelled
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Storage(e) if e.is_connection_error() => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Storage(StorageError::Configuration(_))
            | ApiError::Storage(StorageError::Serialization(_)) => StatusCode::BAD_REQUEST,
            ApiError::Storage(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut message = self.to_string();
        if message.is_empty() {
            message = "Storage backend unavailable".to_string();
        }
        if status.is_server_error() {
            tracing::warn!(status = status.as_u16(), error = %message, "request failed");
        }

        (status, Json(ErrorResponse::new(message))).into_response()
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

// == Result Type Alias ==
pub type ApiResult<T> = std::result::Result<T, ApiError>;
