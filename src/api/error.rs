//! API Error Types
//!
//! Defines error types for the API layer and implements conversion
//! to HTTP responses with appropriate status codes.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::directory::DirectoryError;
use crate::ingest::IngestError;
use crate::relay::RelayError;
use crate::storage::StoreError;

/// API error types
#[derive(Error, Debug)]
pub enum ApiError {
    /// Malformed request (bad query string, unparsable body)
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Well-formed request with invalid content
    #[error("Validation error: {0}")]
    Validation(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// The client does not accept a JSON response
    #[error("Not acceptable: {0}")]
    NotAcceptable(String),

    /// The request body is not JSON
    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    /// Event store error
    #[error("Storage error: {0}")]
    Storage(StoreError),

    /// Sensor or user directory error
    #[error("Directory error: {0}")]
    Directory(DirectoryError),

    /// Live relay error
    #[error("Relay error: {0}")]
    Relay(RelayError),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),

    /// Service unavailable (dependency down)
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => ApiError::NotFound(err.to_string()),
            StoreError::InvalidEvent(_) => ApiError::Validation(err.to_string()),
            other => ApiError::Storage(other),
        }
    }
}

impl From<DirectoryError> for ApiError {
    fn from(err: DirectoryError) -> Self {
        match err {
            e if e.is_not_found() => ApiError::NotFound(e.to_string()),
            DirectoryError::InvalidSerialNumber(_)
            | DirectoryError::InvalidSensorType(_)
            | DirectoryError::InvalidUserName => ApiError::Validation(err.to_string()),
            other => ApiError::Directory(other),
        }
    }
}

impl From<RelayError> for ApiError {
    fn from(err: RelayError) -> Self {
        match err {
            RelayError::SensorNotFound(_) => ApiError::NotFound(err.to_string()),
            RelayError::Directory(e) => e.into(),
            RelayError::TooManyConnections | RelayError::ShuttingDown => {
                ApiError::ServiceUnavailable(err.to_string())
            }
            other => ApiError::Relay(other),
        }
    }
}

impl From<IngestError> for ApiError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::MissingTimestamp => ApiError::Validation(err.to_string()),
            IngestError::Directory(e) => e.into(),
            IngestError::Store(e) => e.into(),
        }
    }
}

/// Error response body
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
    pub request_id: String,
}

/// Error details
#[derive(Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::NotAcceptable(_) => (StatusCode::NOT_ACCEPTABLE, "NOT_ACCEPTABLE"),
            ApiError::UnsupportedMediaType(_) => {
                (StatusCode::UNSUPPORTED_MEDIA_TYPE, "UNSUPPORTED_MEDIA_TYPE")
            }
            ApiError::Storage(StoreError::Cancelled) | ApiError::Directory(DirectoryError::Cancelled) => {
                (StatusCode::SERVICE_UNAVAILABLE, "CANCELLED")
            }
            ApiError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR"),
            ApiError::Directory(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DIRECTORY_ERROR"),
            ApiError::Relay(_) => (StatusCode::INTERNAL_SERVER_ERROR, "RELAY_ERROR"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            ApiError::ServiceUnavailable(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE")
            }
            ApiError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR"),
        };

        let request_id = uuid::Uuid::new_v4().to_string();

        if status.is_server_error() {
            tracing::error!(
                request_id = %request_id,
                error_code = %code,
                error_message = %self,
                "API error occurred"
            );
        } else {
            tracing::debug!(
                request_id = %request_id,
                error_code = %code,
                error_message = %self,
                "Request rejected"
            );
        }

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message: self.to_string(),
            },
            request_id,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type for API operations
pub type ApiResult<T> = Result<T, ApiError>;
