//! Event store error types
//!
//! Defines all errors that can occur in the storage layer.

use thiserror::Error;

use super::types::SensorId;

/// Errors that can occur in the event store
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No events have ever been recorded for the sensor
    #[error("No events recorded for sensor {0}")]
    NotFound(SensorId),

    /// Event rejected before it reached the log
    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    /// The caller's cancellation token fired or its deadline passed
    #[error("Operation cancelled")]
    Cancelled,

    /// Backend (database) failure
    #[error("Backend error: {0}")]
    Backend(String),

    /// Lock acquisition failed
    #[error("Lock error: {0}")]
    Lock(String),
}

impl StoreError {
    /// Whether the error just means "nothing recorded yet"
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;
