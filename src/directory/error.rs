//! Directory error types

use thiserror::Error;

use super::user::UserId;
use crate::storage::SensorId;

/// Errors raised by the sensor and user directories
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("Sensor not found: {0}")]
    SensorNotFound(SensorId),

    #[error("No sensor with serial number {0}")]
    SerialNumberNotFound(String),

    #[error("User not found: {0}")]
    UserNotFound(UserId),

    /// Serial numbers are exactly ten ASCII digits
    #[error("Invalid serial number: {0:?}")]
    InvalidSerialNumber(String),

    #[error("Invalid sensor type: {0:?} (expected \"cc\" or \"adc\")")]
    InvalidSensorType(String),

    #[error("User name cannot be empty")]
    InvalidUserName,

    #[error("Operation cancelled")]
    Cancelled,
}

impl DirectoryError {
    /// Whether the error means the requested entity does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            DirectoryError::SensorNotFound(_)
                | DirectoryError::SerialNumberNotFound(_)
                | DirectoryError::UserNotFound(_)
        )
    }
}

/// Result type alias for directory operations
pub type DirectoryResult<T> = Result<T, DirectoryError>;
