//! Relay error types

use thiserror::Error;

use super::connection::ConnectionError;
use crate::directory::DirectoryError;
use crate::storage::SensorId;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    #[error("Sensor not found: {0}")]
    SensorNotFound(SensorId),

    #[error("Directory error: {0}")]
    Directory(DirectoryError),

    #[error("Too many connections")]
    TooManyConnections,

    #[error("Relay is shutting down")]
    ShuttingDown,

    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    /// Every close failure seen during shutdown
    #[error("{} connection(s) failed to close: {}", .0.len(), join(.0))]
    Aggregated(Vec<ConnectionError>),
}

impl From<DirectoryError> for RelayError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::SensorNotFound(id) => RelayError::SensorNotFound(id),
            other => RelayError::Directory(other),
        }
    }
}

fn join(errors: &[ConnectionError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_not_found_maps_to_sensor_not_found() {
        let err: RelayError = DirectoryError::SensorNotFound(3).into();
        assert_eq!(err, RelayError::SensorNotFound(3));

        let err: RelayError = DirectoryError::Cancelled.into();
        assert!(matches!(err, RelayError::Directory(_)));
    }

    #[test]
    fn test_aggregated_display() {
        let err = RelayError::Aggregated(vec![
            ConnectionError::Close("broken pipe".to_string()),
            ConnectionError::Closed,
        ]);
        assert_eq!(
            err.to_string(),
            "2 connection(s) failed to close: Failed to close connection: broken pipe; Connection is closed"
        );
    }
}
