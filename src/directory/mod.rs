//! Sensor and user directories
//!
//! The collaborators the event store and relay lean on: sensor existence and
//! metadata, users, sensor ownership, and identifier allocation.

pub mod error;
pub mod ids;
pub mod sensor;
pub mod user;

pub use error::{DirectoryError, DirectoryResult};
pub use ids::{AtomicIdAllocator, IdAllocator};
pub use sensor::{
    validate_serial_number, InMemorySensorDirectory, Sensor, SensorDirectory, SensorType,
    SERIAL_NUMBER_LENGTH,
};
pub use user::{User, UserDirectory, UserId};
