//! Core data types for the sensor event store
//!
//! - `Event`: a single measurement emitted by a sensor
//! - `SensorId`: identifier a sensor's log is keyed by

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a sensor, assigned by the sensor directory
pub type SensorId = i64;

/// A single time-stamped measurement
///
/// Events are plain values. The store hands out clones, so a caller's copy
/// never aliases the store's internal state.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Event {
    /// Sensor the event belongs to
    pub sensor_id: SensorId,
    /// Serial number reported by the producer (informational)
    pub sensor_serial_number: String,
    /// Measured value
    pub payload: i64,
    /// When the measurement was taken; the Unix epoch is the "unset" value
    pub timestamp: DateTime<Utc>,
}

impl Event {
    /// Create an event for a sensor at a specific instant
    pub fn new(sensor_id: SensorId, payload: i64, timestamp: DateTime<Utc>) -> Self {
        Self {
            sensor_id,
            sensor_serial_number: String::new(),
            payload,
            timestamp,
        }
    }

    /// Create an event stamped with the current time
    pub fn now(sensor_id: SensorId, payload: i64) -> Self {
        Self::new(sensor_id, payload, Utc::now())
    }

    /// Builder method: set the serial number
    pub fn serial_number(mut self, serial_number: impl Into<String>) -> Self {
        self.sensor_serial_number = serial_number.into();
        self
    }

    /// Builder method: set the timestamp
    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// True when the timestamp was never set
    pub fn has_zero_timestamp(&self) -> bool {
        self.timestamp == DateTime::<Utc>::default()
    }
}
