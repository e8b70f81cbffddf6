//! Data Transfer Objects
//!
//! Request and response types for the API endpoints.
//! These types are serialized/deserialized to/from JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::directory::{Sensor, SensorType, User};
use crate::storage::{Event, SensorId};

// ============================================
// EVENT DTOs
// ============================================

/// Reading reported by a sensor
#[derive(Debug, Deserialize)]
pub struct EventRequest {
    pub sensor_serial_number: String,
    pub payload: i64,
}

/// Stored event, echoed back on ingest
#[derive(Debug, Serialize, Deserialize)]
pub struct EventResponse {
    pub sensor_id: SensorId,
    pub payload: i64,
    pub timestamp: DateTime<Utc>,
}

impl From<Event> for EventResponse {
    fn from(event: Event) -> Self {
        Self {
            sensor_id: event.sensor_id,
            payload: event.payload,
            timestamp: event.timestamp,
        }
    }
}

// ============================================
// HISTORY DTOs
// ============================================

/// History window, both bounds in Unix seconds and inclusive
#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

/// One point of a sensor's history
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryEvent {
    /// Unix seconds
    pub timestamp: i64,
    pub payload: i64,
}

impl From<&Event> for HistoryEvent {
    fn from(event: &Event) -> Self {
        Self {
            timestamp: event.timestamp.timestamp(),
            payload: event.payload,
        }
    }
}

// ============================================
// SENSOR DTOs
// ============================================

/// Sensor registration request
#[derive(Debug, Deserialize)]
pub struct SensorToCreate {
    pub serial_number: String,
    /// "cc" or "adc"
    #[serde(rename = "type")]
    pub sensor_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

/// Sensor as exposed over HTTP
#[derive(Debug, Serialize, Deserialize)]
pub struct SensorResponse {
    pub id: SensorId,
    pub serial_number: String,
    #[serde(rename = "type")]
    pub sensor_type: SensorType,
    pub current_state: i64,
    pub description: String,
    pub is_active: bool,
    pub registered_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl From<Sensor> for SensorResponse {
    fn from(sensor: Sensor) -> Self {
        Self {
            id: sensor.id,
            serial_number: sensor.serial_number,
            sensor_type: sensor.sensor_type,
            current_state: sensor.current_state,
            description: sensor.description,
            is_active: sensor.is_active,
            registered_at: sensor.registered_at,
            last_activity: sensor.last_activity,
        }
    }
}

// ============================================
// USER DTOs
// ============================================

#[derive(Debug, Deserialize)]
pub struct UserToCreate {
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: i64,
    pub name: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
        }
    }
}

/// Body of `POST /users/:user_id/sensors`
#[derive(Debug, Deserialize)]
pub struct SensorToUserBinding {
    pub sensor_id: SensorId,
}

// ============================================
// HEALTH DTOs
// ============================================

/// Full health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Overall status: healthy, degraded, unhealthy
    pub status: String,
    /// Event store status
    pub storage: String,
    /// Event store backend name
    pub backend: String,
    /// Open live subscriptions
    pub live_connections: usize,
    /// Server uptime in seconds
    pub uptime_seconds: u64,
    /// Application version
    pub version: String,
}
