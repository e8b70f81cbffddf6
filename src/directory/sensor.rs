//! Sensor directory
//!
//! Authority on which sensors exist. The live relay asks it before opening a
//! subscription and event ingestion resolves serial numbers through it.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use super::error::{DirectoryError, DirectoryResult};
use super::ids::IdAllocator;
use crate::cancel;
use crate::storage::SensorId;

/// Length of a sensor serial number, in digits
pub const SERIAL_NUMBER_LENGTH: usize = 10;

/// Kind of physical sensor
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SensorType {
    /// Contact closure (open / closed)
    Cc,
    /// Analog-to-digital converter reading
    Adc,
}

impl FromStr for SensorType {
    type Err = DirectoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cc" => Ok(SensorType::Cc),
            "adc" => Ok(SensorType::Adc),
            other => Err(DirectoryError::InvalidSensorType(other.to_string())),
        }
    }
}

impl std::fmt::Display for SensorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SensorType::Cc => write!(f, "cc"),
            SensorType::Adc => write!(f, "adc"),
        }
    }
}

/// Registered sensor and its most recent state
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Sensor {
    /// Assigned on registration
    pub id: SensorId,
    pub serial_number: String,
    pub sensor_type: SensorType,
    /// Payload of the last ingested event
    pub current_state: i64,
    #[serde(default)]
    pub description: String,
    pub is_active: bool,
    pub registered_at: DateTime<Utc>,
    /// Timestamp of the last ingested event
    pub last_activity: DateTime<Utc>,
}

impl Sensor {
    /// New, unregistered sensor
    pub fn new(serial_number: impl Into<String>, sensor_type: SensorType) -> Self {
        Self {
            id: 0, // Will be assigned by the directory
            serial_number: serial_number.into(),
            sensor_type,
            current_state: 0,
            description: String::new(),
            is_active: true,
            registered_at: DateTime::<Utc>::default(),
            last_activity: DateTime::<Utc>::default(),
        }
    }

    /// Builder: set description
    pub fn description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    /// Builder: set active flag
    pub fn active(mut self, is_active: bool) -> Self {
        self.is_active = is_active;
        self
    }
}

fn serial_number_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(&format!(r"^\d{{{}}}$", SERIAL_NUMBER_LENGTH)).expect("static pattern compiles")
    })
}

/// Check a serial number is exactly ten ASCII digits
pub fn validate_serial_number(serial_number: &str) -> DirectoryResult<()> {
    if serial_number_pattern().is_match(serial_number) {
        Ok(())
    } else {
        Err(DirectoryError::InvalidSerialNumber(serial_number.to_string()))
    }
}

/// Lookup and registration of sensors
#[async_trait]
pub trait SensorDirectory: Send + Sync {
    /// Register a sensor, or return the existing one with the same serial number
    async fn register(&self, sensor: Sensor, cancel: &CancellationToken) -> DirectoryResult<Sensor>;

    /// All registered sensors, ordered by id
    async fn list(&self, cancel: &CancellationToken) -> DirectoryResult<Vec<Sensor>>;

    async fn get_by_id(&self, id: SensorId, cancel: &CancellationToken) -> DirectoryResult<Sensor>;

    async fn get_by_serial_number(
        &self,
        serial_number: &str,
        cancel: &CancellationToken,
    ) -> DirectoryResult<Sensor>;

    /// Overwrite the stored state of an already registered sensor
    async fn save(&self, sensor: Sensor, cancel: &CancellationToken) -> DirectoryResult<()>;
}

#[derive(Default)]
struct DirectoryState {
    sensors: HashMap<SensorId, Sensor>,
    serial_to_id: HashMap<String, SensorId>,
}

/// Sensor directory held in process memory
pub struct InMemorySensorDirectory {
    state: RwLock<DirectoryState>,
    ids: Arc<dyn IdAllocator>,
}

impl InMemorySensorDirectory {
    pub fn new(ids: Arc<dyn IdAllocator>) -> Self {
        Self {
            state: RwLock::new(DirectoryState::default()),
            ids,
        }
    }

    /// Number of registered sensors
    pub async fn len(&self) -> usize {
        self.state.read().await.sensors.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl SensorDirectory for InMemorySensorDirectory {
    async fn register(&self, mut sensor: Sensor, cancel: &CancellationToken) -> DirectoryResult<Sensor> {
        validate_serial_number(&sensor.serial_number)?;

        let mut state = cancel::race(cancel, self.state.write())
            .await
            .ok_or(DirectoryError::Cancelled)?;

        if let Some(id) = state.serial_to_id.get(&sensor.serial_number) {
            if let Some(existing) = state.sensors.get(id) {
                return Ok(existing.clone());
            }
        }

        sensor.id = self.ids.next_id();
        sensor.registered_at = Utc::now();
        state
            .serial_to_id
            .insert(sensor.serial_number.clone(), sensor.id);
        state.sensors.insert(sensor.id, sensor.clone());

        tracing::info!(
            sensor_id = sensor.id,
            serial_number = %sensor.serial_number,
            sensor_type = %sensor.sensor_type,
            "Registered sensor"
        );
        Ok(sensor)
    }

    async fn list(&self, cancel: &CancellationToken) -> DirectoryResult<Vec<Sensor>> {
        let state = cancel::race(cancel, self.state.read())
            .await
            .ok_or(DirectoryError::Cancelled)?;

        let mut sensors: Vec<Sensor> = state.sensors.values().cloned().collect();
        sensors.sort_by_key(|s| s.id);
        Ok(sensors)
    }

    async fn get_by_id(&self, id: SensorId, cancel: &CancellationToken) -> DirectoryResult<Sensor> {
        let state = cancel::race(cancel, self.state.read())
            .await
            .ok_or(DirectoryError::Cancelled)?;

        state
            .sensors
            .get(&id)
            .cloned()
            .ok_or(DirectoryError::SensorNotFound(id))
    }

    async fn get_by_serial_number(
        &self,
        serial_number: &str,
        cancel: &CancellationToken,
    ) -> DirectoryResult<Sensor> {
        let state = cancel::race(cancel, self.state.read())
            .await
            .ok_or(DirectoryError::Cancelled)?;

        state
            .serial_to_id
            .get(serial_number)
            .and_then(|id| state.sensors.get(id))
            .cloned()
            .ok_or_else(|| DirectoryError::SerialNumberNotFound(serial_number.to_string()))
    }

    async fn save(&self, sensor: Sensor, cancel: &CancellationToken) -> DirectoryResult<()> {
        let mut state = cancel::race(cancel, self.state.write())
            .await
            .ok_or(DirectoryError::Cancelled)?;

        match state.sensors.get_mut(&sensor.id) {
            Some(slot) => {
                *slot = sensor;
                Ok(())
            }
            None => Err(DirectoryError::SensorNotFound(sensor.id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::AtomicIdAllocator;

    fn directory() -> InMemorySensorDirectory {
        InMemorySensorDirectory::new(Arc::new(AtomicIdAllocator::new()))
    }

    #[test]
    fn test_sensor_type_parse() {
        assert_eq!("cc".parse::<SensorType>().unwrap(), SensorType::Cc);
        assert_eq!("adc".parse::<SensorType>().unwrap(), SensorType::Adc);
        assert!(matches!(
            "ADC".parse::<SensorType>(),
            Err(DirectoryError::InvalidSensorType(_))
        ));
        assert_eq!(SensorType::Adc.to_string(), "adc");
    }

    #[test]
    fn test_validate_serial_number() {
        assert!(validate_serial_number("0123456789").is_ok());
        assert!(validate_serial_number("012345678").is_err());
        assert!(validate_serial_number("01234567890").is_err());
        assert!(validate_serial_number("01234abcde").is_err());
        assert!(validate_serial_number("").is_err());
    }

    #[tokio::test]
    async fn test_register_assigns_ids() {
        let dir = directory();
        let token = CancellationToken::new();

        let a = dir
            .register(Sensor::new("0000000001", SensorType::Cc), &token)
            .await
            .unwrap();
        let b = dir
            .register(Sensor::new("0000000002", SensorType::Adc), &token)
            .await
            .unwrap();

        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);
        assert!(!a.registered_at.eq(&DateTime::<Utc>::default()));
        assert_eq!(dir.len().await, 2);
    }

    #[tokio::test]
    async fn test_register_existing_serial_returns_existing() {
        let dir = directory();
        let token = CancellationToken::new();

        let first = dir
            .register(Sensor::new("0000000001", SensorType::Cc).description("door"), &token)
            .await
            .unwrap();
        let again = dir
            .register(Sensor::new("0000000001", SensorType::Adc), &token)
            .await
            .unwrap();

        assert_eq!(first, again);
        assert_eq!(dir.len().await, 1);
    }

    #[tokio::test]
    async fn test_register_rejects_bad_serial() {
        let dir = directory();
        let err = dir
            .register(Sensor::new("123", SensorType::Cc), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DirectoryError::InvalidSerialNumber(_)));
        assert!(dir.is_empty().await);
    }

    #[tokio::test]
    async fn test_lookups() {
        let dir = directory();
        let token = CancellationToken::new();
        let sensor = dir
            .register(Sensor::new("1234567890", SensorType::Adc), &token)
            .await
            .unwrap();

        assert_eq!(dir.get_by_id(sensor.id, &token).await.unwrap(), sensor);
        assert_eq!(
            dir.get_by_serial_number("1234567890", &token).await.unwrap(),
            sensor
        );
        assert_eq!(
            dir.get_by_id(99, &token).await.unwrap_err(),
            DirectoryError::SensorNotFound(99)
        );
        assert!(dir
            .get_by_serial_number("0000000000", &token)
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[tokio::test]
    async fn test_save_updates_state() {
        let dir = directory();
        let token = CancellationToken::new();
        let mut sensor = dir
            .register(Sensor::new("1234567890", SensorType::Adc), &token)
            .await
            .unwrap();

        sensor.current_state = 17;
        dir.save(sensor.clone(), &token).await.unwrap();
        assert_eq!(dir.get_by_id(sensor.id, &token).await.unwrap().current_state, 17);

        let unknown = Sensor::new("0000000009", SensorType::Cc);
        assert!(dir.save(unknown, &token).await.is_err());
    }

    #[tokio::test]
    async fn test_cancelled_lookup() {
        let dir = directory();
        let token = CancellationToken::new();
        token.cancel();
        assert_eq!(
            dir.get_by_id(1, &token).await.unwrap_err(),
            DirectoryError::Cancelled
        );
    }

    #[tokio::test]
    async fn test_list_sorted_by_id() {
        let dir = directory();
        let token = CancellationToken::new();
        for serial in ["0000000003", "0000000001", "0000000002"] {
            dir.register(Sensor::new(serial, SensorType::Cc), &token)
                .await
                .unwrap();
        }

        let ids: Vec<SensorId> = dir.list(&token).await.unwrap().iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }
}
