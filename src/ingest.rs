//! Event ingestion
//!
//! Producers only know their serial number. The ingestor resolves it to a
//! registered sensor, stores the event and refreshes the sensor's state.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::directory::{DirectoryError, SensorDirectory};
use crate::storage::{Event, EventRepository, StoreError};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IngestError {
    #[error("Event timestamp is not set")]
    MissingTimestamp,

    #[error(transparent)]
    Directory(#[from] DirectoryError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type IngestResult<T> = Result<T, IngestError>;

/// Entry point for events reported by sensors
#[derive(Clone)]
pub struct EventIngestor {
    store: Arc<dyn EventRepository>,
    sensors: Arc<dyn SensorDirectory>,
}

impl EventIngestor {
    pub fn new(store: Arc<dyn EventRepository>, sensors: Arc<dyn SensorDirectory>) -> Self {
        Self { store, sensors }
    }

    /// Record one reading for the sensor with `serial_number`
    ///
    /// The event is stored before the sensor's `current_state` and
    /// `last_activity` are updated; a failed store leaves the sensor untouched.
    pub async fn receive(
        &self,
        serial_number: &str,
        payload: i64,
        timestamp: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> IngestResult<Event> {
        if timestamp == DateTime::<Utc>::default() {
            return Err(IngestError::MissingTimestamp);
        }

        let mut sensor = self.sensors.get_by_serial_number(serial_number, cancel).await?;

        let event = Event::new(sensor.id, payload, timestamp).serial_number(serial_number);
        self.store.insert(event.clone(), cancel).await?;

        sensor.current_state = payload;
        sensor.last_activity = timestamp;
        self.sensors.save(sensor, cancel).await?;

        tracing::debug!(sensor_id = event.sensor_id, payload, "Event received");
        Ok(event)
    }
}
