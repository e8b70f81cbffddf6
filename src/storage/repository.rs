//! Event store contract
//!
//! Both the in-memory store and the SQLite store implement
//! [`EventRepository`]; everything above the storage layer (ingestion, the
//! history endpoint, the live relay) only sees the trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use super::error::{StoreError, StoreResult};
use super::types::{Event, SensorId};

#[async_trait]
pub trait EventRepository: Send + Sync {
    /// Record an event, replacing any event of the same sensor with the
    /// exact same timestamp
    ///
    /// Fails with `InvalidEvent` for a zero timestamp or one outside the
    /// `i64` nanosecond range (years 1677 to 2262), and with `Cancelled`
    /// (without writing) when `cancel` fires first. Every backend accepts
    /// the same timestamps.
    async fn insert(&self, event: Event, cancel: &CancellationToken) -> StoreResult<()>;

    /// Event with the greatest timestamp for `sensor_id`
    ///
    /// Fails with `NotFound` when nothing was ever recorded for the sensor.
    async fn latest(&self, sensor_id: SensorId, cancel: &CancellationToken) -> StoreResult<Event>;

    /// All events with `from <= timestamp <= to`, in ascending order
    ///
    /// Fails with `NotFound` when nothing was ever recorded for the sensor;
    /// an empty window (including `from > to`) is an empty vec.
    async fn range(
        &self,
        sensor_id: SensorId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> StoreResult<Vec<Event>>;

    /// Short backend name for logs and health output
    fn backend_name(&self) -> &'static str;

    /// Cheap liveness check of the backend
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

/// Nanoseconds since the epoch of an event about to be inserted
pub(crate) fn insertable_nanos(event: &Event) -> StoreResult<i64> {
    if event.has_zero_timestamp() {
        return Err(StoreError::InvalidEvent("timestamp is not set".to_string()));
    }
    event.timestamp.timestamp_nanos_opt().ok_or_else(|| {
        StoreError::InvalidEvent(format!("timestamp {} out of range", event.timestamp))
    })
}
