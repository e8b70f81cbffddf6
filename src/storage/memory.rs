//! In-memory event store
//!
//! Two levels of locking:
//! - the sensor map, write-locked only when a sensor records its first event
//! - one `RwLock` per sensor log, write-locked only by `insert`
//!
//! The map lock is always released before a log lock is taken, so readers of
//! one sensor never wait on writers of another.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use super::error::{StoreError, StoreResult};
use super::log::SensorLog;
use super::repository::{insertable_nanos, EventRepository};
use super::types::{Event, SensorId};
use crate::cancel;

type LogHandle = Arc<RwLock<SensorLog>>;

/// Event store holding every sensor's log in process memory
#[derive(Default)]
pub struct MemoryEventStore {
    logs: RwLock<HashMap<SensorId, LogHandle>>,
}

/// Point-in-time counters for the store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryStoreStats {
    pub sensors: usize,
    pub events: usize,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Existing log for a sensor
    async fn lookup(&self, sensor_id: SensorId, cancel: &CancellationToken) -> StoreResult<LogHandle> {
        let logs = cancel::race(cancel, self.logs.read())
            .await
            .ok_or(StoreError::Cancelled)?;
        logs.get(&sensor_id)
            .cloned()
            .ok_or(StoreError::NotFound(sensor_id))
    }

    /// Log for a sensor, created on first use
    async fn lookup_or_create(
        &self,
        sensor_id: SensorId,
        cancel: &CancellationToken,
    ) -> StoreResult<LogHandle> {
        match self.lookup(sensor_id, cancel).await {
            Err(StoreError::NotFound(_)) => {}
            other => return other,
        }

        let mut logs = cancel::race(cancel, self.logs.write())
            .await
            .ok_or(StoreError::Cancelled)?;
        // Another writer may have created it between the two locks
        let log = logs.entry(sensor_id).or_insert_with(|| {
            tracing::debug!(sensor_id, "Creating sensor log");
            LogHandle::default()
        });
        Ok(Arc::clone(log))
    }

    /// Number of sensors with a log and total number of stored events
    pub async fn stats(&self) -> MemoryStoreStats {
        let handles: Vec<LogHandle> = self.logs.read().await.values().cloned().collect();

        let mut stats = MemoryStoreStats {
            sensors: handles.len(),
            events: 0,
        };
        for handle in handles {
            stats.events += handle.read().await.len();
        }
        stats
    }
}

#[async_trait]
impl EventRepository for MemoryEventStore {
    async fn insert(&self, event: Event, cancel: &CancellationToken) -> StoreResult<()> {
        insertable_nanos(&event)?;

        let handle = self.lookup_or_create(event.sensor_id, cancel).await?;
        let mut log = cancel::race(cancel, handle.write())
            .await
            .ok_or(StoreError::Cancelled)?;

        if cancel.is_cancelled() {
            return Err(StoreError::Cancelled);
        }
        log.put(event);
        Ok(())
    }

    async fn latest(&self, sensor_id: SensorId, cancel: &CancellationToken) -> StoreResult<Event> {
        let handle = self.lookup(sensor_id, cancel).await?;
        let log = cancel::race(cancel, handle.read())
            .await
            .ok_or(StoreError::Cancelled)?;

        log.latest().cloned().ok_or(StoreError::NotFound(sensor_id))
    }

    async fn range(
        &self,
        sensor_id: SensorId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> StoreResult<Vec<Event>> {
        let handle = self.lookup(sensor_id, cancel).await?;
        let log = cancel::race(cancel, handle.read())
            .await
            .ok_or(StoreError::Cancelled)?;

        Ok(log.range(from, to).to_vec())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use std::time::Duration as StdDuration;

    const SENSOR: SensorId = 12345;

    fn t(millis: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Duration::milliseconds(millis)
    }

    async fn store_with_ten() -> (MemoryEventStore, Vec<Event>) {
        let store = MemoryEventStore::new();
        let token = CancellationToken::new();
        let mut events = Vec::new();
        for i in 0..10 {
            let event = Event::new(SENSOR, i, t(i * 10));
            store.insert(event.clone(), &token).await.unwrap();
            events.push(event);
        }
        (store, events)
    }

    #[tokio::test]
    async fn test_insert_rejects_zero_timestamp() {
        let store = MemoryEventStore::new();
        let err = store
            .insert(Event::default(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidEvent(_)));
        assert_eq!(store.stats().await.sensors, 0);
    }

    #[tokio::test]
    async fn test_insert_rejects_unrepresentable_timestamp() {
        let store = MemoryEventStore::new();
        let far = Utc.with_ymd_and_hms(2300, 1, 1, 0, 0, 0).unwrap();

        let err = store
            .insert(Event::new(SENSOR, 1, far), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidEvent(_)));
        assert_eq!(store.stats().await.events, 0);
    }

    #[tokio::test]
    async fn test_insert_cancelled_does_not_write() {
        let store = MemoryEventStore::new();
        let token = CancellationToken::new();
        token.cancel();

        let err = store.insert(Event::new(SENSOR, 1, t(0)), &token).await.unwrap_err();
        assert_eq!(err, StoreError::Cancelled);

        let err = store.latest(SENSOR, &CancellationToken::new()).await.unwrap_err();
        assert_eq!(err, StoreError::NotFound(SENSOR));
    }

    #[tokio::test]
    async fn test_insert_deadline_exceeded() {
        let store = MemoryEventStore::new();
        let token = cancel::with_timeout(StdDuration::from_millis(1));
        tokio::time::sleep(StdDuration::from_millis(20)).await;

        let err = store.insert(Event::new(SENSOR, 1, t(0)), &token).await.unwrap_err();
        assert_eq!(err, StoreError::Cancelled);
    }

    #[tokio::test]
    async fn test_save_and_get_one() {
        let store = MemoryEventStore::new();
        let token = CancellationToken::new();
        let event = Event::new(SENSOR, 0, t(0)).serial_number("1234567890");

        store.insert(event.clone(), &token).await.unwrap();
        let latest = store.latest(SENSOR, &token).await.unwrap();
        assert_eq!(latest, event);
    }

    #[tokio::test]
    async fn test_latest_is_max_timestamp() {
        let store = MemoryEventStore::new();
        let token = CancellationToken::new();

        for ms in [30, 10, 50, 20, 40] {
            store.insert(Event::new(SENSOR, ms, t(ms)), &token).await.unwrap();
        }
        // Another sensor must not leak into this one's log
        for ms in 100..110 {
            store.insert(Event::new(54321, ms, t(ms)), &token).await.unwrap();
        }

        let latest = store.latest(SENSOR, &token).await.unwrap();
        assert_eq!(latest.timestamp, t(50));
        assert_eq!(latest.payload, 50);
    }

    #[tokio::test]
    async fn test_equal_timestamps_last_write_wins() {
        let store = MemoryEventStore::new();
        let token = CancellationToken::new();

        store.insert(Event::new(SENSOR, 1, t(5)), &token).await.unwrap();
        store.insert(Event::new(SENSOR, 2, t(5)), &token).await.unwrap();

        let all = store.range(SENSOR, t(0), t(10), &token).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].payload, 2);
        assert_eq!(store.stats().await.events, 1);
    }

    #[tokio::test]
    async fn test_latest_not_found() {
        let store = MemoryEventStore::new();
        let err = store.latest(234, &CancellationToken::new()).await.unwrap_err();
        assert_eq!(err, StoreError::NotFound(234));
    }

    #[tokio::test]
    async fn test_latest_cancelled() {
        let store = MemoryEventStore::new();
        let err = store
            .latest(0, &cancel::with_timeout(StdDuration::ZERO))
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::Cancelled);
    }

    #[tokio::test]
    async fn test_range_not_found() {
        let store = MemoryEventStore::new();
        let err = store
            .range(456, t(0), t(10), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::NotFound(456));
    }

    #[tokio::test]
    async fn test_range_cancelled() {
        let (store, _) = store_with_ten().await;
        let token = CancellationToken::new();
        token.cancel();

        let err = store.range(SENSOR, t(0), t(100), &token).await.unwrap_err();
        assert_eq!(err, StoreError::Cancelled);
    }

    #[tokio::test]
    async fn test_range_windows() {
        let (store, events) = store_with_ten().await;
        let token = CancellationToken::new();
        let eps = Duration::milliseconds(5);

        let all = store.range(SENSOR, t(-1000), t(1000), &token).await.unwrap();
        assert_eq!(all, events);

        let bounds = store.range(SENSOR, t(10), t(50), &token).await.unwrap();
        assert_eq!(bounds, events[1..=5].to_vec());

        let inner = store.range(SENSOR, t(10) + eps, t(50) - eps, &token).await.unwrap();
        assert_eq!(inner, events[2..=4].to_vec());

        let single = store.range(SENSOR, t(80), t(80), &token).await.unwrap();
        assert_eq!(single, vec![events[8].clone()]);

        let after = store.range(SENSOR, t(200), t(300), &token).await.unwrap();
        assert!(after.is_empty());

        let inverted = store.range(SENSOR, t(90), t(0), &token).await.unwrap();
        assert!(inverted.is_empty());
    }

    #[tokio::test]
    async fn test_returned_events_are_copies() {
        let (store, _) = store_with_ten().await;
        let token = CancellationToken::new();

        let mut first = store.range(SENSOR, t(0), t(0), &token).await.unwrap();
        first[0].payload = 999;

        let again = store.range(SENSOR, t(0), t(0), &token).await.unwrap();
        assert_eq!(again[0].payload, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_inserts_no_lost_update() {
        let store = Arc::new(MemoryEventStore::new());
        let mut handles = Vec::new();

        // Interleave early and late timestamps across tasks
        for i in 0..1000i64 {
            let store = Arc::clone(&store);
            let ms = if i % 2 == 0 { i } else { 1999 - i };
            handles.push(tokio::spawn(async move {
                store
                    .insert(Event::new(SENSOR, ms, t(ms)), &CancellationToken::new())
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let token = CancellationToken::new();
        let latest = store.latest(SENSOR, &token).await.unwrap();
        assert_eq!(latest.timestamp, t(1998));
        assert_eq!(store.stats().await.events, 1000);

        let all = store.range(SENSOR, t(0), t(2000), &token).await.unwrap();
        assert!(all.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_insert_creates_one_log() {
        let store = Arc::new(MemoryEventStore::new());
        let mut handles = Vec::new();
        for i in 0..64i64 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .insert(Event::new(7, i, t(i)), &CancellationToken::new())
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let stats = store.stats().await;
        assert_eq!(stats, MemoryStoreStats { sensors: 1, events: 64 });
    }
}
