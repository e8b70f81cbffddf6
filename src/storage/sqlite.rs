//! SQLite event store
//!
//! Durable alternative to the in-memory store. The primary key
//! `(sensor_id, timestamp_ns)` makes `INSERT OR REPLACE` the same
//! last-write-wins policy the in-memory log applies, and SQLite's B-tree on
//! that key serves `latest` and `range`.
//!
//! `rusqlite::Connection` is not `Sync`, so it lives behind a
//! `std::sync::Mutex`; readers serialize on this backend. Every call runs on
//! tokio's blocking pool so a slow disk never stalls the async workers that
//! drive HTTP requests and live subscriptions.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tokio_util::sync::CancellationToken;

use super::error::{StoreError, StoreResult};
use super::repository::{insertable_nanos, EventRepository};
use super::types::{Event, SensorId};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS events (
        sensor_id INTEGER NOT NULL,
        timestamp_ns INTEGER NOT NULL,
        serial_number TEXT NOT NULL,
        payload INTEGER NOT NULL,
        PRIMARY KEY (sensor_id, timestamp_ns)
    ) WITHOUT ROWID;
";

/// Event store backed by a SQLite database file
pub struct SqliteEventStore {
    conn: Arc<Mutex<Connection>>,
    path: Option<PathBuf>,
}

impl SqliteEventStore {
    /// Create or open the event database in `data_dir`
    pub fn open(data_dir: &Path) -> StoreResult<Self> {
        std::fs::create_dir_all(data_dir)
            .map_err(|e| StoreError::Backend(format!("Failed to create {:?}: {}", data_dir, e)))?;

        let path = data_dir.join("events.db");
        let conn = Connection::open(&path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
            ",
        )?;
        conn.execute_batch(SCHEMA)?;

        tracing::info!(path = ?path, "Opened SQLite event store");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: Some(path),
        })
    }

    /// Store that lives only as long as the process (tests, benches)
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: None,
        })
    }

    /// Database file path, if file-backed
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Run `f` against the connection on the blocking pool
    async fn with_conn<T, F>(&self, cancel: &CancellationToken, f: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> StoreResult<T> + Send + 'static,
    {
        if cancel.is_cancelled() {
            return Err(StoreError::Cancelled);
        }

        let conn = Arc::clone(&self.conn);
        let cancel = cancel.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|e| StoreError::Lock(format!("Failed to acquire connection lock: {}", e)))?;
            if cancel.is_cancelled() {
                return Err(StoreError::Cancelled);
            }
            f(&conn)
        })
        .await
        .map_err(|e| StoreError::Backend(format!("SQLite task failed: {}", e)))?
    }
}

/// Nanoseconds since the epoch, saturating outside the representable range
fn to_nanos(ts: DateTime<Utc>) -> i64 {
    match ts.timestamp_nanos_opt() {
        Some(nanos) => nanos,
        None if ts < DateTime::<Utc>::default() => i64::MIN,
        None => i64::MAX,
    }
}

fn row_to_event(row: &rusqlite::Row<'_>) -> rusqlite::Result<Event> {
    Ok(Event {
        sensor_id: row.get(0)?,
        timestamp: Utc.timestamp_nanos(row.get(1)?),
        sensor_serial_number: row.get(2)?,
        payload: row.get(3)?,
    })
}

fn sensor_exists(conn: &Connection, sensor_id: SensorId) -> StoreResult<bool> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM events WHERE sensor_id = ?)",
        params![sensor_id],
        |row| row.get(0),
    )?;
    Ok(exists)
}

#[async_trait]
impl EventRepository for SqliteEventStore {
    async fn insert(&self, event: Event, cancel: &CancellationToken) -> StoreResult<()> {
        let nanos = insertable_nanos(&event)?;

        self.with_conn(cancel, move |conn| {
            conn.prepare_cached(
                "INSERT OR REPLACE INTO events (sensor_id, timestamp_ns, serial_number, payload)
                 VALUES (?, ?, ?, ?)",
            )?
            .execute(params![
                event.sensor_id,
                nanos,
                event.sensor_serial_number,
                event.payload
            ])?;
            Ok(())
        })
        .await
    }

    async fn latest(&self, sensor_id: SensorId, cancel: &CancellationToken) -> StoreResult<Event> {
        self.with_conn(cancel, move |conn| {
            conn.prepare_cached(
                "SELECT sensor_id, timestamp_ns, serial_number, payload FROM events
                 WHERE sensor_id = ?
                 ORDER BY timestamp_ns DESC
                 LIMIT 1",
            )?
            .query_row(params![sensor_id], row_to_event)
            .optional()?
            .ok_or(StoreError::NotFound(sensor_id))
        })
        .await
    }

    async fn range(
        &self,
        sensor_id: SensorId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> StoreResult<Vec<Event>> {
        let (from, to) = (to_nanos(from), to_nanos(to));
        self.with_conn(cancel, move |conn| {
            if !sensor_exists(conn, sensor_id)? {
                return Err(StoreError::NotFound(sensor_id));
            }

            let mut stmt = conn.prepare_cached(
                "SELECT sensor_id, timestamp_ns, serial_number, payload FROM events
                 WHERE sensor_id = ? AND timestamp_ns BETWEEN ? AND ?
                 ORDER BY timestamp_ns ASC",
            )?;
            let rows = stmt.query_map(params![sensor_id, from, to], row_to_event)?;

            rows.collect::<rusqlite::Result<Vec<_>>>()
                .map_err(StoreError::from)
        })
        .await
    }

    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    async fn ping(&self) -> StoreResult<()> {
        self.with_conn(&CancellationToken::new(), |conn| {
            conn.query_row("SELECT 1", [], |_| Ok(()))?;
            Ok(())
        })
        .await
    }
}
