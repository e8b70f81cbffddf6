//! Sensorlog Event Store
//!
//! This module provides the per-sensor time-ordered event storage:
//!
//! - **types**: Core data structures (Event, SensorId)
//! - **log**: Ordered per-sensor log with the inclusive range search
//! - **repository**: The `EventRepository` contract shared by all backends
//! - **memory**: In-memory store, sharded by sensor
//! - **sqlite**: SQLite-backed store
//! - **error**: Error types
//!
//! # Architecture
//!
//! ```text
//! Write Path:
//!   Event → validate → sensor map (read, or write on first event) → sensor log (write)
//!
//! Read Path:
//!   latest/range → sensor map (read) → sensor log (read) → cloned events
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use sensorlog::storage::{Event, EventRepository, MemoryEventStore};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = MemoryEventStore::new();
//!     let cancel = CancellationToken::new();
//!
//!     store.insert(Event::now(1, 42), &cancel).await?;
//!
//!     let latest = store.latest(1, &cancel).await?;
//!     let history = store
//!         .range(1, latest.timestamp - chrono::Duration::hours(1), latest.timestamp, &cancel)
//!         .await?;
//!
//!     println!("{} events in the last hour", history.len());
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod log;
pub mod memory;
pub mod repository;
pub mod sqlite;
pub mod types;

// Re-export commonly used types
pub use error::{StoreError, StoreResult};
pub use log::SensorLog;
pub use memory::{MemoryEventStore, MemoryStoreStats};
pub use repository::EventRepository;
pub use sqlite::SqliteEventStore;
pub use types::{Event, SensorId};
