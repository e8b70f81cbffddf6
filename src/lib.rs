//! # Sensorlog
//!
//! Sensor event log: per-sensor, time-ordered event storage with inclusive
//! range queries and live WebSocket updates of each sensor's latest event.
//!
//! ## Features
//!
//! - **Per-sensor logs**: events kept sorted by timestamp, one lock per sensor
//! - **Range queries**: inclusive `[from, to]` windows by binary search
//! - **Live updates**: one polling task per WebSocket subscriber, closed
//!   together on shutdown
//! - **Backends**: in-memory or SQLite behind the same trait
//!
//! ## Modules
//!
//! - [`storage`]: Event store trait and its backends
//! - [`directory`]: Sensors, users and identifier allocation
//! - [`ingest`]: Serial number resolution for incoming events
//! - [`relay`]: Live subscriptions and their connection registry
//! - [`api`]: REST API server with Axum
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sensorlog::storage::*;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = MemoryEventStore::new();
//!     let cancel = CancellationToken::new();
//!
//!     store.insert(Event::now(1, 512), &cancel).await?;
//!
//!     let latest = store.latest(1, &cancel).await?;
//!     println!("Sensor 1 last reported {}", latest.payload);
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod cancel;
pub mod config;
pub mod directory;
pub mod ingest;
pub mod relay;
pub mod storage;

// Re-export top-level types for convenience
pub use storage::{
    Event, EventRepository, MemoryEventStore, SensorId, SensorLog, SqliteEventStore, StoreError,
    StoreResult,
};

pub use directory::{
    AtomicIdAllocator, DirectoryError, IdAllocator, InMemorySensorDirectory, Sensor,
    SensorDirectory, SensorType, User, UserDirectory, UserId,
};

pub use ingest::{EventIngestor, IngestError};

pub use relay::{
    CloseStatus, Connection, ConnectionError, ConnectionRegistry, LiveRelay, RelayConfig,
    RelayError, SubscriptionEnd,
};

pub use api::{build_router, serve, ApiConfig, ApiError, AppState};

pub use config::{Config, ConfigError, LoggingConfig, StorageBackend};
