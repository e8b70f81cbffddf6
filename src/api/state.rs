//! Application State
//!
//! Shared state accessible by all API handlers.
//! Wrapped in Arc for thread-safe sharing across async tasks.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::cancel::Deadline;
use crate::directory::{AtomicIdAllocator, InMemorySensorDirectory, SensorDirectory, UserDirectory};
use crate::ingest::EventIngestor;
use crate::relay::{LiveRelay, RelayConfig};
use crate::storage::EventRepository;

/// Shared application state for all handlers
#[derive(Clone)]
pub struct AppState {
    /// Event store
    pub store: Arc<dyn EventRepository>,
    /// Registered sensors
    pub sensors: Arc<dyn SensorDirectory>,
    /// Users and their sensors
    pub users: Arc<UserDirectory>,
    /// Resolves serial numbers and records incoming events
    pub ingestor: EventIngestor,
    /// Live subscriptions
    pub relay: Arc<LiveRelay>,
    /// API configuration
    pub config: Arc<ApiConfig>,
    /// Server start time for uptime tracking
    pub start_time: Instant,
}

impl AppState {
    /// Wire in-memory directories around `store`
    pub fn new(store: Arc<dyn EventRepository>, config: ApiConfig, relay_config: RelayConfig) -> Self {
        let sensors: Arc<dyn SensorDirectory> =
            Arc::new(InMemorySensorDirectory::new(Arc::new(AtomicIdAllocator::new())));
        let users = Arc::new(UserDirectory::new(
            Arc::clone(&sensors),
            Arc::new(AtomicIdAllocator::new()),
        ));
        Self::with_directories(store, sensors, users, config, relay_config)
    }

    /// Build state from existing directories
    pub fn with_directories(
        store: Arc<dyn EventRepository>,
        sensors: Arc<dyn SensorDirectory>,
        users: Arc<UserDirectory>,
        config: ApiConfig,
        relay_config: RelayConfig,
    ) -> Self {
        let ingestor = EventIngestor::new(Arc::clone(&store), Arc::clone(&sensors));
        let relay = Arc::new(LiveRelay::new(
            Arc::clone(&store),
            Arc::clone(&sensors),
            relay_config,
        ));

        Self {
            store,
            sensors,
            users,
            ingestor,
            relay,
            config: Arc::new(config),
            start_time: Instant::now(),
        }
    }

    /// Get server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Deadline for one request's store and directory calls
    pub fn deadline(&self) -> Deadline {
        Deadline::after(Duration::from_millis(self.config.request_timeout_ms))
    }
}

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Request timeout in milliseconds
    pub request_timeout_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            request_timeout_ms: 30_000,
        }
    }
}

impl ApiConfig {
    /// Create config with custom host and port
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// Get the socket address string
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
