//! Live subscriptions
//!
//! One task per connection polls the store for the sensor's latest event and
//! pushes it whenever it differs from the last one pushed.
//!
//! ```text
//! Connecting ──authorize + register──▶ Streaming ──▶ Closing ──▶ Closed
//! ```
//!
//! A subscription leaves `Streaming` exactly once: when the peer closes, when
//! the store fails, when a write fails, or when the relay shuts down.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::connection::{CloseStatus, Connection, ConnectionError};
use super::error::RelayError;
use super::messages::EventFrame;
use super::registry::{ConnectionId, ConnectionRegistry};
use crate::directory::{Sensor, SensorDirectory};
use crate::storage::{Event, EventRepository, SensorId, StoreError};

/// Close reason sent to every subscriber on shutdown
pub const DEFAULT_SHUTDOWN_REASON: &str = "server shutting down";

#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Delay between two polls of the store
    pub poll_interval: Duration,
    pub max_connections: usize,
    pub shutdown_reason: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            max_connections: 1000,
            shutdown_reason: DEFAULT_SHUTDOWN_REASON.to_string(),
        }
    }
}

/// Lifecycle of one subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    Connecting,
    Streaming,
    Closing,
    Closed,
}

impl std::fmt::Display for SubscriptionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SubscriptionState::Connecting => "connecting",
            SubscriptionState::Streaming => "streaming",
            SubscriptionState::Closing => "closing",
            SubscriptionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Why a subscription stopped streaming
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionEnd {
    PeerClosed,
    Shutdown,
    StoreFailed(StoreError),
    WriteFailed(ConnectionError),
}

impl SubscriptionEnd {
    pub fn status(&self) -> CloseStatus {
        match self {
            SubscriptionEnd::PeerClosed | SubscriptionEnd::Shutdown => CloseStatus::Normal,
            SubscriptionEnd::StoreFailed(_) | SubscriptionEnd::WriteFailed(_) => {
                CloseStatus::InternalError
            }
        }
    }
}

/// Streams each sensor's newest event to its subscribers
pub struct LiveRelay {
    store: Arc<dyn EventRepository>,
    sensors: Arc<dyn SensorDirectory>,
    registry: Arc<ConnectionRegistry>,
    config: RelayConfig,
    shutdown: CancellationToken,
}

impl LiveRelay {
    pub fn new(
        store: Arc<dyn EventRepository>,
        sensors: Arc<dyn SensorDirectory>,
        config: RelayConfig,
    ) -> Self {
        Self {
            store,
            sensors,
            registry: Arc::new(ConnectionRegistry::new(config.max_connections)),
            config,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Number of connections currently streaming
    pub async fn connection_count(&self) -> usize {
        self.registry.len().await
    }

    /// Check the sensor exists before any connection is opened for it
    pub async fn authorize(
        &self,
        sensor_id: SensorId,
        cancel: &CancellationToken,
    ) -> Result<Sensor, RelayError> {
        let sensor = self.sensors.get_by_id(sensor_id, cancel).await?;
        tracing::debug!(sensor_id, state = %SubscriptionState::Connecting, "Subscription authorized");
        Ok(sensor)
    }

    /// Register `conn` and start streaming `sensor_id` to it
    ///
    /// The returned handle resolves with the reason the subscription stopped
    /// streaming.
    pub async fn attach(
        &self,
        sensor_id: SensorId,
        conn: Arc<dyn Connection>,
    ) -> Result<JoinHandle<SubscriptionEnd>, RelayError> {
        let connection_id = match self.registry.register(Arc::clone(&conn)).await {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!(sensor_id, error = %e, "Rejecting subscription");
                let _ = conn.close(CloseStatus::InternalError, &e.to_string()).await;
                return Err(e);
            }
        };

        // Registered after shutdown took its snapshot
        if self.shutdown.is_cancelled() {
            if self.registry.remove(&connection_id).await {
                let _ = conn
                    .close(CloseStatus::Normal, &self.config.shutdown_reason)
                    .await;
            }
            return Err(RelayError::ShuttingDown);
        }

        tracing::info!(
            sensor_id,
            connection_id = %connection_id,
            state = %SubscriptionState::Streaming,
            "Subscription started"
        );

        let subscription = Subscription {
            sensor_id,
            connection_id,
            conn,
            store: Arc::clone(&self.store),
            registry: Arc::clone(&self.registry),
            poll_interval: self.config.poll_interval,
            shutdown: self.shutdown.clone(),
        };
        Ok(tokio::spawn(subscription.run()))
    }

    /// Close every registered connection with a normal closure
    ///
    /// Returns all close failures at once. Connections registering while
    /// this runs are rejected by `attach`.
    pub async fn shutdown(&self) -> Result<(), RelayError> {
        self.shutdown.cancel();

        let connections = self.registry.snapshot().await;
        tracing::info!(connections = connections.len(), "Shutting down live relay");

        let mut errors = Vec::new();
        for (connection_id, conn) in connections {
            match conn
                .close(CloseStatus::Normal, &self.config.shutdown_reason)
                .await
            {
                Ok(()) | Err(ConnectionError::Closed) => {}
                Err(e) => {
                    tracing::warn!(connection_id = %connection_id, error = %e, "Close failed");
                    errors.push(e);
                }
            }
            self.registry.remove(&connection_id).await;
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(RelayError::Aggregated(errors))
        }
    }
}

struct Subscription {
    sensor_id: SensorId,
    connection_id: ConnectionId,
    conn: Arc<dyn Connection>,
    store: Arc<dyn EventRepository>,
    registry: Arc<ConnectionRegistry>,
    poll_interval: Duration,
    shutdown: CancellationToken,
}

impl Subscription {
    async fn run(self) -> SubscriptionEnd {
        let closed = self.conn.closed();
        let mut ticker =
            tokio::time::interval_at(Instant::now() + self.poll_interval, self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_pushed: Option<Event> = None;

        let end = loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break SubscriptionEnd::Shutdown,
                _ = closed.cancelled() => break SubscriptionEnd::PeerClosed,
                _ = ticker.tick() => {
                    if let Err(end) = self.poll(&closed, &mut last_pushed).await {
                        break end;
                    }
                }
            }
        };

        tracing::debug!(
            sensor_id = self.sensor_id,
            connection_id = %self.connection_id,
            state = %SubscriptionState::Closing,
            reason = ?end,
        );

        // On shutdown the relay closes and deregisters the connection itself
        if end != SubscriptionEnd::Shutdown {
            let reason = match end {
                SubscriptionEnd::StoreFailed(ref e) => e.to_string(),
                SubscriptionEnd::WriteFailed(ref e) => e.to_string(),
                _ => String::new(),
            };
            match self.conn.close(end.status(), &reason).await {
                Ok(()) | Err(ConnectionError::Closed) => {}
                Err(e) => {
                    tracing::debug!(connection_id = %self.connection_id, error = %e, "Close failed");
                }
            }
            self.registry.remove(&self.connection_id).await;
        }

        tracing::info!(
            sensor_id = self.sensor_id,
            connection_id = %self.connection_id,
            state = %SubscriptionState::Closed,
            "Subscription ended"
        );
        end
    }

    /// One tick: push the latest event if it changed
    ///
    /// The write races the peer going away and relay shutdown, so a peer
    /// that stopped reading cannot hold the subscription open.
    async fn poll(
        &self,
        closed: &CancellationToken,
        last_pushed: &mut Option<Event>,
    ) -> Result<(), SubscriptionEnd> {
        let event = match self.store.latest(self.sensor_id, &self.shutdown).await {
            Ok(event) => event,
            // No data yet for this sensor
            Err(StoreError::NotFound(_)) => return Ok(()),
            Err(StoreError::Cancelled) if self.shutdown.is_cancelled() => {
                return Err(SubscriptionEnd::Shutdown)
            }
            Err(e) => {
                tracing::error!(sensor_id = self.sensor_id, error = %e, "Failed to read latest event");
                return Err(SubscriptionEnd::StoreFailed(e));
            }
        };

        if last_pushed.as_ref() == Some(&event) {
            return Ok(());
        }

        let frame = serde_json::to_string(&EventFrame::from(&event))
            .map_err(|e| SubscriptionEnd::WriteFailed(ConnectionError::Send(e.to_string())))?;
        let sent = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => return Err(SubscriptionEnd::Shutdown),
            _ = closed.cancelled() => return Err(SubscriptionEnd::PeerClosed),
            sent = self.conn.send(frame) => sent,
        };
        if let Err(e) = sent {
            tracing::warn!(
                connection_id = %self.connection_id,
                error = %e,
                "Failed to push event"
            );
            return Err(SubscriptionEnd::WriteFailed(e));
        }

        *last_pushed = Some(event);
        Ok(())
    }
}
