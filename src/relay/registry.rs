//! Registry of live connections

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use uuid::Uuid;

use super::connection::Connection;
use super::error::RelayError;

/// Unique identifier for a relay connection
pub type ConnectionId = String;

/// Concurrent set of open connections
///
/// The lock guards the map only. It is never held while talking to a
/// connection.
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<ConnectionId, Arc<dyn Connection>>>,
    max_connections: usize,
}

impl ConnectionRegistry {
    pub fn new(max_connections: usize) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            max_connections,
        }
    }

    /// Track a connection, failing when the limit is reached
    pub async fn register(&self, conn: Arc<dyn Connection>) -> Result<ConnectionId, RelayError> {
        let mut connections = self.connections.write().await;
        if connections.len() >= self.max_connections {
            return Err(RelayError::TooManyConnections);
        }

        let id = Uuid::new_v4().to_string();
        connections.insert(id.clone(), conn);
        Ok(id)
    }

    /// Stop tracking a connection; returns whether it was still tracked
    pub async fn remove(&self, id: &str) -> bool {
        self.connections.write().await.remove(id).is_some()
    }

    /// Connections registered right now
    pub async fn snapshot(&self) -> Vec<(ConnectionId, Arc<dyn Connection>)> {
        self.connections
            .read()
            .await
            .iter()
            .map(|(id, conn)| (id.clone(), Arc::clone(conn)))
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.connections.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
