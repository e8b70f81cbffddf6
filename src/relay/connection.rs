//! Outbound connection abstraction
//!
//! The relay only needs to push text frames, close with a status, and learn
//! when the peer went away. [`WsConnection`](super::ws::WsConnection) does
//! this over a WebSocket; [`ChannelConnection`] does it over an mpsc channel.

use std::sync::Mutex;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Close status sent to the peer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseStatus {
    /// 1000
    Normal,
    /// 1011
    InternalError,
}

impl CloseStatus {
    pub fn code(&self) -> u16 {
        match self {
            CloseStatus::Normal => 1000,
            CloseStatus::InternalError => 1011,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("Connection is closed")]
    Closed,

    #[error("Failed to send frame: {0}")]
    Send(String),

    #[error("Failed to close connection: {0}")]
    Close(String),
}

#[async_trait]
pub trait Connection: Send + Sync {
    /// Push one text frame
    async fn send(&self, text: String) -> Result<(), ConnectionError>;

    /// Close with `status` and a human-readable reason
    ///
    /// Only the first call does anything; later calls return `Closed`.
    async fn close(&self, status: CloseStatus, reason: &str) -> Result<(), ConnectionError>;

    /// Token cancelled once the connection is closed from either side
    fn closed(&self) -> CancellationToken;

    fn is_closed(&self) -> bool {
        self.closed().is_cancelled()
    }
}

/// What a [`ChannelConnection`] delivers to its receiver
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Text(String),
    Close { status: CloseStatus, reason: String },
}

/// Connection whose frames go to an in-process channel
pub struct ChannelConnection {
    tx: Mutex<Option<mpsc::UnboundedSender<Outbound>>>,
    closed: CancellationToken,
}

impl ChannelConnection {
    /// Connection plus the receiving end standing in for the peer
    pub fn pair() -> (Self, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = Self {
            tx: Mutex::new(Some(tx)),
            closed: CancellationToken::new(),
        };
        (conn, rx)
    }

    /// Simulate the peer going away
    pub fn disconnect(&self) {
        self.closed.cancel();
    }

    fn sender(&self) -> Result<mpsc::UnboundedSender<Outbound>, ConnectionError> {
        let guard = self
            .tx
            .lock()
            .map_err(|e| ConnectionError::Send(e.to_string()))?;
        guard.clone().ok_or(ConnectionError::Closed)
    }
}

#[async_trait]
impl Connection for ChannelConnection {
    async fn send(&self, text: String) -> Result<(), ConnectionError> {
        if self.closed.is_cancelled() {
            return Err(ConnectionError::Closed);
        }
        self.sender()?
            .send(Outbound::Text(text))
            .map_err(|_| ConnectionError::Send("receiver dropped".to_string()))
    }

    async fn close(&self, status: CloseStatus, reason: &str) -> Result<(), ConnectionError> {
        let tx = self
            .tx
            .lock()
            .map_err(|e| ConnectionError::Close(e.to_string()))?
            .take();
        let was_open = !self.closed.is_cancelled();
        self.closed.cancel();

        match tx {
            Some(tx) if was_open => tx
                .send(Outbound::Close {
                    status,
                    reason: reason.to_string(),
                })
                .map_err(|_| ConnectionError::Close("receiver dropped".to_string())),
            _ => Err(ConnectionError::Closed),
        }
    }

    fn closed(&self) -> CancellationToken {
        self.closed.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_and_close() {
        let (conn, mut rx) = ChannelConnection::pair();

        conn.send("hello".to_string()).await.unwrap();
        conn.close(CloseStatus::Normal, "bye").await.unwrap();

        assert_eq!(rx.recv().await, Some(Outbound::Text("hello".to_string())));
        assert_eq!(
            rx.recv().await,
            Some(Outbound::Close {
                status: CloseStatus::Normal,
                reason: "bye".to_string()
            })
        );
        assert!(conn.is_closed());
    }

    #[tokio::test]
    async fn test_operations_after_close() {
        let (conn, _rx) = ChannelConnection::pair();
        conn.close(CloseStatus::Normal, "").await.unwrap();

        assert_eq!(
            conn.send("late".to_string()).await.unwrap_err(),
            ConnectionError::Closed
        );
        assert_eq!(
            conn.close(CloseStatus::Normal, "").await.unwrap_err(),
            ConnectionError::Closed
        );
    }

    #[tokio::test]
    async fn test_disconnect_marks_closed() {
        let (conn, _rx) = ChannelConnection::pair();
        let closed = conn.closed();

        conn.disconnect();
        closed.cancelled().await;
        assert_eq!(
            conn.send("x".to_string()).await.unwrap_err(),
            ConnectionError::Closed
        );
    }

    #[tokio::test]
    async fn test_send_to_dropped_receiver() {
        let (conn, rx) = ChannelConnection::pair();
        drop(rx);

        assert!(matches!(
            conn.send("x".to_string()).await,
            Err(ConnectionError::Send(_))
        ));
    }

    #[test]
    fn test_close_codes() {
        assert_eq!(CloseStatus::Normal.code(), 1000);
        assert_eq!(CloseStatus::InternalError.code(), 1011);
    }
}
