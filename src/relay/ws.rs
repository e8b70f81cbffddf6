//! WebSocket transport for the relay

use std::borrow::Cow;
use std::fmt::Display;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::connection::{CloseStatus, Connection, ConnectionError};

/// Longest wait for the close frame to reach a peer that stopped reading
pub const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

type FrameSink = Pin<Box<dyn Sink<Message, Error = ConnectionError> + Send>>;

/// Server side of an upgraded WebSocket
///
/// A reader task drains incoming messages. Client messages are ignored;
/// a close frame, a read error or the end of the stream cancels `closed`.
///
/// Writes hold the sink lock. A pending write gives it up as soon as
/// `closed` fires, and `close` fires `closed` before taking the lock, so a
/// peer that stopped reading never blocks `close`.
pub struct WsConnection {
    sink: Mutex<Option<FrameSink>>,
    closed: CancellationToken,
    reader: JoinHandle<()>,
}

impl WsConnection {
    pub fn new(socket: WebSocket) -> Arc<Self> {
        let (sink, stream) = socket.split();
        Self::from_parts(sink, stream)
    }

    /// Build from the outgoing and incoming halves of a message transport
    pub fn from_parts<S, R, E>(sink: S, stream: R) -> Arc<Self>
    where
        S: Sink<Message> + Send + 'static,
        S::Error: Display,
        R: Stream<Item = Result<Message, E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        let sink: FrameSink = Box::pin(sink.sink_map_err(|e| ConnectionError::Send(e.to_string())));
        let closed = CancellationToken::new();

        let token = closed.clone();
        let reader = tokio::spawn(async move {
            let mut stream = std::pin::pin!(stream);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    msg = stream.next() => match msg {
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            tracing::debug!(error = %e, "WebSocket receive error");
                            break;
                        }
                    },
                }
            }
            token.cancel();
        });

        Arc::new(Self {
            sink: Mutex::new(Some(sink)),
            closed,
            reader,
        })
    }
}

impl Drop for WsConnection {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

#[async_trait]
impl Connection for WsConnection {
    async fn send(&self, text: String) -> Result<(), ConnectionError> {
        if self.closed.is_cancelled() {
            return Err(ConnectionError::Closed);
        }

        tokio::select! {
            biased;
            _ = self.closed.cancelled() => Err(ConnectionError::Closed),
            sent = async {
                let mut guard = self.sink.lock().await;
                match guard.as_mut() {
                    Some(sink) => sink.send(Message::Text(text)).await,
                    None => Err(ConnectionError::Closed),
                }
            } => sent,
        }
    }

    async fn close(&self, status: CloseStatus, reason: &str) -> Result<(), ConnectionError> {
        self.closed.cancel();
        let mut sink = self
            .sink
            .lock()
            .await
            .take()
            .ok_or(ConnectionError::Closed)?;

        let frame = CloseFrame {
            code: status.code(),
            reason: Cow::Owned(reason.to_string()),
        };
        let delivered = tokio::time::timeout(CLOSE_TIMEOUT, async {
            match sink.send(Message::Close(Some(frame))).await {
                Ok(()) => {
                    let _ = sink.close().await;
                    Ok(())
                }
                Err(e) => Err(e),
            }
        })
        .await;

        match delivered {
            Ok(Ok(())) => Ok(()),
            Ok(Err(ConnectionError::Send(e))) => Err(ConnectionError::Close(e)),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(ConnectionError::Close(format!(
                "peer did not accept the close frame within {:?}",
                CLOSE_TIMEOUT
            ))),
        }
    }

    fn closed(&self) -> CancellationToken {
        self.closed.clone()
    }
}
