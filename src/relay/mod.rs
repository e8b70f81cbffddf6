//! Live event relay
//!
//! Pushes each sensor's newest event to WebSocket subscribers.
//!
//! # Protocol
//!
//! `GET /sensors/:sensor_id/events` upgrades to a WebSocket. The server sends
//! a text frame whenever the sensor's latest event changes:
//!
//! ```json
//! {"timestamp": "2024-01-15T10:30:00Z", "payload": 512}
//! ```
//!
//! Client messages are ignored apart from close. The server closes with
//! 1000 on shutdown or peer close, and with 1011 when reading the store or
//! writing a frame fails.

pub mod connection;
pub mod error;
pub mod handler;
pub mod live;
pub mod messages;
pub mod registry;
pub mod ws;

pub use connection::{ChannelConnection, CloseStatus, Connection, ConnectionError, Outbound};
pub use error::RelayError;
pub use handler::sensor_events_handler;
pub use live::{
    LiveRelay, RelayConfig, SubscriptionEnd, SubscriptionState, DEFAULT_SHUTDOWN_REASON,
};
pub use messages::EventFrame;
pub use registry::{ConnectionId, ConnectionRegistry};
pub use ws::WsConnection;
