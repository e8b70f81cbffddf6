//! Frames pushed to subscribers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::storage::Event;

/// Body of every text frame: `{"timestamp": "<RFC 3339>", "payload": <i64>}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventFrame {
    pub timestamp: DateTime<Utc>,
    pub payload: i64,
}

impl From<&Event> for EventFrame {
    fn from(event: &Event) -> Self {
        Self {
            timestamp: event.timestamp,
            payload: event.payload,
        }
    }
}
