//! Per-sensor ordered log
//!
//! A sorted `Vec<Event>` keyed by timestamp. Producers usually report
//! monotonically increasing timestamps, so the common insert is an append.
//!
//! # Performance
//! - Insert: O(log n) search, O(1) append / O(n) for out-of-order inserts
//! - Latest: O(1)
//! - Range: O(log n + k) where k = results

use chrono::{DateTime, Utc};

use super::types::Event;

/// Ordered index of one sensor's events, unique per timestamp
#[derive(Debug, Default, Clone)]
pub struct SensorLog {
    events: Vec<Event>,
}

impl SensorLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an event, replacing any event with the exact same timestamp
    pub fn put(&mut self, event: Event) {
        match self
            .events
            .binary_search_by(|probe| probe.timestamp.cmp(&event.timestamp))
        {
            Ok(idx) => self.events[idx] = event,
            Err(idx) => self.events.insert(idx, event),
        }
    }

    /// Event with the greatest timestamp
    pub fn latest(&self) -> Option<&Event> {
        self.events.last()
    }

    /// Events with `from <= timestamp <= to`, ascending
    ///
    /// Empty when `from > to`.
    pub fn range(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> &[Event] {
        let lb = self.events.partition_point(|e| e.timestamp < from);

        let (rb, found) = match self.events.binary_search_by(|e| e.timestamp.cmp(&to)) {
            Ok(idx) => (idx, true),
            Err(idx) => (idx, false),
        };

        // rb itself is only part of the window when it is an exact hit
        let mut size = rb as isize - lb as isize;
        if found {
            size += 1;
        }

        if size <= 0 {
            return &[];
        }

        &self.events[lb..lb + size as usize]
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
