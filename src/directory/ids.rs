//! Identifier allocation
//!
//! Directories receive their allocator at construction instead of sharing a
//! process-wide counter, so two directories (or two tests) never interfere.

use std::sync::atomic::{AtomicI64, Ordering};

/// Source of fresh, never-repeating identifiers
pub trait IdAllocator: Send + Sync {
    fn next_id(&self) -> i64;
}

/// Monotonic counter
#[derive(Debug)]
pub struct AtomicIdAllocator {
    next: AtomicI64,
}

impl AtomicIdAllocator {
    /// Counter whose first identifier is 1
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    pub fn starting_at(first: i64) -> Self {
        Self {
            next: AtomicI64::new(first),
        }
    }
}

impl Default for AtomicIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdAllocator for AtomicIdAllocator {
    fn next_id(&self) -> i64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}
