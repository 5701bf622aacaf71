//! Ring Buffer - bounded capture buffer shared by the collectors
//!
//! Fixed capacity, oldest-first, evicts the oldest entry on overflow.
//! Each buffer owns its own lock; it is only held for an O(1) push/pop or
//! for the copy made by [`RingBuffer::snapshot`].

use std::collections::VecDeque;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// ============================================================================
// RING BUFFER
// ============================================================================

pub struct RingBuffer<T> {
    capacity: usize,
    items: Mutex<VecDeque<T>>,
    evicted: AtomicU64,
}

impl<T: Clone> RingBuffer<T> {
    pub fn new(capacity: NonZeroUsize) -> Self {
        let capacity = capacity.get();
        Self {
            capacity,
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            evicted: AtomicU64::new(0),
        }
    }

    /// Build from a plain size, rejecting zero
    pub fn try_new(capacity: usize) -> Result<Self, ConfigError> {
        NonZeroUsize::new(capacity)
            .map(Self::new)
            .ok_or_else(|| ConfigError::Invalid {
                field: "capacity",
                value: capacity.to_string(),
                hint: "ring buffer capacity must be at least 1",
            })
    }

    /// Append an item, evicting the oldest one if the buffer is full
    pub fn append(&self, item: T) {
        let dropped = {
            let mut items = self.items.lock();
            items.push_back(item);
            if items.len() > self.capacity {
                items.pop_front()
            } else {
                None
            }
        };

        // Run the evicted value's destructor outside the lock
        if dropped.is_some() {
            self.evicted.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Independent copy of the contents, oldest first
    pub fn snapshot(&self) -> Vec<T> {
        self.items.lock().iter().cloned().collect()
    }

    pub fn clear(&self) {
        self.items.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of entries evicted since construction
    pub fn evicted(&self) -> u64 {
        self.evicted.load(Ordering::Relaxed)
    }

    pub fn status(&self) -> BufferStatus {
        let current_size = self.len();
        BufferStatus {
            current_size,
            capacity: self.capacity,
            evicted: self.evicted(),
            fill_percent: (current_size as f32 / self.capacity as f32 * 100.0).min(100.0),
        }
    }
}

/// Buffer status information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BufferStatus {
    pub current_size: usize,
    pub capacity: usize,
    pub evicted: u64,
    pub fill_percent: f32,
}
