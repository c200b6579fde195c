// src/pipeline/shuffle.rs

//! Memory-bounded record shuffling.
//!
//! Records arrive roughly in chunk order, which correlates consecutive
//! training positions (they come from the same game). The buffer breaks
//! that correlation with bounded memory: while filling it only absorbs;
//! once full, each arrival evicts a uniformly random resident. The
//! shuffle quality scales with capacity, the memory bound never moves.

use bytes::Bytes;

use crate::rng::PipelineRng;

/// Fixed-capacity random-replacement buffer.
pub struct ShuffleBuffer {
    capacity: usize,
    slots: Vec<Bytes>,
    rng: PipelineRng,
}

impl ShuffleBuffer {
    #[must_use]
    pub fn new(capacity: usize, rng: PipelineRng) -> Self {
        Self {
            capacity,
            slots: Vec::with_capacity(capacity),
            rng,
        }
    }

    /// Current occupancy.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Insert a record. Returns `None` during the filling phase; once the
    /// buffer is full, returns the evicted resident of a random slot.
    ///
    /// Every record that goes in comes out exactly once, either here or
    /// from [`extract`](Self::extract).
    pub fn insert_or_replace(&mut self, record: Bytes) -> Option<Bytes> {
        if self.slots.len() < self.capacity {
            self.slots.push(record);
            return None;
        }
        let slot = self.rng.index(self.capacity);
        Some(std::mem::replace(&mut self.slots[slot], record))
    }

    /// Remove and return a random resident, for draining after the
    /// upstream ends. `None` once empty.
    pub fn extract(&mut self) -> Option<Bytes> {
        if self.slots.is_empty() {
            return None;
        }
        let slot = self.rng.index(self.slots.len());
        Some(self.slots.swap_remove(slot))
    }
}
