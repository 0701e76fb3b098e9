//! Ordered queue of samples awaiting delivery.
//!
//! Entries are tagged with a sequence id at insertion so a delivery that
//! completes after the queue was reshaped (head insert, overflow trim) still
//! removes exactly the entry it sent.

use std::collections::VecDeque;

use super::sample::PositionSample;

/// Identifier assigned to a queued sample.
pub type EntryId = u64;

/// A sample waiting in the pending queue.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueuedSample {
    pub id: EntryId,
    pub sample: PositionSample,
}

/// FIFO queue of undelivered samples (oldest first).
#[derive(Debug, Default)]
pub struct PendingQueue {
    entries: VecDeque<QueuedSample>,
    next_id: EntryId,
}

impl PendingQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_id(&mut self) -> EntryId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Append a sample at the tail.
    pub fn push_back(&mut self, sample: PositionSample) -> EntryId {
        let id = self.allocate_id();
        self.entries.push_back(QueuedSample { id, sample });
        id
    }

    /// Insert a sample at the head, ahead of every older entry.
    pub fn push_front(&mut self, sample: PositionSample) -> EntryId {
        let id = self.allocate_id();
        self.entries.push_front(QueuedSample { id, sample });
        id
    }

    /// Oldest entry, without removing it.
    pub fn front(&self) -> Option<QueuedSample> {
        self.entries.front().copied()
    }

    /// Remove the entry with the given id.
    ///
    /// Returns false if it is no longer queued (e.g. trimmed mid-delivery).
    pub fn remove(&mut self, id: EntryId) -> bool {
        match self.entries.iter().position(|entry| entry.id == id) {
            Some(index) => {
                self.entries.remove(index);
                true
            }
            None => false,
        }
    }

    /// Trim to the newest `keep` entries when longer than `soft_cap`.
    ///
    /// Returns the number of entries discarded.
    pub fn trim_overflow(&mut self, soft_cap: usize, keep: usize) -> usize {
        if self.entries.len() <= soft_cap {
            return 0;
        }
        let excess = self.entries.len().saturating_sub(keep);
        self.entries.drain(..excess);
        excess
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot of queued samples in delivery order.
    pub fn samples(&self) -> Vec<PositionSample> {
        self.entries.iter().map(|entry| entry.sample).collect()
    }
}
