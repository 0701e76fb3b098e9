//! Lock-free delivery counters.
//!
//! All operations use `Relaxed` ordering; counters are independent
//! measurements and never drive manager behavior.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters updated by the tracking manager.
#[derive(Debug, Default)]
pub struct DeliveryStats {
    accepted: AtomicU64,
    rejected_distance: AtomicU64,
    rejected_accuracy: AtomicU64,
    delivered: AtomicU64,
    discarded: AtomicU64,
    transient_failures: AtomicU64,
    trimmed: AtomicU64,
}

impl DeliveryStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn sample_accepted(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn rejected_by_distance(&self) {
        self.rejected_distance.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn rejected_by_accuracy(&self) {
        self.rejected_accuracy.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn update_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn update_discarded(&self) {
        self.discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn transient_failure(&self) {
        self.transient_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn entries_trimmed(&self, count: usize) {
        self.trimmed.fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Take a point-in-time copy for display.
    pub fn snapshot(&self) -> DeliveryStatsSnapshot {
        DeliveryStatsSnapshot {
            accepted: self.accepted.load(Ordering::Relaxed),
            rejected_distance: self.rejected_distance.load(Ordering::Relaxed),
            rejected_accuracy: self.rejected_accuracy.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            transient_failures: self.transient_failures.load(Ordering::Relaxed),
            trimmed: self.trimmed.load(Ordering::Relaxed),
        }
    }
}

/// Immutable copy of [`DeliveryStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryStatsSnapshot {
    /// Samples that passed both filters (or were force-sent).
    pub accepted: u64,
    /// Samples dropped by the distance filter.
    pub rejected_distance: u64,
    /// Samples dropped by the accuracy filter.
    pub rejected_accuracy: u64,
    /// Updates confirmed by the sink.
    pub delivered: u64,
    /// Updates dropped after a permanent failure.
    pub discarded: u64,
    /// Flushes halted by a transient failure.
    pub transient_failures: u64,
    /// Entries dropped by the overflow trim.
    pub trimmed: u64,
}

impl fmt::Display for DeliveryStatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "accepted {}, delivered {}, discarded {}, transient failures {}, trimmed {}, \
             rejected (distance {}, accuracy {})",
            self.accepted,
            self.delivered,
            self.discarded,
            self.transient_failures,
            self.trimmed,
            self.rejected_distance,
            self.rejected_accuracy
        )
    }
}
