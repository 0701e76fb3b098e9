//! Tracking filter and queue policy.

use std::time::Duration;

/// Minimum displacement from the last accepted sample to accept a new one.
pub const MIN_DISTANCE_METERS: f64 = 30.0;

/// Minimum interval between subscription callbacks.
pub const UPDATE_INTERVAL_MS: u64 = 30_000;

/// Samples reporting a worse accuracy than this are discarded.
pub const ACCURACY_THRESHOLD_METERS: f64 = 100.0;

/// Pending queue length above which a failed flush trims the queue.
pub const QUEUE_SOFT_CAP: usize = 10;

/// Number of newest entries kept when the queue is trimmed.
pub const QUEUE_TRIM_TO: usize = 5;

/// Filtering and throttling policy for a tracking session.
///
/// `TrackingPolicy::default()` is the fixed reference policy built from the
/// constants in this module.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackingPolicy {
    /// Distance filter applied to every sample after the first.
    pub min_distance_meters: f64,
    /// Subscription-level throttle.
    pub update_interval: Duration,
    /// Accuracy filter applied to subscription samples.
    pub accuracy_threshold_meters: f64,
    /// Overflow soft cap.
    pub queue_soft_cap: usize,
    /// Entries kept after an overflow trim.
    pub queue_trim_to: usize,
}

impl Default for TrackingPolicy {
    fn default() -> Self {
        Self {
            min_distance_meters: MIN_DISTANCE_METERS,
            update_interval: Duration::from_millis(UPDATE_INTERVAL_MS),
            accuracy_threshold_meters: ACCURACY_THRESHOLD_METERS,
            queue_soft_cap: QUEUE_SOFT_CAP,
            queue_trim_to: QUEUE_TRIM_TO,
        }
    }
}

impl TrackingPolicy {
    /// Set the distance filter.
    pub fn with_min_distance(mut self, meters: f64) -> Self {
        self.min_distance_meters = meters;
        self
    }

    /// Set the subscription throttle interval.
    pub fn with_update_interval(mut self, interval: Duration) -> Self {
        self.update_interval = interval;
        self
    }

    /// Set the accuracy filter.
    pub fn with_accuracy_threshold(mut self, meters: f64) -> Self {
        self.accuracy_threshold_meters = meters;
        self
    }
}
