//! Client-side location tracking and update queuing.
//!
//! The [`LocationUpdateManager`] sits between a platform [`PositionSource`]
//! and a remote [`LocationSink`]:
//!
//! ```text
//! PositionSource ──► accuracy filter ──► distance filter ──► PendingQueue ──► LocationSink
//!   (subscription)    (subscription       (30m from last      (FIFO, 10→5      (404 = drop,
//!                      samples only)       accepted sample)    overflow trim)   else retry)
//! ```
//!
//! # Components
//!
//! - [`sample`] - `PositionSample` and the `LocationUpdate` wire body
//! - [`source`] - `PositionSource` contract and subscription handle
//! - [`sink`] - `LocationSink` contract and `DeliveryError` classification
//! - [`queue`] - `PendingQueue` with head-of-line insert and overflow trim
//! - [`policy`] - filter and queue constants
//! - [`stats`] - delivery counters
//! - [`manager`] - `LocationUpdateManager`

pub mod manager;
pub mod policy;
pub mod queue;
pub mod sample;
pub mod sink;
pub mod source;
pub mod stats;

#[cfg(test)]
mod test_support;

pub use manager::{FlushState, LocationUpdateManager};
pub use policy::{
    TrackingPolicy, ACCURACY_THRESHOLD_METERS, MIN_DISTANCE_METERS, QUEUE_SOFT_CAP,
    QUEUE_TRIM_TO, UPDATE_INTERVAL_MS,
};
pub use queue::PendingQueue;
pub use sample::{LocationUpdate, PositionSample};
pub use sink::{DeliveryError, LocationSink, LoggingSink, STATUS_NOT_FOUND};
pub use source::{
    AccuracyHint, PositionSource, SampleCallback, SourceError, SubscriptionHandle,
    SubscriptionOptions,
};
pub use stats::{DeliveryStats, DeliveryStatsSnapshot};
