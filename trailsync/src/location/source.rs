//! Position source contract.
//!
//! A position source wraps the platform location API: permission state, a
//! one-shot fix, and a continuous subscription. The trait is dyn-compatible
//! (boxed futures) so the manager can hold an `Arc<dyn PositionSource>`.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use super::sample::PositionSample;

/// Errors reported by a position source.
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    /// Location services are disabled or unavailable on the device.
    #[error("Location unavailable: {0}")]
    Unavailable(String),

    /// The source could not produce a fix in time.
    #[error("Timed out waiting for a position fix")]
    Timeout,

    /// The subscription could not be established.
    #[error("Failed to subscribe to position updates: {0}")]
    Subscription(String),
}

/// Desired accuracy for a one-shot position request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccuracyHint {
    /// Coarse, battery-friendly fix.
    Low,
    /// Platform default.
    #[default]
    Balanced,
    /// Best available fix.
    High,
}

/// Throttling options for a subscription.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubscriptionOptions {
    /// Minimum displacement between callbacks.
    pub min_distance_meters: f64,
    /// Minimum time between callbacks.
    pub min_interval: Duration,
}

/// Callback invoked by the source for every new sample.
pub type SampleCallback = Arc<dyn Fn(PositionSample) + Send + Sync>;

/// Handle to a live subscription.
///
/// Canceling (or dropping) the handle tells the source to stop invoking
/// the callback.
#[derive(Debug)]
pub struct SubscriptionHandle {
    token: CancellationToken,
}

impl SubscriptionHandle {
    /// Create a handle together with the token the source should observe.
    pub fn new() -> (Self, CancellationToken) {
        let token = CancellationToken::new();
        (
            Self {
                token: token.clone(),
            },
            token,
        )
    }

    /// Stop the subscription.
    pub fn cancel(self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Platform location API as seen by the tracking manager.
pub trait PositionSource: Send + Sync {
    /// Whether foreground location permission is currently granted.
    fn has_foreground_permission(&self) -> BoxFuture<'_, bool>;

    /// Prompt for foreground permission. Returns whether it was granted.
    fn request_foreground_permission(&self) -> BoxFuture<'_, bool>;

    /// Prompt for background permission. Returns whether it was granted.
    fn request_background_permission(&self) -> BoxFuture<'_, bool>;

    /// Obtain a single position fix.
    fn get_current_position(
        &self,
        accuracy: AccuracyHint,
    ) -> BoxFuture<'_, Result<PositionSample, SourceError>>;

    /// Start delivering samples to `on_sample` until the handle is canceled.
    fn subscribe(
        &self,
        options: SubscriptionOptions,
        on_sample: SampleCallback,
    ) -> Result<SubscriptionHandle, SourceError>;
}
