//! Remote sink contract.

use futures::future::{BoxFuture, FutureExt};
use thiserror::Error;

use super::sample::LocationUpdate;

/// Status code the backend returns when the tracked identity is unknown.
pub const STATUS_NOT_FOUND: u16 = 404;

/// Errors that can occur while delivering a location update.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// The sink answered with a non-success status.
    #[error("Sink rejected update with HTTP {code}")]
    Status { code: u16 },

    /// The request never produced a response (connect, timeout, TLS...).
    #[error("Transport error: {0}")]
    Transport(String),
}

impl DeliveryError {
    /// Whether retrying this update can never succeed.
    ///
    /// Only "not found" is permanent; every other failure is retried on the
    /// next flush.
    pub fn is_permanent(&self) -> bool {
        matches!(self, DeliveryError::Status { code } if *code == STATUS_NOT_FOUND)
    }

    /// The HTTP status, when the sink produced one.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            DeliveryError::Status { code } => Some(*code),
            DeliveryError::Transport(_) => None,
        }
    }
}

/// Destination for accepted location updates.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; the manager shares one sink across
/// the tasks spawned by subscription callbacks.
pub trait LocationSink: Send + Sync {
    /// Deliver a single update.
    fn send_location_update<'a>(
        &'a self,
        update: &'a LocationUpdate,
    ) -> BoxFuture<'a, Result<(), DeliveryError>>;
}

/// Sink that accepts every update and only logs it.
#[derive(Debug, Default)]
pub struct LoggingSink;

impl LocationSink for LoggingSink {
    fn send_location_update<'a>(
        &'a self,
        update: &'a LocationUpdate,
    ) -> BoxFuture<'a, Result<(), DeliveryError>> {
        tracing::info!(
            lat = update.latitude,
            lon = update.longitude,
            accuracy_m = update.accuracy,
            "Location update (dry run)"
        );
        futures::future::ready(Ok(())).boxed()
    }
}
