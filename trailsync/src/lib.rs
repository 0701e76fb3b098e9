//! Trailsync - Location tracking with reliable update delivery
//!
//! This library tracks a device's position, filters out noise, and delivers
//! meaningful movement to a remote endpoint. Updates that cannot be delivered
//! are queued and retried on the next flush.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use trailsync::http::{HttpLocationSink, HttpSinkConfig};
//! use trailsync::location::LocationUpdateManager;
//! use trailsync::replay::ReplayPositionSource;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let source = Arc::new(ReplayPositionSource::from_file(Path::new("walk.csv"))?);
//! let sink = Arc::new(HttpLocationSink::new(
//!     HttpSinkConfig::new("https://api.example.com/location").with_token("token"),
//! )?);
//!
//! let manager = LocationUpdateManager::new(source.clone(), sink);
//! if manager.start_tracking().await {
//!     source.wait_finished().await;
//!     manager.stop_tracking().await;
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod geo;
pub mod http;
pub mod location;
pub mod logging;
pub mod replay;

pub use location::LocationUpdateManager;
