//! Replayed position source.
//!
//! Plays back a recorded track as if it were the device location API. Used
//! to drive the tracking manager from the CLI and in integration tests.
//!
//! # Track Format
//!
//! One sample per line, `latitude,longitude[,accuracy_meters]`. Blank lines
//! and lines starting with `#` are ignored.
//!
//! ```text
//! # morning walk
//! 40.0000,-75.0000,8
//! 40.0004,-75.0000,12
//! 40.0008,-75.0001
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use parking_lot::Mutex;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::location::{
    AccuracyHint, PositionSample, PositionSource, SampleCallback, SourceError,
    SubscriptionHandle, SubscriptionOptions,
};

/// Errors loading a track.
#[derive(Debug, Error)]
pub enum ReplayError {
    /// Failed to read the track file.
    #[error("Failed to read track {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A line could not be parsed.
    #[error("Invalid track line {line}: {reason}")]
    Parse { line: usize, reason: String },

    /// The track contains no samples.
    #[error("Track contains no samples")]
    Empty,
}

/// Parse track text into samples.
pub fn parse_track(text: &str) -> Result<Vec<PositionSample>, ReplayError> {
    let mut samples = Vec::new();

    for (index, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        samples.push(parse_line(line).map_err(|reason| ReplayError::Parse {
            line: index + 1,
            reason,
        })?);
    }

    if samples.is_empty() {
        return Err(ReplayError::Empty);
    }
    Ok(samples)
}

fn parse_line(line: &str) -> Result<PositionSample, String> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    if !(2..=3).contains(&fields.len()) {
        return Err(format!("expected 2 or 3 fields, found {}", fields.len()));
    }

    let number = |name: &str, value: &str| {
        value
            .parse::<f64>()
            .map_err(|_| format!("{} '{}' is not a number", name, value))
    };

    let latitude = number("latitude", fields[0])?;
    let longitude = number("longitude", fields[1])?;
    if !(-90.0..=90.0).contains(&latitude) {
        return Err(format!("latitude {} out of range", latitude));
    }
    if !(-180.0..=180.0).contains(&longitude) {
        return Err(format!("longitude {} out of range", longitude));
    }

    match fields.get(2) {
        Some(value) if !value.is_empty() => {
            let accuracy = number("accuracy", value)?;
            Ok(PositionSample::with_accuracy(latitude, longitude, accuracy))
        }
        _ => Ok(PositionSample::new(latitude, longitude)),
    }
}

/// Position source that replays a fixed list of samples.
///
/// `get_current_position` returns the sample under the replay cursor. A
/// subscription emits the samples after the cursor, one per
/// `min_interval`, skipping samples closer than `min_distance_meters` to the
/// last one emitted, the way a platform location API throttles callbacks.
pub struct ReplayPositionSource {
    samples: Arc<Vec<PositionSample>>,
    cursor: Arc<AtomicUsize>,
    foreground_granted: AtomicBool,
    background_granted: AtomicBool,
    finished: Mutex<CancellationToken>,
}

impl ReplayPositionSource {
    /// Create a source over in-memory samples with permissions granted.
    pub fn new(samples: Vec<PositionSample>) -> Self {
        Self {
            samples: Arc::new(samples),
            cursor: Arc::new(AtomicUsize::new(0)),
            foreground_granted: AtomicBool::new(true),
            background_granted: AtomicBool::new(true),
            finished: Mutex::new(CancellationToken::new()),
        }
    }

    /// Load a track file.
    pub fn from_file(path: &Path) -> Result<Self, ReplayError> {
        let text = std::fs::read_to_string(path).map_err(|source| ReplayError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::new(parse_track(&text)?))
    }

    /// Override the permission answers.
    pub fn with_permissions(self, foreground: bool, background: bool) -> Self {
        self.foreground_granted.store(foreground, Ordering::SeqCst);
        self.background_granted.store(background, Ordering::SeqCst);
        self
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Index of the sample currently reported as the device position.
    pub fn cursor(&self) -> usize {
        self.cursor.load(Ordering::SeqCst)
    }

    /// Resolves once the latest subscription has ended, either by
    /// emitting the rest of the track or by being canceled.
    ///
    /// Each subscription gets its own completion signal; call this after
    /// subscribing.
    pub async fn wait_finished(&self) {
        let finished = self.finished.lock().clone();
        finished.cancelled().await;
    }
}

impl PositionSource for ReplayPositionSource {
    fn has_foreground_permission(&self) -> BoxFuture<'_, bool> {
        futures::future::ready(self.foreground_granted.load(Ordering::SeqCst)).boxed()
    }

    fn request_foreground_permission(&self) -> BoxFuture<'_, bool> {
        self.has_foreground_permission()
    }

    fn request_background_permission(&self) -> BoxFuture<'_, bool> {
        futures::future::ready(self.background_granted.load(Ordering::SeqCst)).boxed()
    }

    fn get_current_position(
        &self,
        _accuracy: AccuracyHint,
    ) -> BoxFuture<'_, Result<PositionSample, SourceError>> {
        let index = self.cursor().min(self.samples.len().saturating_sub(1));
        let result = self
            .samples
            .get(index)
            .copied()
            .ok_or_else(|| SourceError::Unavailable("track is empty".to_string()));
        futures::future::ready(result).boxed()
    }

    fn subscribe(
        &self,
        options: SubscriptionOptions,
        on_sample: SampleCallback,
    ) -> Result<SubscriptionHandle, SourceError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| SourceError::Subscription(e.to_string()))?;

        let (handle, token) = SubscriptionHandle::new();
        let samples = Arc::clone(&self.samples);
        let cursor = Arc::clone(&self.cursor);
        let finished = CancellationToken::new();
        *self.finished.lock() = finished.clone();

        runtime.spawn(async move {
            let start = cursor.load(Ordering::SeqCst);
            let mut last_emitted = samples.get(start).copied();

            for index in (start + 1)..samples.len() {
                tokio::select! {
                    _ = token.cancelled() => {
                        tracing::debug!(index, "Replay subscription canceled");
                        finished.cancel();
                        return;
                    }
                    _ = tokio::time::sleep(options.min_interval) => {}
                }

                let sample = samples[index];
                cursor.store(index, Ordering::SeqCst);

                let far_enough = last_emitted.map_or(true, |last| {
                    last.distance_to(&sample) >= options.min_distance_meters
                });
                if far_enough {
                    last_emitted = Some(sample);
                    on_sample(sample);
                }
            }

            tracing::debug!(samples = samples.len(), "Replay track finished");
            finished.cancel();
        });

        Ok(handle)
    }
}
