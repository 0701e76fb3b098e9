//! Position sample and wire update types.

use serde::{Deserialize, Serialize};

use crate::geo;

/// A single reported device position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionSample {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Horizontal accuracy radius in meters, when the source reports one.
    pub accuracy_meters: Option<f64>,
}

impl PositionSample {
    /// Create a sample without accuracy information.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            accuracy_meters: None,
        }
    }

    /// Create a sample with a reported accuracy radius.
    pub fn with_accuracy(latitude: f64, longitude: f64, accuracy_meters: f64) -> Self {
        Self {
            latitude,
            longitude,
            accuracy_meters: Some(accuracy_meters),
        }
    }

    /// Position as a `(latitude, longitude)` pair.
    #[inline]
    pub fn coords(&self) -> (f64, f64) {
        (self.latitude, self.longitude)
    }

    /// Great-circle distance to another sample in meters.
    pub fn distance_to(&self, other: &PositionSample) -> f64 {
        geo::distance_meters(self.coords(), other.coords())
    }

    /// Returns true if the reported accuracy is worse than `threshold_meters`.
    ///
    /// Samples without accuracy information are never considered inaccurate.
    pub fn is_less_accurate_than(&self, threshold_meters: f64) -> bool {
        self.accuracy_meters
            .is_some_and(|accuracy| accuracy > threshold_meters)
    }
}

/// Location update body delivered to the remote sink.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationUpdate {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: Option<f64>,
}

impl From<&PositionSample> for LocationUpdate {
    fn from(sample: &PositionSample) -> Self {
        Self {
            latitude: sample.latitude,
            longitude: sample.longitude,
            accuracy: sample.accuracy_meters,
        }
    }
}
