//! Great-circle distance helpers.
//!
//! Positions are plain `(latitude, longitude)` pairs in decimal degrees.

use std::f64::consts::PI;

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

const DEG_TO_RAD: f64 = PI / 180.0;

/// Calculate the great-circle distance between two positions.
///
/// Uses the haversine formula, which stays accurate at the tens-of-meters
/// scale the tracking filter works at.
///
/// # Arguments
///
/// * `from` - First position as (latitude, longitude) in degrees
/// * `to` - Second position as (latitude, longitude) in degrees
///
/// # Returns
///
/// Distance in meters.
///
/// # Example
///
/// ```
/// use trailsync::geo::distance_meters;
///
/// // 0.0002 degrees of latitude is roughly 22 meters
/// let dist = distance_meters((40.0, -75.0), (40.0002, -75.0));
/// assert!((dist - 22.24).abs() < 0.1);
/// ```
pub fn distance_meters(from: (f64, f64), to: (f64, f64)) -> f64 {
    let (lat1, lon1) = from;
    let (lat2, lon2) = to;

    let lat1_rad = lat1 * DEG_TO_RAD;
    let lat2_rad = lat2 * DEG_TO_RAD;
    let delta_lat = (lat2 - lat1) * DEG_TO_RAD;
    let delta_lon = (lon2 - lon1) * DEG_TO_RAD;

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    // Clamp guards asin against rounding just above 1.0 for antipodal points
    let c = 2.0 * a.sqrt().min(1.0).asin();

    EARTH_RADIUS_M * c
}
