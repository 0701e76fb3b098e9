//! `trailsync distance` - great-circle distance between two positions.

use trailsync::geo::distance_meters;
use trailsync::location::MIN_DISTANCE_METERS;

use crate::error::CliError;

/// Run the distance command.
pub fn run(from: (f64, f64), to: (f64, f64)) -> Result<(), CliError> {
    validate(from)?;
    validate(to)?;

    let meters = distance_meters(from, to);
    let verdict = if meters >= MIN_DISTANCE_METERS {
        "would be accepted"
    } else {
        "would be skipped"
    };

    println!("{} ({})", format_distance(meters), verdict);
    Ok(())
}

fn validate((lat, lon): (f64, f64)) -> Result<(), CliError> {
    if !(-90.0..=90.0).contains(&lat) {
        return Err(CliError::InvalidArgument(format!(
            "latitude {} out of range [-90, 90]",
            lat
        )));
    }
    if !(-180.0..=180.0).contains(&lon) {
        return Err(CliError::InvalidArgument(format!(
            "longitude {} out of range [-180, 180]",
            lon
        )));
    }
    Ok(())
}

fn format_distance(meters: f64) -> String {
    if meters >= 1000.0 {
        format!("{:.2} km", meters / 1000.0)
    } else {
        format!("{:.1} m", meters)
    }
}
