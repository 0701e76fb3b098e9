//! `trailsync locate` - one-shot position fix.

use std::path::Path;
use std::sync::Arc;

use trailsync::location::{LocationUpdateManager, LoggingSink, PositionSample};
use trailsync::replay::ReplayPositionSource;

use crate::error::CliError;

/// Run the locate command.
pub async fn run(track: &Path) -> Result<(), CliError> {
    let source = Arc::new(ReplayPositionSource::from_file(track)?);
    let manager = LocationUpdateManager::new(source, Arc::new(LoggingSink));

    let sample = manager
        .get_current_location()
        .await
        .ok_or(CliError::NoPosition)?;

    println!("{}", describe(&sample));
    Ok(())
}

fn describe(sample: &PositionSample) -> String {
    match sample.accuracy_meters {
        Some(accuracy) => format!(
            "{:.6}, {:.6} (±{:.0} m)",
            sample.latitude, sample.longitude, accuracy
        ),
        None => format!("{:.6}, {:.6}", sample.latitude, sample.longitude),
    }
}
