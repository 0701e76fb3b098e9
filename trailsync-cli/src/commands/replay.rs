//! `trailsync replay` - run a recorded track through the tracking manager.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use trailsync::config::ConfigFile;
use trailsync::location::{FlushState, LocationSink, LocationUpdateManager, LoggingSink};
use trailsync::replay::ReplayPositionSource;

use super::common::{http_sink, resolve_sink_config};
use crate::error::CliError;

/// Upper bound on waiting for the last delivery after the track ends.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Arguments for `trailsync replay`.
#[derive(Debug, Args)]
pub struct ReplayArgs {
    /// Track file (`lat,lon[,accuracy]` per line)
    pub track: PathBuf,

    /// Location endpoint URL (overrides [sink] url)
    #[arg(long)]
    pub url: Option<String>,

    /// Bearer token (overrides [sink] token)
    #[arg(long)]
    pub token: Option<String>,

    /// Milliseconds between replayed samples (overrides [tracking] update_interval_ms)
    #[arg(long)]
    pub interval_ms: Option<u64>,

    /// Log updates instead of sending them
    #[arg(long)]
    pub dry_run: bool,
}

/// Run the replay command.
pub async fn run(args: ReplayArgs, config: &ConfigFile) -> Result<(), CliError> {
    let mut policy = config.tracking_policy();
    if let Some(ms) = args.interval_ms {
        policy = policy.with_update_interval(Duration::from_millis(ms));
    }

    let source = Arc::new(ReplayPositionSource::from_file(&args.track)?);

    let sink: Arc<dyn LocationSink> = if args.dry_run {
        Arc::new(LoggingSink)
    } else {
        http_sink(resolve_sink_config(args.url, args.token, config)?)?
    };

    println!(
        "Replaying {} samples from {} ({} ms apart)",
        source.len(),
        args.track.display(),
        policy.update_interval.as_millis()
    );

    let manager = LocationUpdateManager::with_policy(source.clone(), sink, policy);
    if !manager.start_tracking().await {
        return Err(CliError::TrackingStart);
    }

    tokio::select! {
        _ = source.wait_finished() => {}
        _ = tokio::signal::ctrl_c() => {
            println!("Interrupted, stopping");
        }
    }

    manager.stop_tracking().await;
    wait_for_drain(&manager).await;

    println!();
    println!("Replay complete");
    println!("  {}", manager.stats());
    if manager.queue_size() > 0 {
        println!("  {} update(s) still pending", manager.queue_size());
    }

    Ok(())
}

/// Wait for the running flush, if any, to finish.
async fn wait_for_drain(manager: &LocationUpdateManager) {
    let drained = tokio::time::timeout(DRAIN_TIMEOUT, async {
        loop {
            // Gives a delivery spawned by the last sample a chance to start
            tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
            if manager.flush_state() == FlushState::Idle {
                break;
            }
        }
    })
    .await;

    if drained.is_err() {
        tracing::warn!(
            pending = manager.queue_size(),
            "Timed out waiting for delivery to finish"
        );
    }
}
