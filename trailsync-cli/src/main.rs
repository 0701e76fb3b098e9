//! Trailsync CLI - Command-line interface
//!
//! Drives the location tracking manager from recorded tracks, and offers a
//! few helpers for inspecting configuration and distances.

mod commands;
mod error;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::config::ConfigCommands;
use commands::replay::ReplayArgs;
use error::CliError;

#[derive(Debug, Parser)]
#[command(name = "trailsync")]
#[command(version, about = "Location tracking with reliable update delivery", long_about = None)]
struct Cli {
    /// Path to the config file (default: ~/.trailsync/config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Also write logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Replay a recorded track through the tracking manager
    Replay(ReplayArgs),

    /// Print the current position of a track
    Locate {
        /// Track file (`lat,lon[,accuracy]` per line)
        track: PathBuf,
    },

    /// Print the great-circle distance between two positions
    #[command(allow_negative_numbers = true)]
    Distance {
        /// First latitude in decimal degrees
        lat1: f64,
        /// First longitude in decimal degrees
        lon1: f64,
        /// Second latitude in decimal degrees
        lat2: f64,
        /// Second longitude in decimal degrees
        lon2: f64,
    },

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        e.exit();
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let _logging = trailsync::logging::init_logging(cli.log_file.as_deref())
        .map_err(|e| CliError::LoggingInit(e.to_string()))?;

    match cli.command {
        Commands::Replay(args) => {
            let config = commands::common::load_config(cli.config.as_deref())?;
            commands::replay::run(args, &config).await
        }
        Commands::Locate { track } => commands::locate::run(&track).await,
        Commands::Distance {
            lat1,
            lon1,
            lat2,
            lon2,
        } => commands::distance::run((lat1, lon1), (lat2, lon2)),
        Commands::Config { command } => commands::config::run(command, cli.config.as_deref()),
    }
}
