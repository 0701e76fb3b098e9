//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use std::fmt;
use std::process;

use trailsync::config::ConfigFileError;
use trailsync::http::HttpSinkError;
use trailsync::replay::ReplayError;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration error
    Config(String),
    /// Failed to load the config file
    ConfigFile(ConfigFileError),
    /// Failed to load a track
    Track(ReplayError),
    /// Failed to create the HTTP sink
    Sink(HttpSinkError),
    /// Tracking could not be started
    TrackingStart,
    /// No position could be obtained
    NoPosition,
    /// Invalid command-line argument
    InvalidArgument(String),
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::TrackingStart => {
                eprintln!();
                eprintln!("Common issues:");
                eprintln!("  1. Location permission was denied");
                eprintln!("  2. The initial position fix failed");
            }
            CliError::Config(_) | CliError::ConfigFile(_) => {
                eprintln!();
                eprintln!(
                    "Config file: {}",
                    trailsync::config::config_file_path().display()
                );
            }
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::ConfigFile(e) => write!(f, "{}", e),
            CliError::Track(e) => write!(f, "{}", e),
            CliError::Sink(e) => write!(f, "{}", e),
            CliError::TrackingStart => write!(f, "Location tracking could not be started"),
            CliError::NoPosition => write!(f, "No position available"),
            CliError::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::ConfigFile(e) => Some(e),
            CliError::Track(e) => Some(e),
            CliError::Sink(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::ConfigFile(e)
    }
}

impl From<ReplayError> for CliError {
    fn from(e: ReplayError) -> Self {
        CliError::Track(e)
    }
}

impl From<HttpSinkError> for CliError {
    fn from(e: HttpSinkError) -> Self {
        CliError::Sink(e)
    }
}
