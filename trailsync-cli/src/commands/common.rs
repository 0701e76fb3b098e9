//! Common types and utilities shared across CLI commands.

use std::path::Path;
use std::sync::Arc;

use trailsync::config::{config_file_path, ConfigFile};
use trailsync::http::{HttpLocationSink, HttpSinkConfig};
use trailsync::location::LocationSink;

use crate::error::CliError;

/// Load the config file, falling back to defaults when it doesn't exist.
pub fn load_config(path: Option<&Path>) -> Result<ConfigFile, CliError> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(config_file_path);
    Ok(ConfigFile::load_from(&path)?)
}

/// Resolve sink settings from CLI args and config.
pub fn resolve_sink_config(
    cli_url: Option<String>,
    cli_token: Option<String>,
    config: &ConfigFile,
) -> Result<HttpSinkConfig, CliError> {
    // CLI takes precedence, then config
    let mut sink = match cli_url {
        Some(url) => match config.sink_config() {
            Some(from_file) => HttpSinkConfig {
                endpoint: url,
                ..from_file
            },
            None => HttpSinkConfig::new(url),
        },
        None => config.sink_config().ok_or_else(|| {
            CliError::Config(
                "No location endpoint configured. \
                 Set url in the [sink] section of config.ini, pass --url, or use --dry-run"
                    .to_string(),
            )
        })?,
    };

    if let Some(token) = cli_token {
        sink.token = Some(token);
    }
    Ok(sink)
}

/// Build the HTTP sink for resolved settings.
pub fn http_sink(config: HttpSinkConfig) -> Result<Arc<dyn LocationSink>, CliError> {
    Ok(Arc::new(HttpLocationSink::new(config)?))
}
