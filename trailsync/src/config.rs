//! Configuration file handling for ~/.trailsync/config.ini.
//!
//! A missing file yields defaults; the tracking defaults are the reference
//! policy constants.
//!
//! ```ini
//! [sink]
//! url = https://api.example.com/v1/users/me/location
//! token = eyJhbGciOi...
//! timeout_secs = 10
//!
//! [tracking]
//! min_distance_meters = 30
//! update_interval_ms = 30000
//! accuracy_threshold_meters = 100
//! ```

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use ini::Ini;
use thiserror::Error;

use crate::http::{HttpSinkConfig, DEFAULT_REQUEST_TIMEOUT};
use crate::location::{
    TrackingPolicy, ACCURACY_THRESHOLD_METERS, MIN_DISTANCE_METERS, UPDATE_INTERVAL_MS,
};

const SECTION_SINK: &str = "sink";
const SECTION_TRACKING: &str = "tracking";

/// Configuration file errors.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] ini::Error),

    /// Failed to write config file
    #[error("Failed to write config file: {0}")]
    WriteError(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },

    /// Failed to create config directory
    #[error("Failed to create config directory: {0}")]
    DirectoryError(std::io::Error),
}

/// `[sink]` settings.
#[derive(Debug, Clone, PartialEq)]
pub struct SinkSettings {
    /// Location endpoint URL. Unset means no remote delivery is configured.
    pub url: Option<String>,
    /// Bearer token obtained from the identity provider.
    pub token: Option<String>,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for SinkSettings {
    fn default() -> Self {
        Self {
            url: None,
            token: None,
            timeout_secs: DEFAULT_REQUEST_TIMEOUT.as_secs(),
        }
    }
}

/// `[tracking]` settings.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackingSettings {
    pub min_distance_meters: f64,
    pub update_interval_ms: u64,
    pub accuracy_threshold_meters: f64,
}

impl Default for TrackingSettings {
    fn default() -> Self {
        Self {
            min_distance_meters: MIN_DISTANCE_METERS,
            update_interval_ms: UPDATE_INTERVAL_MS,
            accuracy_threshold_meters: ACCURACY_THRESHOLD_METERS,
        }
    }
}

/// Parsed configuration file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigFile {
    pub sink: SinkSettings,
    pub tracking: TrackingSettings,
}

impl ConfigFile {
    /// Load configuration from the default path (~/.trailsync/config.ini).
    pub fn load() -> Result<Self, ConfigFileError> {
        Self::load_from(&config_file_path())
    }

    /// Load configuration from a specific path.
    ///
    /// If the file doesn't exist, returns defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path)?;
        parse_ini(&ini)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigFileError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigFileError::DirectoryError)?;
        }

        std::fs::write(path, self.to_config_string())
            .map_err(|e| ConfigFileError::WriteError(e.to_string()))
    }

    /// Render as INI text.
    pub fn to_config_string(&self) -> String {
        let mut ini = Ini::new();

        {
            let mut section = ini.with_section(Some(SECTION_SINK));
            if let Some(url) = &self.sink.url {
                section.set("url", url.as_str());
            }
            if let Some(token) = &self.sink.token {
                section.set("token", token.as_str());
            }
            section.set("timeout_secs", self.sink.timeout_secs.to_string());
        }

        ini.with_section(Some(SECTION_TRACKING))
            .set(
                "min_distance_meters",
                self.tracking.min_distance_meters.to_string(),
            )
            .set(
                "update_interval_ms",
                self.tracking.update_interval_ms.to_string(),
            )
            .set(
                "accuracy_threshold_meters",
                self.tracking.accuracy_threshold_meters.to_string(),
            );

        let mut buffer = Vec::new();
        // Writing into a Vec cannot fail
        let _ = ini.write_to(&mut buffer);
        String::from_utf8_lossy(&buffer).into_owned()
    }

    /// Tracking policy described by the `[tracking]` section.
    pub fn tracking_policy(&self) -> TrackingPolicy {
        TrackingPolicy::default()
            .with_min_distance(self.tracking.min_distance_meters)
            .with_update_interval(Duration::from_millis(self.tracking.update_interval_ms))
            .with_accuracy_threshold(self.tracking.accuracy_threshold_meters)
    }

    /// HTTP sink configuration, if a sink URL is configured.
    pub fn sink_config(&self) -> Option<HttpSinkConfig> {
        let url = self.sink.url.as_ref()?;
        let mut config = HttpSinkConfig::new(url.clone())
            .with_timeout(Duration::from_secs(self.sink.timeout_secs));
        if let Some(token) = &self.sink.token {
            config = config.with_token(token.clone());
        }
        Some(config)
    }
}

fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    if let Some(section) = ini.section(Some(SECTION_SINK)) {
        config.sink.url = non_empty(section.get("url"));
        config.sink.token = non_empty(section.get("token"));
        if let Some(value) = section.get("timeout_secs") {
            config.sink.timeout_secs = parse_value(SECTION_SINK, "timeout_secs", value)?;
            if config.sink.timeout_secs == 0 {
                return Err(invalid(
                    SECTION_SINK,
                    "timeout_secs",
                    value,
                    "must be at least 1",
                ));
            }
        }
    }

    if let Some(section) = ini.section(Some(SECTION_TRACKING)) {
        if let Some(value) = section.get("min_distance_meters") {
            config.tracking.min_distance_meters =
                parse_non_negative(SECTION_TRACKING, "min_distance_meters", value)?;
        }
        if let Some(value) = section.get("update_interval_ms") {
            config.tracking.update_interval_ms =
                parse_value(SECTION_TRACKING, "update_interval_ms", value)?;
        }
        if let Some(value) = section.get("accuracy_threshold_meters") {
            config.tracking.accuracy_threshold_meters =
                parse_non_negative(SECTION_TRACKING, "accuracy_threshold_meters", value)?;
        }
    }

    Ok(config)
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn parse_value<T: FromStr>(section: &str, key: &str, value: &str) -> Result<T, ConfigFileError> {
    value
        .trim()
        .parse()
        .map_err(|_| invalid(section, key, value, "not a valid number"))
}

fn parse_non_negative(section: &str, key: &str, value: &str) -> Result<f64, ConfigFileError> {
    let parsed: f64 = parse_value(section, key, value)?;
    if !parsed.is_finite() || parsed < 0.0 {
        return Err(invalid(section, key, value, "must be a non-negative number"));
    }
    Ok(parsed)
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Get the path to the config directory (~/.trailsync).
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".trailsync")
}

/// Get the path to the config file (~/.trailsync/config.ini).
pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}
