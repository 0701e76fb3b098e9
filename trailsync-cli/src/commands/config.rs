//! Configuration inspection CLI commands.
//!
//! Provides `config path` and `config show`.

use std::path::Path;

use clap::Subcommand;
use trailsync::config::{config_file_path, ConfigFile};

use super::common::load_config;
use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Show the configuration file path
    Path,

    /// Show the effective configuration
    Show,
}

/// Run a config subcommand.
pub fn run(command: ConfigCommands, path: Option<&Path>) -> Result<(), CliError> {
    match command {
        ConfigCommands::Path => {
            let path = path.map(Path::to_path_buf).unwrap_or_else(config_file_path);
            println!("{}", path.display());
            Ok(())
        }
        ConfigCommands::Show => {
            let config = load_config(path)?;
            print!("{}", render(&config));
            Ok(())
        }
    }
}

fn render(config: &ConfigFile) -> String {
    let mut out = String::new();
    out.push_str("[sink]\n");
    out.push_str(&format!(
        "url = {}\n",
        config.sink.url.as_deref().unwrap_or("(not set)")
    ));
    out.push_str(&format!(
        "token = {}\n",
        config
            .sink
            .token
            .as_deref()
            .map(mask_token)
            .unwrap_or_else(|| "(not set)".to_string())
    ));
    out.push_str(&format!("timeout_secs = {}\n", config.sink.timeout_secs));
    out.push('\n');
    out.push_str("[tracking]\n");
    out.push_str(&format!(
        "min_distance_meters = {}\n",
        config.tracking.min_distance_meters
    ));
    out.push_str(&format!(
        "update_interval_ms = {}\n",
        config.tracking.update_interval_ms
    ));
    out.push_str(&format!(
        "accuracy_threshold_meters = {}\n",
        config.tracking.accuracy_threshold_meters
    ));
    out
}

/// Keep only the last four characters of a token.
fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= 4 {
        return "****".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("****{}", tail)
}
