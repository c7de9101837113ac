//! CLI configuration (nbs.toml)
//!
//! Looked up in the platform config directory unless `--config` names a
//! file. A missing default file means defaults; a named file must exist.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Configuration file name inside the config directory
pub const CONFIG_FILE: &str = "nbs.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CliConfig {
    /// Playback defaults for `nbs play`
    #[serde(default)]
    pub playback: PlaybackConfig,
    /// Logging settings
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Tempo multiplier (default: 1.0)
    #[serde(default = "default_speed")]
    pub speed: f64,
    /// Force looping on or off; unset follows the song header
    #[serde(default)]
    pub looping: Option<bool>,
    /// Stop after this many ticks; unset plays to the end
    #[serde(default)]
    pub max_ticks: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    /// tracing filter directive used when RUST_LOG is unset (default: "info")
    #[serde(default = "default_filter")]
    pub filter: String,
}

fn default_speed() -> f64 {
    1.0
}
fn default_filter() -> String {
    "info".to_string()
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            speed: default_speed(),
            looping: None,
            max_ticks: None,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
        }
    }
}

/// Returns the platform-specific configuration directory.
///
/// On Linux: `~/.config/nbs`
///
/// Returns `None` if the home directory cannot be determined.
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("io.nethercore", "", "nbs")
        .map(|dirs| dirs.config_dir().to_path_buf())
}

/// Load the configuration
///
/// # Errors
///
/// Returns an error if `explicit` names a file that cannot be read, or if
/// whichever file is found does not parse.
pub fn load(explicit: Option<&Path>) -> Result<CliConfig> {
    if let Some(path) = explicit {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        return parse(&content, path);
    }

    let Some(path) = config_dir().map(|dir| dir.join(CONFIG_FILE)) else {
        return Ok(CliConfig::default());
    };
    match std::fs::read_to_string(&path) {
        Ok(content) => parse(&content, &path),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(CliConfig::default()),
        Err(err) => Err(err).with_context(|| format!("Failed to read config {}", path.display())),
    }
}

fn parse(content: &str, path: &Path) -> Result<CliConfig> {
    toml::from_str(content).with_context(|| format!("Invalid config {}", path.display()))
}
