//! Configuration management for button-events
//!
//! Timing settings for the extensions plus host loop settings, loaded from
//! and saved to a platform-specific config file.
//!
//! ## Config File Locations
//!
//! | Platform | Path |
//! |----------|------|
//! | Linux | `~/.config/button-events/config.toml` |
//! | macOS | `~/Library/Application Support/button-events/config.toml` |
//! | Windows | `%APPDATA%\button-events\config.toml` |
//!
//! ## Example
//!
//! ```no_run
//! use button_events::Config;
//!
//! // Load existing config or use defaults
//! let mut config = Config::load().unwrap_or_default();
//!
//! // Slow down key repeat
//! config.standard.repeat_rate_ms = 30;
//!
//! // Save to disk
//! config.save().expect("Failed to save config");
//! ```

use crate::error::InputError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Error type for configuration operations
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to determine config directory
    #[error("Could not determine config directory")]
    NoConfigDir,
    /// IO error reading or writing config file
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    /// Failed to parse config file
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Failed to serialize config
    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    /// Values that parse but cannot be used
    #[error(transparent)]
    Invalid(#[from] InputError),
}

/// Returns the path to the config file.
///
/// Creates the config directory if it doesn't exist.
pub fn config_path() -> Result<PathBuf, ConfigError> {
    let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
    let app_dir = config_dir.join("button-events");

    if !app_dir.exists() {
        fs::create_dir_all(&app_dir)?;
    }

    Ok(app_dir.join("config.toml"))
}

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Config {
    /// Press/release and key repeat settings
    #[serde(default)]
    pub standard: StandardPressConfig,
    /// Multi-tap detection settings
    #[serde(default)]
    pub multi_tap: MultiTapConfig,
    /// Host loop settings
    #[serde(default)]
    pub host: HostConfig,
}

/// Settings for [`StandardPressExtension`](crate::extensions::StandardPressExtension)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StandardPressConfig {
    /// Maximum gap between presses counted as one multi-press sequence
    pub multi_press_window_ms: u64,
    /// Key repeat cadence; 0 disables repeat
    pub repeat_rate_ms: u64,
}

impl Default for StandardPressConfig {
    fn default() -> Self {
        Self {
            multi_press_window_ms: 250,
            repeat_rate_ms: 15,
        }
    }
}

/// Settings for [`MultiTapExtension`](crate::extensions::MultiTapExtension)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MultiTapConfig {
    /// Time after the last tap before a burst is reported
    pub multi_press_window_ms: u64,
    /// Burst size reported immediately, without waiting for the window
    pub max_taps: u16,
}

impl Default for MultiTapConfig {
    fn default() -> Self {
        Self {
            multi_press_window_ms: 250,
            max_taps: 3,
        }
    }
}

/// How the host binary prints events
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Host loop configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HostConfig {
    /// Longest sleep between input polls
    pub poll_interval_ms: u64,
    /// Event output format
    pub output: OutputFormat,
    /// Stop when Q is pressed three times in quick succession
    pub quit_on_triple_q: bool,
    /// Prefer raw evdev devices on Linux
    pub use_evdev: bool,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 5,
            output: OutputFormat::Text,
            quit_on_triple_q: true,
            use_evdev: true,
        }
    }
}

impl Config {
    /// Load configuration from the default config file.
    ///
    /// Returns the default configuration if the file doesn't exist.
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_path()?;

        if !path.exists() {
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the default config file.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = config_path()?;
        self.save_to(&path)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Reject settings the extensions cannot run with
    pub fn validate(&self) -> Result<(), InputError> {
        if self.multi_tap.max_taps == 0 {
            return Err(InputError::InvalidConfig(
                "multi_tap.max_taps must be at least 1".to_string(),
            ));
        }
        if self.host.poll_interval_ms == 0 {
            return Err(InputError::InvalidConfig(
                "host.poll_interval_ms must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Get the host poll interval as Duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.host.poll_interval_ms)
    }
}
