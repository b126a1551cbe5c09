//! Configuration file support for the gallery bridge.
//!
//! Holds the tunables of the frame-loop bridge (drain budget, cache capacity,
//! decode cadence) and the log level used by the demo binary.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::bridge::DrainBudget;
use crate::constants::{
    DEFAULT_DECODE_RESULTS_PER_TICK, DEFAULT_DRAIN_BUDGET_MS, DEFAULT_DRAIN_WARNING_MS,
    DEFAULT_LARGE_IMAGE_CAPACITY,
};

/// Verbosity of the bridge's `log` output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    /// Thread lifecycle and fatal errors
    #[default]
    Info,
    /// Evictions, decode failures, budget overruns
    Debug,
    /// Every request and response
    Trace,
}

impl LogLevel {
    /// Filter to install in the logger.
    pub fn to_level_filter(&self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Current configuration file format version.
/// Increment this when making breaking changes to the config format.
pub const CONFIG_VERSION: u32 = 1;

/// Bridge configuration, loadable from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Version of the configuration file format
    #[serde(default = "default_version")]
    pub version: u32,

    /// Number of holders that may show a large image at once
    #[serde(default = "default_large_image_capacity")]
    pub large_image_capacity: usize,

    /// Soft per-frame drain budget in milliseconds
    #[serde(default = "default_drain_budget_ms")]
    pub drain_budget_ms: u64,

    /// Drain duration that triggers a diagnostic, in milliseconds
    #[serde(default = "default_drain_warning_ms")]
    pub drain_warning_ms: u64,

    /// Completed decode jobs collected per tick
    #[serde(default = "default_decode_results_per_tick")]
    pub decode_results_per_tick: usize,

    /// Log verbosity level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Root directory handed to the data service
    #[serde(default)]
    pub data_root: Option<PathBuf>,
}

fn default_version() -> u32 {
    CONFIG_VERSION
}

fn default_large_image_capacity() -> usize {
    DEFAULT_LARGE_IMAGE_CAPACITY
}

fn default_drain_budget_ms() -> u64 {
    DEFAULT_DRAIN_BUDGET_MS
}

fn default_drain_warning_ms() -> u64 {
    DEFAULT_DRAIN_WARNING_MS
}

fn default_decode_results_per_tick() -> usize {
    DEFAULT_DECODE_RESULTS_PER_TICK
}

impl BridgeConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self {
            version: CONFIG_VERSION,
            large_image_capacity: default_large_image_capacity(),
            drain_budget_ms: default_drain_budget_ms(),
            drain_warning_ms: default_drain_warning_ms(),
            decode_results_per_tick: default_decode_results_per_tick(),
            log_level: LogLevel::default(),
            data_root: None,
        }
    }

    /// Budget used by the response dispatcher.
    pub fn drain_budget(&self) -> DrainBudget {
        DrainBudget {
            soft: Duration::from_millis(self.drain_budget_ms),
            warning: Duration::from_millis(self.drain_warning_ms),
        }
    }

    /// Serialize the configuration to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;

        if config.version > CONFIG_VERSION {
            return Err(ConfigError::VersionTooNew {
                file_version: config.version,
                supported_version: CONFIG_VERSION,
            });
        }

        Ok(config)
    }

    /// Get the default filename for the config file.
    pub fn default_filename() -> &'static str {
        "gallery-bridge.json"
    }

    /// Get the default config file path.
    pub fn default_path() -> Option<PathBuf> {
        if let Some(config_dir) = dirs::config_dir() {
            Some(config_dir.join("gallery").join(Self::default_filename()))
        } else {
            dirs::home_dir().map(|home_dir| {
                home_dir
                    .join(".config")
                    .join("gallery")
                    .join(Self::default_filename())
            })
        }
    }

    /// Load configuration from an explicit file.
    pub fn load(path: &std::path::Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Try to load configuration from the default path.
    /// Returns None if the file doesn't exist or can't be read.
    pub fn load_from_default_path() -> Option<Self> {
        let path = Self::default_path()?;
        if !path.exists() {
            log::debug!("No config file found at {:?}", path);
            return None;
        }

        match Self::load(&path) {
            Ok(config) => {
                log::info!("Loaded configuration from {:?}", path);
                Some(config)
            }
            Err(e) => {
                log::warn!("Failed to load config file {:?}: {}", path, e);
                None
            }
        }
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// JSON parsing error
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] serde_json::Error),

    /// Configuration version is newer than supported
    #[error(
        "Configuration file version {file_version} is newer than supported version {supported_version}"
    )]
    VersionTooNew {
        file_version: u32,
        supported_version: u32,
    },

    /// I/O error when reading the config
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
