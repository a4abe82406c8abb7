//! # Stream Configuration
//!
//! YAML-loadable configuration consumed by the device layer:
//!
//! - Device specifier (file path or radio identifier string)
//! - Sync streaming buffers (count, size, transfers in flight, timeouts)
//! - Board settings applied when a radio is opened
//!
//! Fields are passed through to the transport as-is. Nothing here checks one
//! field against another; a `samples_per_buffer` that is not a multiple of
//! [`TRANSFER_GRANULARITY`] is rejected by the radio when streaming is
//! configured, not by this module.
//!
//! ## Configuration Search Path
//!
//! [`StreamConfig::load`] uses the first file found:
//! 1. Path in the `SDRDEV_CONFIG` environment variable
//! 2. `./sdrdev.yaml`
//! 3. `~/.config/sdrdev/config.yaml` (platform user config dir)
//! 4. `/etc/sdrdev/config.yaml`
//!
//! ## Example Configuration
//!
//! ```yaml
//! device_specifier: "*:serial=f12ce1"
//! num_buffers: 64
//! samples_per_buffer: 8192
//! num_transfers: 16
//! stream_timeout_ms: 5000
//! sync_timeout_ms: 2500
//! board:
//!   frequency_hz: 915000000
//!   sample_rate: 2000000
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Radio transfers are moved in units of this many samples; the sync
/// buffer size must be a multiple of it.
pub const TRANSFER_GRANULARITY: usize = 1024;

/// Error type for configuration operations.
#[derive(Debug, Clone)]
pub enum ConfigError {
    /// Failed to read or write a configuration file
    ReadError(String),
    /// Failed to parse configuration
    ParseError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError(msg) => write!(f, "failed to read config: {}", msg),
            ConfigError::ParseError(msg) => write!(f, "failed to parse config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Board settings applied once when a radio is opened.
///
/// Unset fields leave the radio's current setting alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    /// Center frequency in Hz (applied to both directions)
    pub frequency_hz: Option<u64>,
    /// Sample rate in samples/second
    pub sample_rate: Option<u32>,
    /// Analog bandwidth in Hz
    pub bandwidth_hz: Option<u32>,
    /// RX gain in dB
    pub rx_gain_db: Option<i32>,
    /// TX gain in dB
    pub tx_gain_db: Option<i32>,
}

/// Sync streaming configuration for one device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// File path for file replay, identifier string for a radio.
    /// `None` opens the first radio found.
    pub device_specifier: Option<String>,
    /// Number of buffers used by the underlying stream
    pub num_buffers: u32,
    /// Samples per buffer, also the size of each backend chunk
    pub samples_per_buffer: usize,
    /// Number of transfers kept in flight
    pub num_transfers: u32,
    /// Underlying stream timeout in milliseconds
    pub stream_timeout_ms: u32,
    /// Timeout for each sync rx/tx call in milliseconds
    pub sync_timeout_ms: u32,
    /// Board settings for the radio backend
    pub board: BoardConfig,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            device_specifier: None,
            num_buffers: 64,
            samples_per_buffer: 8192,
            num_transfers: 16,
            stream_timeout_ms: 5000,
            sync_timeout_ms: 2500,
            board: BoardConfig::default(),
        }
    }
}

impl StreamConfig {
    /// Default configuration pointed at a device specifier.
    pub fn with_specifier(specifier: impl Into<String>) -> Self {
        Self {
            device_specifier: Some(specifier.into()),
            ..Default::default()
        }
    }

    /// Load configuration from the search path.
    ///
    /// Returns the default config if no file is found.
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = std::env::var("SDRDEV_CONFIG") {
            if Path::new(&path).exists() {
                return Self::load_from(Path::new(&path));
            }
        }

        for path in &Self::config_search_paths() {
            if path.exists() {
                return Self::load_from(path);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))?;

        Self::parse(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(yaml).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Serialize to YAML.
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(self).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Save configuration to a file.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = self.to_yaml()?;

        std::fs::write(path, content)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))
    }

    /// Get configuration search paths.
    pub fn config_search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("./sdrdev.yaml")];

        if let Some(dirs) = directories::ProjectDirs::from("", "", "sdrdev") {
            paths.push(dirs.config_dir().join("config.yaml"));
        }

        paths.push(PathBuf::from("/etc/sdrdev/config.yaml"));

        paths
    }
}
