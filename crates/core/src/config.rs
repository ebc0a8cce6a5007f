//! Snapshot configuration via `snapvol.toml`
//!
//! Every setting has a default, so an absent or empty file is valid. Values are
//! validated eagerly when a file is loaded.

use crate::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Conventional config file name.
pub const CONFIG_FILE_NAME: &str = "snapvol.toml";

/// Default budget for each asynchronous step of snapshot creation.
pub const DEFAULT_SNAPSHOT_TIMEOUT_SECS: u64 = 120;

/// Default interval between status polls of an asynchronous step.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Snapshot configuration loaded from `snapvol.toml`.
///
/// # Example
///
/// ```toml
/// # Seconds allowed for each asynchronous snapshot step (default: 120)
/// snapshot_timeout_secs = 120
/// # Milliseconds between status polls (default: 100)
/// poll_interval_ms = 100
/// # Set to false to read every file from the live volume
/// enabled = true
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapvolConfig {
    /// Budget in seconds for each asynchronous step (also used on deletion).
    #[serde(default = "default_snapshot_timeout_secs")]
    pub snapshot_timeout_secs: u64,
    /// Interval in milliseconds between status polls.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// When false, paths are never redirected to a snapshot.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_snapshot_timeout_secs() -> u64 {
    DEFAULT_SNAPSHOT_TIMEOUT_SECS
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_enabled() -> bool {
    true
}

impl Default for SnapvolConfig {
    fn default() -> Self {
        Self {
            snapshot_timeout_secs: default_snapshot_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            enabled: default_enabled(),
        }
    }
}

impl SnapvolConfig {
    /// Per-step timeout budget
    pub fn snapshot_timeout(&self) -> Duration {
        Duration::from_secs(self.snapshot_timeout_secs)
    }

    /// Status poll interval
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Reject values the orchestrator cannot work with.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` for a zero timeout, a zero poll interval,
    /// or a poll interval longer than the timeout.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.snapshot_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "snapshot_timeout_secs",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "poll_interval_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.poll_interval() > self.snapshot_timeout() {
            return Err(ConfigError::Invalid {
                field: "poll_interval_ms",
                reason: format!(
                    "{} ms exceeds the snapshot timeout of {} s",
                    self.poll_interval_ms, self.snapshot_timeout_secs
                ),
            });
        }
        Ok(())
    }

    /// Parse and validate config from a TOML string.
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let config: SnapvolConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# snapvol configuration
#
# Seconds allowed for each asynchronous snapshot step
# (writer metadata, prepare, snapshot, completion). Default: 120
snapshot_timeout_secs = 120

# Milliseconds between status polls of an asynchronous step. Default: 100
poll_interval_ms = 100

# Redirect reads of locked files to a volume snapshot. Default: true
enabled = true
"#
    }

    /// Write the default config file if it does not already exist.
    pub fn write_default_if_missing(path: &Path) -> ConfigResult<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|source| ConfigError::Io {
                path: path.display().to_string(),
                source,
            })?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })
    }
}
