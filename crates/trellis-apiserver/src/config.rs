//! Environment configuration.
//!
//! Per Iron Lotus Framework: Configuration is validated at load time (Poka-Yoke),
//! with sensible defaults and clear error messages.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{EnvError, EnvResult};

/// Configuration of a local control plane.
///
/// # Example
///
/// ```toml
/// crd_directory_paths = ["config/crd/bases"]
/// error_if_crd_path_missing = true
/// start_timeout = "20s"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    /// Directories holding resource definitions to install at start.
    #[serde(default)]
    pub crd_directory_paths: Vec<PathBuf>,

    /// Fail start when a configured directory does not exist.
    #[serde(default)]
    pub error_if_crd_path_missing: bool,

    /// How long to wait for the control plane to answer its first request.
    #[serde(default = "default_start_timeout")]
    #[serde(with = "humantime_serde")]
    pub start_timeout: Duration,

    /// How long to wait for the control plane to shut down.
    #[serde(default = "default_stop_timeout")]
    #[serde(with = "humantime_serde")]
    pub stop_timeout: Duration,

    /// Number of requests that may queue in front of the control plane.
    #[serde(default = "default_mailbox_capacity")]
    pub mailbox_capacity: usize,
}

fn default_start_timeout() -> Duration {
    Duration::from_secs(20)
}

fn default_stop_timeout() -> Duration {
    Duration::from_secs(20)
}

fn default_mailbox_capacity() -> usize {
    256
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            crd_directory_paths: Vec::new(),
            error_if_crd_path_missing: false,
            start_timeout: default_start_timeout(),
            stop_timeout: default_stop_timeout(),
            mailbox_capacity: default_mailbox_capacity(),
        }
    }
}

impl EnvironmentConfig {
    /// Creates a configuration with defaults and no definition paths.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a definition directory.
    #[must_use]
    pub fn with_crd_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.crd_directory_paths.push(path.into());
        self
    }

    /// Makes a missing definition directory fatal at start.
    #[must_use]
    pub const fn with_error_if_crd_path_missing(mut self, fatal: bool) -> Self {
        self.error_if_crd_path_missing = fatal;
        self
    }

    /// Sets the start timeout.
    #[must_use]
    pub const fn with_start_timeout(mut self, timeout: Duration) -> Self {
        self.start_timeout = timeout;
        self
    }

    /// Sets the stop timeout.
    #[must_use]
    pub const fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    /// Sets the mailbox capacity.
    #[must_use]
    pub const fn with_mailbox_capacity(mut self, capacity: usize) -> Self {
        self.mailbox_capacity = capacity;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> EnvResult<()> {
        if self.start_timeout.is_zero() {
            return Err(EnvError::config("start_timeout must be greater than 0"));
        }
        if self.stop_timeout.is_zero() {
            return Err(EnvError::config("stop_timeout must be greater than 0"));
        }
        if self.mailbox_capacity == 0 {
            return Err(EnvError::config("mailbox_capacity must be greater than 0"));
        }
        if self
            .crd_directory_paths
            .iter()
            .any(|p| p.as_os_str().is_empty())
        {
            return Err(EnvError::config("crd_directory_paths cannot contain empty paths"));
        }
        Ok(())
    }

    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<std::path::Path>) -> EnvResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| EnvError::config(format!("failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| EnvError::config(format!("failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }
}

/// Serde helper for humantime durations.
mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    /// Serializes a duration as a human-readable string.
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    /// Deserializes a duration from a human-readable string.
    ///
    /// # Errors
    /// Returns an error if the string cannot be parsed.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}
