//! Environment error types.

use std::path::PathBuf;
use std::time::Duration;

/// Result type alias for environment operations.
pub type EnvResult<T> = std::result::Result<T, EnvError>;

/// Errors raised while bringing a control plane up or down.
#[derive(Debug, thiserror::Error)]
pub enum EnvError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// A configured definition directory does not exist.
    #[error("resource definition path {} does not exist", .0.display())]
    DefinitionPathMissing(PathBuf),

    /// A definition file could not be read, parsed or installed.
    #[error("invalid resource definition {}: {message}", .path.display())]
    Definition {
        /// File holding the definition.
        path: PathBuf,
        /// What was wrong with it.
        message: String,
    },

    /// Control plane did not become ready in time.
    #[error("control plane did not become ready within {0:?}")]
    StartTimeout(Duration),

    /// Control plane did not shut down in time.
    #[error("control plane did not stop within {0:?}")]
    StopTimeout(Duration),

    /// Control plane task terminated abnormally.
    #[error("control plane crashed: {0}")]
    Crashed(String),

    /// Environment is not running.
    #[error("environment is not running")]
    NotRunning,

    /// Environment is already running.
    #[error("environment is already running")]
    AlreadyRunning,

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EnvError {
    /// Creates a configuration error.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a definition error.
    #[must_use]
    pub fn definition(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::Definition {
            path: path.into(),
            message: msg.into(),
        }
    }
}
