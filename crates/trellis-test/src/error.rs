//! Harness error types.

use trellis_apiserver::EnvError;
use trellis_core::{SchemeError, StoreError};

/// Result type alias for harness operations.
pub type HarnessResult<T> = std::result::Result<T, HarnessError>;

/// Errors that abort a harness run, or report that cases failed.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    /// Kind registration failed before the environment was started.
    #[error("init scheme: {0}")]
    SchemeRegistration(#[source] SchemeError),

    /// The environment could not be started.
    #[error("init environment: {0}")]
    EnvironmentStart(#[source] EnvError),

    /// The client could not be built from the environment's config.
    #[error("init client: {0}")]
    ClientConstruction(#[source] StoreError),

    /// Objects created by a case could not be deleted.
    #[error("cleanup of case {case:?} failed: {}", .failures.join("; "))]
    Cleanup {
        /// Case whose objects leaked.
        case: String,
        /// One message per object that could not be deleted.
        failures: Vec<String>,
    },

    /// The environment could not be stopped.
    #[error("stop environment: {0}")]
    EnvironmentStop(#[source] EnvError),

    /// Every case ran but some failed.
    #[error("{} case(s) failed: {}", .failed.len(), .failed.join(", "))]
    CasesFailed {
        /// Names of the failed cases, in run order.
        failed: Vec<String>,
    },

    /// The harness itself misbehaved.
    #[error("internal harness error: {0}")]
    Internal(String),
}

impl HarnessError {
    /// Returns true if the run was aborted, as opposed to completed with
    /// failing cases.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !matches!(self, Self::CasesFailed { .. })
    }
}

/// Error returned by a side-effect assertion.
#[derive(Debug, thiserror::Error)]
pub enum SideEffectError {
    /// Reading the store failed.
    #[error("get obj: {0}")]
    Store(#[from] StoreError),

    /// The store does not look as expected.
    #[error("{0}")]
    Mismatch(String),
}

impl SideEffectError {
    /// Creates a mismatch error.
    #[must_use]
    pub fn mismatch(msg: impl Into<String>) -> Self {
        Self::Mismatch(msg.into())
    }
}
