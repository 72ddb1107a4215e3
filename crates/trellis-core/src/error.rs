//! Error types for trellis-core.
//!
//! Per Iron Lotus Framework: All errors are explicit, no panics allowed.

use crate::meta::{GroupVersionKind, Scope};
use crate::object::ObjectKey;

/// Result type alias for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors returned by the backing store and by clients talking to it.
///
/// Variants are classified (`is_not_found`, `is_conflict`, ...) so that
/// reconcilers can branch on the kind of failure instead of its text.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Object does not exist.
    #[error("{kind} \"{key}\" not found")]
    NotFound {
        /// Kind of the missing object.
        kind: String,
        /// Identity of the missing object.
        key: ObjectKey,
    },

    /// Object already exists.
    #[error("{kind} \"{key}\" already exists")]
    AlreadyExists {
        /// Kind of the existing object.
        kind: String,
        /// Identity of the existing object.
        key: ObjectKey,
    },

    /// Optimistic concurrency check failed.
    #[error("operation on {kind} \"{key}\" conflicted: {message}")]
    Conflict {
        /// Kind of the object.
        kind: String,
        /// Identity of the object.
        key: ObjectKey,
        /// Conflict detail.
        message: String,
    },

    /// The control plane does not serve this kind.
    #[error("no matches for kind \"{}\" in version \"{}\"", .0.kind, .0.api_version())]
    NoKindMatch(GroupVersionKind),

    /// The client's scheme does not know this kind.
    #[error("no kind is registered for {0} in scheme")]
    NotRegistered(GroupVersionKind),

    /// Object failed validation.
    #[error("invalid object: {0}")]
    Invalid(String),

    /// Operation forbidden by the control plane.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Control plane cannot be reached.
    #[error("control plane unavailable: {0}")]
    Unavailable(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    /// Creates a not-found error.
    #[must_use]
    pub fn not_found(kind: impl Into<String>, key: ObjectKey) -> Self {
        Self::NotFound {
            kind: kind.into(),
            key,
        }
    }

    /// Creates an already-exists error.
    #[must_use]
    pub fn already_exists(kind: impl Into<String>, key: ObjectKey) -> Self {
        Self::AlreadyExists {
            kind: kind.into(),
            key,
        }
    }

    /// Creates a conflict error.
    #[must_use]
    pub fn conflict(kind: impl Into<String>, key: ObjectKey, message: impl Into<String>) -> Self {
        Self::Conflict {
            kind: kind.into(),
            key,
            message: message.into(),
        }
    }

    /// Creates a validation error.
    #[must_use]
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }

    /// Creates an unavailable error.
    #[must_use]
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Creates a serialization error.
    #[must_use]
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Returns true if the object was not found.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns true if the object already exists.
    #[must_use]
    pub const fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    /// Returns true if the operation lost an optimistic concurrency race.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Returns true if retrying the same call may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Conflict { .. } | Self::Unavailable(_))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Errors raised while registering kinds into a [`Scheme`](crate::Scheme).
#[derive(Debug, thiserror::Error)]
pub enum SchemeError {
    /// The kind is already registered with a different scope.
    #[error("{gvk} already registered as {registered}, cannot re-register as {requested}")]
    Conflict {
        /// The kind.
        gvk: GroupVersionKind,
        /// Scope it was registered with.
        registered: Scope,
        /// Scope requested now.
        requested: Scope,
    },

    /// The kind is malformed.
    #[error("invalid kind {0}: group version kind must have a version and a kind")]
    InvalidKind(GroupVersionKind),

    /// Registration failed for a caller-defined reason.
    #[error("registration failed: {0}")]
    Registration(String),
}

impl SchemeError {
    /// Creates a caller-defined registration error.
    #[must_use]
    pub fn registration(msg: impl Into<String>) -> Self {
        Self::Registration(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = StoreError::not_found("ConfigMap", ObjectKey::namespaced("ns", "cm"));
        assert_eq!(err.to_string(), "ConfigMap \"ns/cm\" not found");
        assert!(err.is_not_found());
        assert!(!err.is_conflict());
    }

    #[test]
    fn test_conflict_is_transient() {
        let err = StoreError::conflict("ConfigMap", ObjectKey::cluster("x"), "stale");
        assert!(err.is_conflict());
        assert!(err.is_transient());
        assert!(!StoreError::invalid("bad").is_transient());
    }

    #[test]
    fn test_no_kind_match_display() {
        let err = StoreError::NoKindMatch(GroupVersionKind::gvk("webapp.example.com", "v1", "Guestbook"));
        assert_eq!(
            err.to_string(),
            "no matches for kind \"Guestbook\" in version \"webapp.example.com/v1\""
        );
    }

    #[test]
    fn test_serde_error_conversion() {
        let parse: Result<serde_json::Value, _> = serde_json::from_str("{");
        let err: StoreError = parse.unwrap_err().into();
        assert!(err.to_string().contains("serialization error"));
    }

    #[test]
    fn test_scheme_conflict_display() {
        let err = SchemeError::Conflict {
            gvk: GroupVersionKind::gvk("", "v1", "Namespace"),
            registered: Scope::Cluster,
            requested: Scope::Namespaced,
        };
        let msg = err.to_string();
        assert!(msg.contains("Cluster"));
        assert!(msg.contains("Namespaced"));
    }
}
