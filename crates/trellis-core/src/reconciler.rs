//! Reconciler contract.
//!
//! # Toyota Way: Jidoka (自働化)
//! A reconciler either reports how to continue (a [`ReconcileResult`]) or
//! stops with an error. There is no third outcome.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::object::{Object, ObjectKey};

/// Identifies the object one reconciliation targets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Request {
    /// Namespace and name of the target.
    pub key: ObjectKey,
}

impl Request {
    /// Creates a request for a key.
    #[must_use]
    pub const fn new(key: ObjectKey) -> Self {
        Self { key }
    }

    /// Creates a request targeting a typed object.
    #[must_use]
    pub fn for_object<K: Object>(obj: &K) -> Self {
        Self::new(obj.key())
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.key.fmt(f)
    }
}

/// Re-invocation hint returned by a successful reconciliation.
///
/// The default value means "done, do not requeue".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReconcileResult {
    /// Requeue immediately.
    #[serde(default)]
    pub requeue: bool,
    /// Requeue after a delay.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requeue_after: Option<Duration>,
}

impl ReconcileResult {
    /// Reconciliation converged.
    #[must_use]
    pub const fn done() -> Self {
        Self {
            requeue: false,
            requeue_after: None,
        }
    }

    /// Ask to be invoked again right away.
    #[must_use]
    pub const fn requeue() -> Self {
        Self {
            requeue: true,
            requeue_after: None,
        }
    }

    /// Ask to be invoked again after `delay`.
    #[must_use]
    pub const fn requeue_after(delay: Duration) -> Self {
        Self {
            requeue: false,
            requeue_after: Some(delay),
        }
    }

    /// Returns true if no re-invocation was requested.
    #[must_use]
    pub const fn is_done(&self) -> bool {
        !self.requeue && self.requeue_after.is_none()
    }

    /// Field-by-field difference against `want`, or `None` when equal.
    #[must_use]
    pub fn diff(&self, want: &Self) -> Option<String> {
        let mut lines = Vec::new();
        if self.requeue != want.requeue {
            lines.push(format!("requeue: got {}, want {}", self.requeue, want.requeue));
        }
        if self.requeue_after != want.requeue_after {
            lines.push(format!(
                "requeue_after: got {:?}, want {:?}",
                self.requeue_after, want.requeue_after
            ));
        }
        if lines.is_empty() {
            None
        } else {
            Some(lines.join("\n"))
        }
    }
}

/// A control-loop component that drives one object toward its desired state.
///
/// Test harnesses are written once against this trait and never against a
/// concrete reconciler type.
///
/// # Example
///
/// ```rust,ignore
/// use trellis_core::{ClientExt, ConfigMap, ReconcileResult, Reconciler, Request, SharedClient, StoreError};
/// use async_trait::async_trait;
///
/// struct Labeler {
///     client: SharedClient,
/// }
///
/// #[async_trait]
/// impl Reconciler for Labeler {
///     type Error = StoreError;
///
///     async fn reconcile(&self, request: &Request) -> Result<ReconcileResult, StoreError> {
///         let mut cm: ConfigMap = self.client.get_as(&request.key).await?;
///         cm.metadata.labels.insert("seen".into(), "true".into());
///         self.client.update_typed(&cm).await?;
///         Ok(ReconcileResult::done())
///     }
/// }
/// ```
#[async_trait]
pub trait Reconciler: Send + Sync + 'static {
    /// Error returned when reconciliation fails.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Reconciles the object named by `request`.
    ///
    /// # Errors
    /// Returns an error if the object cannot be driven toward its desired state.
    async fn reconcile(&self, request: &Request) -> Result<ReconcileResult, Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::ConfigMap;

    #[test]
    fn test_default_is_done() {
        assert!(ReconcileResult::default().is_done());
        assert_eq!(ReconcileResult::default(), ReconcileResult::done());
        assert!(!ReconcileResult::requeue().is_done());
    }

    #[test]
    fn test_diff_equal() {
        let r = ReconcileResult::requeue_after(Duration::from_secs(5));
        assert_eq!(r.diff(&r), None);
    }

    #[test]
    fn test_diff_lists_each_field() {
        let got = ReconcileResult::requeue();
        let want = ReconcileResult::requeue_after(Duration::from_secs(1));
        let diff = got.diff(&want).unwrap();
        assert!(diff.contains("requeue: got true, want false"));
        assert!(diff.contains("requeue_after: got None, want Some(1s)"));
    }

    #[test]
    fn test_request_for_object() {
        let req = Request::for_object(&ConfigMap::new("ns", "cm"));
        assert_eq!(req.key, ObjectKey::namespaced("ns", "cm"));
        assert_eq!(req.to_string(), "ns/cm");
    }
}
