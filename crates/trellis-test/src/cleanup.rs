//! Per-case release list.
//!
//! # Toyota Way: Jidoka (自働化)
//! Every object a case creates is recorded here the moment it exists, and
//! the list is drained newest-first when the case ends, whatever happened.
//! Objects are deleted before the namespaces that hold them.

use trellis_core::{Client, ObjectRef};

/// Objects created by one case, released in reverse creation order.
#[derive(Debug, Default)]
pub struct CleanupStack {
    created: Vec<ObjectRef>,
}

impl CleanupStack {
    /// Creates an empty stack.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a created object.
    pub fn push(&mut self, object_ref: ObjectRef) {
        self.created.push(object_ref);
    }

    /// Number of objects still to release.
    #[must_use]
    pub fn len(&self) -> usize {
        self.created.len()
    }

    /// Returns true if nothing is left to release.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.created.is_empty()
    }

    /// Deletes every recorded object, newest first.
    ///
    /// Every deletion is attempted. An object that is already gone (the
    /// reconciler deleted it, or a namespace delete took it along) counts as
    /// released. Returns one message per object that could not be deleted.
    pub async fn drain<C: Client + ?Sized>(&mut self, client: &C) -> Vec<String> {
        let mut failures = Vec::new();
        while let Some(object_ref) = self.created.pop() {
            match client.delete(&object_ref).await {
                Ok(()) => tracing::debug!(object = %object_ref, "deleted"),
                Err(err) if err.is_not_found() => {
                    tracing::debug!(object = %object_ref, "already deleted");
                }
                Err(err) => {
                    tracing::error!(object = %object_ref, error = %err, "delete failed");
                    failures.push(format!("{object_ref}: {err}"));
                }
            }
        }
        failures
    }
}

impl Drop for CleanupStack {
    fn drop(&mut self) {
        if !self.created.is_empty() {
            tracing::error!(leaked = self.created.len(), "cleanup stack dropped before it was drained");
        }
    }
}
