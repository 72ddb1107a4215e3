//! Kind registry.
//!
//! A [`Scheme`] is passed explicitly to every client; there is no
//! process-wide registry. Registration is idempotent so that several
//! suites can register the same kinds.

use std::collections::BTreeMap;

use crate::error::SchemeError;
use crate::meta::{GroupVersionKind, Scope};
use crate::object::Object;

/// Registry of the kinds a client is allowed to handle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scheme {
    kinds: BTreeMap<GroupVersionKind, Scope>,
}

impl Scheme {
    /// Creates an empty scheme.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a typed kind.
    ///
    /// # Errors
    /// Returns an error if the kind is already registered with another scope.
    pub fn register<K: Object>(&mut self) -> Result<(), SchemeError> {
        self.register_kind(K::gvk(), K::scope())
    }

    /// Registers a kind by its group/version/kind.
    ///
    /// # Errors
    /// Returns an error if the kind is malformed or already registered with
    /// another scope.
    pub fn register_kind(&mut self, gvk: GroupVersionKind, scope: Scope) -> Result<(), SchemeError> {
        if gvk.version.is_empty() || gvk.kind.is_empty() {
            return Err(SchemeError::InvalidKind(gvk));
        }
        match self.kinds.get(&gvk) {
            Some(&registered) if registered == scope => Ok(()),
            Some(&registered) => Err(SchemeError::Conflict {
                gvk,
                registered,
                requested: scope,
            }),
            None => {
                tracing::debug!(kind = %gvk, scope = %scope, "registered kind");
                self.kinds.insert(gvk, scope);
                Ok(())
            }
        }
    }

    /// Returns true if the kind is registered.
    #[must_use]
    pub fn recognizes(&self, gvk: &GroupVersionKind) -> bool {
        self.kinds.contains_key(gvk)
    }

    /// Returns the registered scope of a kind.
    #[must_use]
    pub fn scope_of(&self, gvk: &GroupVersionKind) -> Option<Scope> {
        self.kinds.get(gvk).copied()
    }

    /// Iterates over registered kinds in a stable order.
    pub fn kinds(&self) -> impl Iterator<Item = (&GroupVersionKind, Scope)> {
        self.kinds.iter().map(|(gvk, scope)| (gvk, *scope))
    }

    /// Number of registered kinds.
    #[must_use]
    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}
