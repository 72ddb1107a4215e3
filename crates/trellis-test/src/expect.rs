//! Error expectations.
//!
//! Errors are matched by classification, never by message: an expectation
//! names an error type (optionally narrowed by a predicate) and matches any
//! error whose `source()` chain contains a value of that type.

use std::any::type_name;
use std::error::Error;
use std::fmt;
use std::sync::Arc;

use trellis_core::StoreError;

type Matcher = Arc<dyn Fn(&(dyn Error + 'static)) -> bool + Send + Sync>;

/// Expected classification of a reconciler error.
#[derive(Clone)]
pub struct ExpectedError {
    kind: &'static str,
    matcher: Matcher,
}

impl ExpectedError {
    /// Matches any error of type `E` anywhere in the chain.
    #[must_use]
    pub fn of<E: Error + 'static>() -> Self {
        Self {
            kind: type_name::<E>(),
            matcher: Arc::new(|err: &(dyn Error + 'static)| err.is::<E>()),
        }
    }

    /// Matches an error of type `E` in the chain for which `predicate` holds.
    #[must_use]
    pub fn matching<E, P>(predicate: P) -> Self
    where
        E: Error + 'static,
        P: Fn(&E) -> bool + Send + Sync + 'static,
    {
        Self {
            kind: type_name::<E>(),
            matcher: Arc::new(move |err: &(dyn Error + 'static)| {
                err.downcast_ref::<E>().is_some_and(&predicate)
            }),
        }
    }

    /// Matches a [`StoreError`] reporting a missing object.
    #[must_use]
    pub fn not_found() -> Self {
        Self::matching(StoreError::is_not_found)
    }

    /// Matches a [`StoreError`] reporting a lost concurrency race.
    #[must_use]
    pub fn conflict() -> Self {
        Self::matching(StoreError::is_conflict)
    }

    /// Name of the expected error type.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        self.kind
    }

    /// Returns true if `err` or any of its sources is of the expected kind.
    #[must_use]
    pub fn is_match(&self, err: &(dyn Error + 'static)) -> bool {
        std::iter::successors(Some(err), |&e| e.source()).any(|e| (self.matcher)(e))
    }
}

impl fmt::Debug for ExpectedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpectedError").field("kind", &self.kind).finish_non_exhaustive()
    }
}

impl fmt::Display for ExpectedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind)
    }
}

/// Checks an actual error against an expectation.
///
/// No expectation matches only no error; an expectation matches only an
/// error classified as that kind.
#[must_use]
pub fn error_matches(actual: Option<&(dyn Error + 'static)>, expected: Option<&ExpectedError>) -> bool {
    match (actual, expected) {
        (None, None) => true,
        (Some(err), Some(want)) => want.is_match(err),
        _ => false,
    }
}

/// Renders an error with its whole source chain, `outer: inner: root`.
#[must_use]
pub fn describe_error(err: &(dyn Error + 'static)) -> String {
    let mut rendered = err.to_string();
    for source in std::iter::successors(err.source(), |&e| e.source()) {
        let text = source.to_string();
        // thiserror messages often already embed their source.
        if !rendered.ends_with(&text) {
            rendered.push_str(": ");
            rendered.push_str(&text);
        }
    }
    rendered
}

#[cfg(test)]
mod tests {
    use trellis_core::ObjectKey;

    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("spec is invalid")]
    struct FailSpecError;

    #[derive(Debug, thiserror::Error)]
    enum ReconcileError {
        #[error("validate: {0}")]
        Validate(#[source] FailSpecError),
        #[error("store: {0}")]
        Store(#[from] StoreError),
    }

    #[derive(Debug, thiserror::Error)]
    #[error("other failure")]
    struct OtherError;

    #[test]
    fn test_absent_matches_absent_only() {
        assert!(error_matches(None, None));
        let err = OtherError;
        assert!(!error_matches(Some(&err), None));
        assert!(!error_matches(None, Some(&ExpectedError::of::<OtherError>())));
    }

    #[test]
    fn test_direct_match() {
        let err = FailSpecError;
        assert!(error_matches(Some(&err), Some(&ExpectedError::of::<FailSpecError>())));
        assert!(!error_matches(Some(&err), Some(&ExpectedError::of::<OtherError>())));
    }

    #[test]
    fn test_wrapped_match_walks_chain() {
        let err = ReconcileError::Validate(FailSpecError);
        let expected = ExpectedError::of::<FailSpecError>();
        assert!(expected.is_match(&err));
        assert!(ExpectedError::of::<ReconcileError>().is_match(&err));
    }

    #[test]
    fn test_predicate_narrows_kind() {
        let err = ReconcileError::Store(StoreError::not_found("ConfigMap", ObjectKey::namespaced("ns", "cm")));
        assert!(ExpectedError::not_found().is_match(&err));
        assert!(!ExpectedError::conflict().is_match(&err));
    }

    #[test]
    fn test_message_text_is_irrelevant() {
        // Same text, different type.
        #[derive(Debug, thiserror::Error)]
        #[error("spec is invalid")]
        struct Lookalike;

        assert!(!ExpectedError::of::<FailSpecError>().is_match(&Lookalike));
    }

    #[test]
    fn test_kind_and_debug() {
        let expected = ExpectedError::of::<OtherError>();
        assert!(expected.kind().ends_with("OtherError"));
        assert!(format!("{expected:?}").contains("OtherError"));
    }

    #[test]
    fn test_describe_error_chain() {
        let err = ReconcileError::Validate(FailSpecError);
        assert_eq!(describe_error(&err), "validate: spec is invalid");

        #[derive(Debug, thiserror::Error)]
        #[error("reconcile failed")]
        struct Outer(#[source] FailSpecError);
        assert_eq!(describe_error(&Outer(FailSpecError)), "reconcile failed: spec is invalid");
    }
}
