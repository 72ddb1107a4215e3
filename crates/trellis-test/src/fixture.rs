//! Fixture builders.
//!
//! A fixture is a base value plus an ordered list of mutations. Each test
//! case starts from the same base and states only what differs:
//!
//! ```rust,ignore
//! let guestbook = Fixture::new(Guestbook::new("default", "my-guestbook"));
//! let custom = guestbook.build_with([in_namespace("custom")]);
//! ```

use std::fmt;
use std::sync::Arc;

use trellis_core::Object;

/// A mutation applied to a fixture value.
pub type Mutation<T> = Arc<dyn Fn(&mut T) + Send + Sync>;

/// Base value plus mutations.
pub struct Fixture<T> {
    base: T,
    mutations: Vec<Mutation<T>>,
}

impl<T: Clone> Fixture<T> {
    /// Creates a fixture with no mutations.
    #[must_use]
    pub fn new(base: T) -> Self {
        Self {
            base,
            mutations: Vec::new(),
        }
    }

    /// Appends a mutation.
    #[must_use]
    pub fn with(mut self, mutation: impl Fn(&mut T) + Send + Sync + 'static) -> Self {
        self.mutations.push(Arc::new(mutation));
        self
    }

    /// Builds a fresh value: the base with every mutation applied in order.
    #[must_use]
    pub fn build(&self) -> T {
        apply(self.base.clone(), self.mutations.iter().map(|m| m.as_ref()))
    }

    /// Builds a fresh value with extra mutations applied after the
    /// fixture's own.
    #[must_use]
    pub fn build_with<F>(&self, extra: impl IntoIterator<Item = F>) -> T
    where
        F: Fn(&mut T),
    {
        let mut value = self.build();
        for mutation in extra {
            mutation(&mut value);
        }
        value
    }
}

impl<T: Clone> Clone for Fixture<T> {
    fn clone(&self) -> Self {
        Self {
            base: self.base.clone(),
            mutations: self.mutations.clone(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Fixture<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fixture")
            .field("base", &self.base)
            .field("mutations", &self.mutations.len())
            .finish()
    }
}

/// Applies `mutations` to `base` in order.
pub fn apply<T, F>(mut base: T, mutations: impl IntoIterator<Item = F>) -> T
where
    F: Fn(&mut T),
{
    for mutation in mutations {
        mutation(&mut base);
    }
    base
}

/// Moves an object into `namespace`.
pub fn in_namespace<K: Object>(namespace: impl Into<String>) -> impl Fn(&mut K) + Send + Sync + 'static {
    let namespace = namespace.into();
    move |obj: &mut K| obj.meta_mut().namespace = Some(namespace.clone())
}

/// Renames an object.
pub fn named<K: Object>(name: impl Into<String>) -> impl Fn(&mut K) + Send + Sync + 'static {
    let name = name.into();
    move |obj: &mut K| obj.meta_mut().name.clone_from(&name)
}

/// Sets a label on an object.
pub fn with_label<K: Object>(
    key: impl Into<String>,
    value: impl Into<String>,
) -> impl Fn(&mut K) + Send + Sync + 'static {
    let (key, value) = (key.into(), value.into());
    move |obj: &mut K| {
        obj.meta_mut().labels.insert(key.clone(), value.clone());
    }
}

#[cfg(test)]
mod tests {
    use trellis_core::{ConfigMap, Namespace, ObjectKey};

    use super::*;

    #[test]
    fn test_build_applies_in_order() {
        let fixture = Fixture::new(ConfigMap::new("default", "cm"))
            .with(|cm: &mut ConfigMap| {
                cm.data.insert("k".into(), "first".into());
            })
            .with(|cm: &mut ConfigMap| {
                cm.data.insert("k".into(), "second".into());
            });
        assert_eq!(fixture.build().data["k"], "second");
    }

    #[test]
    fn test_build_is_fresh_each_time() {
        let fixture = Fixture::new(ConfigMap::new("default", "cm"));
        let mut a = fixture.build();
        a.data.insert("k".into(), "v".into());
        assert!(fixture.build().data.is_empty());
    }

    #[test]
    fn test_build_with_extra_mutations() {
        let fixture = Fixture::new(ConfigMap::new("default", "my-guestbook"));
        let custom = fixture.build_with([in_namespace::<ConfigMap>("custom")]);
        assert_eq!(custom.key(), ObjectKey::namespaced("custom", "my-guestbook"));
        assert_eq!(fixture.build().key(), ObjectKey::namespaced("default", "my-guestbook"));
    }

    #[test]
    fn test_helpers() {
        let ns = Fixture::new(Namespace::new("a"))
            .with(named::<Namespace>("b"))
            .with(with_label::<Namespace>("team", "x"))
            .build();
        assert_eq!(ns.metadata.name, "b");
        assert_eq!(ns.metadata.labels["team"], "x");
    }

    #[test]
    fn test_apply_without_mutations() {
        let ns = apply(Namespace::new("a"), Vec::<fn(&mut Namespace)>::new());
        assert_eq!(ns, Namespace::new("a"));
    }
}
