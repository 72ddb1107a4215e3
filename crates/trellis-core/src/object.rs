//! Typed and type-erased objects, and their identities.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{StoreError, StoreResult};
use crate::meta::{GroupVersionKind, ObjectMeta, Scope};

/// Identity of an object within its kind: namespace (if any) plus name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectKey {
    /// Namespace; `None` for cluster-scoped objects.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Name.
    pub name: String,
}

impl ObjectKey {
    /// Key of a namespaced object.
    #[must_use]
    pub fn namespaced(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            name: name.into(),
        }
    }

    /// Key of a cluster-scoped object.
    #[must_use]
    pub fn cluster(name: impl Into<String>) -> Self {
        Self {
            namespace: None,
            name: name.into(),
        }
    }

    /// Derives the key from object metadata.
    #[must_use]
    pub fn from_meta(meta: &ObjectMeta) -> Self {
        Self {
            namespace: meta.namespace.clone().filter(|ns| !ns.is_empty()),
            name: meta.name.clone(),
        }
    }

    /// Returns the key with the namespace dropped when `scope` is cluster-wide.
    #[must_use]
    pub fn scoped(mut self, scope: Scope) -> Self {
        if !scope.is_namespaced() {
            self.namespace = None;
        }
        self
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{ns}/{}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// Kind plus key: the complete address of one stored object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectRef {
    /// Kind.
    pub gvk: GroupVersionKind,
    /// Identity within the kind.
    pub key: ObjectKey,
}

impl ObjectRef {
    /// Creates a reference.
    #[must_use]
    pub const fn new(gvk: GroupVersionKind, key: ObjectKey) -> Self {
        Self { gvk, key }
    }

    /// Reference to a typed object.
    #[must_use]
    pub fn of<K: Object>(obj: &K) -> Self {
        Self::new(K::gvk(), obj.key())
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.gvk.kind, self.key)
    }
}

/// A statically typed resource.
///
/// Implementors serialize as a JSON object with a `metadata` field holding
/// [`ObjectMeta`]; every other field is carried opaquely by the store.
/// A top-level `status` field is treated as the status subresource.
pub trait Object: Serialize + DeserializeOwned + Clone + fmt::Debug + Send + Sync + 'static {
    /// The kind served for this type.
    fn gvk() -> GroupVersionKind;

    /// Whether the kind is namespaced.
    fn scope() -> Scope {
        Scope::Namespaced
    }

    /// Object metadata.
    fn meta(&self) -> &ObjectMeta;

    /// Mutable object metadata.
    fn meta_mut(&mut self) -> &mut ObjectMeta;

    /// Identity of this object.
    fn key(&self) -> ObjectKey {
        ObjectKey::from_meta(self.meta()).scoped(Self::scope())
    }
}

/// A type-erased object as held by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicObject {
    /// Kind.
    pub gvk: GroupVersionKind,
    /// Metadata.
    pub metadata: ObjectMeta,
    /// Every top-level field other than `metadata`.
    pub data: Map<String, Value>,
}

impl DynamicObject {
    /// Creates an object with no fields besides metadata.
    #[must_use]
    pub fn new(gvk: GroupVersionKind, metadata: ObjectMeta) -> Self {
        Self {
            gvk,
            metadata,
            data: Map::new(),
        }
    }

    /// Erases a typed object.
    pub fn from_typed<K: Object>(obj: &K) -> StoreResult<Self> {
        let Value::Object(mut data) = serde_json::to_value(obj)? else {
            return Err(StoreError::serialization(format!(
                "{} does not serialize to a JSON object",
                K::gvk().kind
            )));
        };
        let metadata = match data.remove("metadata") {
            Some(meta) => serde_json::from_value(meta)?,
            None => ObjectMeta::default(),
        };
        Ok(Self {
            gvk: K::gvk(),
            metadata,
            data,
        })
    }

    /// Recovers the typed object.
    pub fn try_parse<K: Object>(&self) -> StoreResult<K> {
        let expected = K::gvk();
        if self.gvk != expected {
            return Err(StoreError::serialization(format!(
                "cannot decode {} as {}",
                self.gvk, expected
            )));
        }
        let mut fields = self.data.clone();
        fields.insert("metadata".to_string(), serde_json::to_value(&self.metadata)?);
        Ok(serde_json::from_value(Value::Object(fields))?)
    }

    /// Identity of this object.
    #[must_use]
    pub fn key(&self) -> ObjectKey {
        ObjectKey::from_meta(&self.metadata)
    }

    /// Complete address of this object.
    #[must_use]
    pub fn object_ref(&self) -> ObjectRef {
        ObjectRef::new(self.gvk.clone(), self.key())
    }

    /// The `status` field, if present.
    #[must_use]
    pub fn status(&self) -> Option<&Value> {
        self.data.get("status")
    }

    /// Every field except `status`.
    #[must_use]
    pub fn without_status(&self) -> Map<String, Value> {
        let mut fields = self.data.clone();
        fields.remove("status");
        fields
    }
}

/// Object-safe view over any [`Object`], used where heterogeneous kinds
/// travel together (for example the prior state of a test case).
pub trait AnyObject: fmt::Debug + Send + Sync {
    /// Complete address of the object.
    fn object_ref(&self) -> ObjectRef;

    /// Erased form of the object.
    fn to_dynamic(&self) -> StoreResult<DynamicObject>;
}

impl<K: Object> AnyObject for K {
    fn object_ref(&self) -> ObjectRef {
        ObjectRef::of(self)
    }

    fn to_dynamic(&self) -> StoreResult<DynamicObject> {
        DynamicObject::from_typed(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::{ConfigMap, Namespace};

    #[test]
    fn test_key_display() {
        assert_eq!(ObjectKey::namespaced("ns", "a").to_string(), "ns/a");
        assert_eq!(ObjectKey::cluster("a").to_string(), "a");
    }

    #[test]
    fn test_key_from_meta_ignores_empty_namespace() {
        let mut meta = ObjectMeta::named("a");
        meta.namespace = Some(String::new());
        assert_eq!(ObjectKey::from_meta(&meta), ObjectKey::cluster("a"));
    }

    #[test]
    fn test_cluster_scoped_key_drops_namespace() {
        let mut ns = Namespace::new("custom");
        ns.metadata.namespace = Some("stray".into());
        assert_eq!(ns.key(), ObjectKey::cluster("custom"));
    }

    #[test]
    fn test_dynamic_conversion_keeps_fields() {
        let mut cm = ConfigMap::new("default", "cm");
        cm.data.insert("foo".into(), "bar".into());

        let dynamic = DynamicObject::from_typed(&cm).unwrap();
        assert_eq!(dynamic.gvk, ConfigMap::gvk());
        assert_eq!(dynamic.key(), ObjectKey::namespaced("default", "cm"));
        assert_eq!(dynamic.data["data"]["foo"], "bar");

        let back: ConfigMap = dynamic.try_parse().unwrap();
        assert_eq!(back, cm);
    }

    #[test]
    fn test_try_parse_rejects_other_kind() {
        let dynamic = DynamicObject::from_typed(&Namespace::new("x")).unwrap();
        let err = dynamic.try_parse::<ConfigMap>().unwrap_err();
        assert!(err.to_string().contains("cannot decode"));
    }

    #[test]
    fn test_any_object_ref() {
        let cm = ConfigMap::new("ns", "cm");
        let erased: &dyn AnyObject = &cm;
        assert_eq!(
            erased.object_ref(),
            ObjectRef::new(ConfigMap::gvk(), ObjectKey::namespaced("ns", "cm"))
        );
        assert_eq!(erased.object_ref().to_string(), "ConfigMap ns/cm");
    }

    #[test]
    fn test_without_status() {
        let mut dynamic = DynamicObject::new(ConfigMap::gvk(), ObjectMeta::named("x"));
        dynamic.data.insert("spec".into(), Value::from(1));
        dynamic.data.insert("status".into(), Value::from(2));
        assert_eq!(dynamic.status(), Some(&Value::from(2)));
        assert!(!dynamic.without_status().contains_key("status"));
    }
}
