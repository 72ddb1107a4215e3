//! Built-in core kinds served by every control plane.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::SchemeError;
use crate::meta::{GroupVersionKind, ObjectMeta, Scope};
use crate::object::Object;
use crate::scheme::Scheme;

/// Namespace that exists in every freshly started control plane.
pub const DEFAULT_NAMESPACE: &str = "default";

/// System namespace that exists in every freshly started control plane.
pub const SYSTEM_NAMESPACE: &str = "kube-system";

/// A namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Namespace {
    /// Metadata.
    #[serde(default)]
    pub metadata: ObjectMeta,
}

impl Namespace {
    /// Creates a namespace.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            metadata: ObjectMeta::named(name),
        }
    }
}

impl Object for Namespace {
    fn gvk() -> GroupVersionKind {
        GroupVersionKind::gvk("", "v1", "Namespace")
    }

    fn scope() -> Scope {
        Scope::Cluster
    }

    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}

/// String key/value configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigMap {
    /// Metadata.
    #[serde(default)]
    pub metadata: ObjectMeta,
    /// Configuration entries.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, String>,
}

impl ConfigMap {
    /// Creates an empty config map.
    #[must_use]
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            metadata: ObjectMeta::namespaced(namespace, name),
            data: BTreeMap::new(),
        }
    }
}

impl Object for ConfigMap {
    fn gvk() -> GroupVersionKind {
        GroupVersionKind::gvk("", "v1", "ConfigMap")
    }

    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}

/// Sensitive key/value data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Secret {
    /// Metadata.
    #[serde(default)]
    pub metadata: ObjectMeta,
    /// Secret type, e.g. `Opaque`.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,
    /// Secret entries.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub string_data: BTreeMap<String, String>,
}

impl Secret {
    /// Creates an empty opaque secret.
    #[must_use]
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            metadata: ObjectMeta::namespaced(namespace, name),
            type_: Some("Opaque".to_string()),
            string_data: BTreeMap::new(),
        }
    }
}

impl Object for Secret {
    fn gvk() -> GroupVersionKind {
        GroupVersionKind::gvk("", "v1", "Secret")
    }

    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}

/// Kinds every control plane serves without any installed definitions.
#[must_use]
pub fn builtin_kinds() -> Vec<(GroupVersionKind, Scope)> {
    vec![
        (Namespace::gvk(), Namespace::scope()),
        (ConfigMap::gvk(), ConfigMap::scope()),
        (Secret::gvk(), Secret::scope()),
    ]
}

/// Registers the built-in kinds.
///
/// # Errors
/// Returns an error if a built-in kind was registered with a different scope.
pub fn add_to_scheme(scheme: &mut Scheme) -> Result<(), SchemeError> {
    scheme.register::<Namespace>()?;
    scheme.register::<ConfigMap>()?;
    scheme.register::<Secret>()?;
    Ok(())
}
