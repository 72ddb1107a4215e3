//! Object store owned by the control plane.
//!
//! All API semantics live here: identity normalization, namespace
//! existence, resource versions, generations, the status subresource,
//! namespace cascade on delete, and watch event emission. The server actor
//! only serializes access to it.

use std::collections::{BTreeMap, HashMap};
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::broadcast;
use trellis_core::objects::{self, DEFAULT_NAMESPACE, SYSTEM_NAMESPACE};
use trellis_core::{
    DynamicObject, GroupVersionKind, Namespace, Object, ObjectMeta, ObjectRef, Scope, StoreError,
    StoreResult,
};

use crate::definition::CustomResourceDefinition;
use crate::watch::WatchEvent;

/// Capacity of the watch event ring buffer.
const WATCH_CAPACITY: usize = 1024;

/// Maximum length of an object name.
const MAX_NAME_LEN: usize = 253;

/// How the store serves one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServedKind {
    /// Scope of the kind.
    pub scope: Scope,
    /// Whether status is a separate subresource.
    pub status_subresource: bool,
}

/// In-memory object store with API server semantics.
#[derive(Debug)]
pub struct ObjectStore {
    kinds: HashMap<GroupVersionKind, ServedKind>,
    objects: BTreeMap<ObjectRef, DynamicObject>,
    resource_version: u64,
    events: broadcast::Sender<WatchEvent>,
}

impl Default for ObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectStore {
    /// Creates a store serving the built-in kinds, with the `default` and
    /// `kube-system` namespaces present.
    #[must_use]
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(WATCH_CAPACITY);
        let mut store = Self {
            kinds: HashMap::new(),
            objects: BTreeMap::new(),
            resource_version: 0,
            events,
        };
        for (gvk, scope) in objects::builtin_kinds() {
            store.kinds.insert(
                gvk,
                ServedKind {
                    scope,
                    status_subresource: false,
                },
            );
        }
        for name in [DEFAULT_NAMESPACE, SYSTEM_NAMESPACE] {
            let ns = DynamicObject::new(Namespace::gvk(), ObjectMeta::named(name));
            // Built-in kind, fresh store, valid name: cannot fail.
            let _ = store.create(ns);
        }
        store
    }

    /// Starts serving the kind described by `definition`.
    ///
    /// Re-installing an identical definition is a no-op.
    ///
    /// # Errors
    /// Returns an error if the kind is already served with different settings.
    pub fn install(&mut self, definition: &CustomResourceDefinition) -> Result<(), String> {
        let served = ServedKind {
            scope: definition.scope,
            status_subresource: definition.status_subresource,
        };
        let gvk = definition.gvk();
        match self.kinds.get(&gvk) {
            Some(existing) if *existing == served => Ok(()),
            Some(_) => Err(format!("{gvk} is already served with different settings")),
            None => {
                tracing::debug!(kind = %gvk, plural = %definition.plural(), "serving kind");
                self.kinds.insert(gvk, served);
                Ok(())
            }
        }
    }

    /// Returns how a kind is served.
    #[must_use]
    pub fn served(&self, gvk: &GroupVersionKind) -> Option<ServedKind> {
        self.kinds.get(gvk).copied()
    }

    /// Subscribes to every future change.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<WatchEvent> {
        self.events.subscribe()
    }

    /// Number of stored objects, namespaces included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Stores a new object.
    ///
    /// # Errors
    /// Returns an error if the kind is not served, the object is invalid, its
    /// namespace does not exist, or it already exists.
    pub fn create(&mut self, mut obj: DynamicObject) -> StoreResult<DynamicObject> {
        let served = self.normalize(&mut obj)?;
        let object_ref = obj.object_ref();
        if self.objects.contains_key(&object_ref) {
            return Err(StoreError::already_exists(&obj.gvk.kind, object_ref.key));
        }
        if served.scope.is_namespaced() {
            self.require_namespace(obj.metadata.namespace.as_deref())?;
        }

        obj.metadata.uid = Some(uuid::Uuid::new_v4().to_string());
        obj.metadata.generation = Some(1);
        obj.metadata.creation_timestamp_ms = Some(now_epoch_ms());
        obj.metadata.resource_version = Some(self.next_resource_version());

        self.objects.insert(object_ref, obj.clone());
        self.emit(WatchEvent::Added(obj.clone()));
        Ok(obj)
    }

    /// Fetches one object.
    ///
    /// # Errors
    /// Returns an error if the kind is not served or the object does not exist.
    pub fn get(&self, object_ref: &ObjectRef) -> StoreResult<DynamicObject> {
        let served = self.serve(&object_ref.gvk)?;
        let object_ref = ObjectRef::new(object_ref.gvk.clone(), object_ref.key.clone().scoped(served.scope));
        self.objects
            .get(&object_ref)
            .cloned()
            .ok_or_else(|| StoreError::not_found(&object_ref.gvk.kind, object_ref.key))
    }

    /// Lists objects of a kind, optionally restricted to one namespace.
    ///
    /// # Errors
    /// Returns an error if the kind is not served.
    pub fn list(&self, gvk: &GroupVersionKind, namespace: Option<&str>) -> StoreResult<Vec<DynamicObject>> {
        self.serve(gvk)?;
        Ok(self
            .objects
            .values()
            .filter(|obj| &obj.gvk == gvk)
            .filter(|obj| namespace.is_none() || obj.metadata.namespace.as_deref() == namespace)
            .cloned()
            .collect())
    }

    /// Replaces an object. For kinds with a status subresource the stored
    /// status is kept.
    ///
    /// # Errors
    /// Returns an error if the object does not exist or its resource version
    /// is stale.
    pub fn update(&mut self, obj: DynamicObject) -> StoreResult<DynamicObject> {
        self.replace(obj, Write::Object)
    }

    /// Replaces only the status of an object.
    ///
    /// # Errors
    /// Returns an error if the kind has no status subresource, the object
    /// does not exist, or its resource version is stale.
    pub fn update_status(&mut self, obj: DynamicObject) -> StoreResult<DynamicObject> {
        self.replace(obj, Write::Status)
    }

    /// Deletes one object. Deleting a namespace deletes everything in it.
    ///
    /// Returns every object removed, the addressed one last.
    ///
    /// # Errors
    /// Returns an error if the object does not exist or is protected.
    pub fn delete(&mut self, object_ref: &ObjectRef) -> StoreResult<Vec<DynamicObject>> {
        let existing = self.get(object_ref)?;
        let object_ref = existing.object_ref();
        let is_namespace = existing.gvk == Namespace::gvk();
        if is_namespace && [DEFAULT_NAMESPACE, SYSTEM_NAMESPACE].contains(&existing.metadata.name.as_str()) {
            return Err(StoreError::Forbidden(format!(
                "namespace {} is protected and cannot be deleted",
                existing.metadata.name
            )));
        }

        let mut removed = Vec::new();
        if is_namespace {
            let contained: Vec<ObjectRef> = self
                .objects
                .iter()
                .filter(|(_, obj)| obj.metadata.namespace.as_deref() == Some(existing.metadata.name.as_str()))
                .map(|(r, _)| r.clone())
                .collect();
            if !contained.is_empty() {
                tracing::debug!(namespace = %existing.metadata.name, count = contained.len(), "cascading namespace delete");
            }
            for r in contained {
                if let Some(obj) = self.objects.remove(&r) {
                    removed.push(obj);
                }
            }
        }
        if let Some(obj) = self.objects.remove(&object_ref) {
            removed.push(obj);
        }
        for obj in &removed {
            self.emit(WatchEvent::Deleted(obj.clone()));
        }
        Ok(removed)
    }

    fn replace(&mut self, mut obj: DynamicObject, write: Write) -> StoreResult<DynamicObject> {
        let served = self.normalize(&mut obj)?;
        if write == Write::Status && !served.status_subresource {
            return Err(StoreError::invalid(format!(
                "{} does not have a status subresource",
                obj.gvk.kind
            )));
        }
        let object_ref = obj.object_ref();
        let Some(existing) = self.objects.get(&object_ref) else {
            return Err(StoreError::not_found(&obj.gvk.kind, object_ref.key));
        };

        if let Some(rv) = &obj.metadata.resource_version {
            if existing.metadata.resource_version.as_ref() != Some(rv) {
                return Err(StoreError::conflict(
                    &obj.gvk.kind,
                    object_ref.key,
                    "the object has been modified; please apply your changes to the latest version and try again",
                ));
            }
        }

        let mut next = existing.clone();
        match write {
            Write::Object => {
                let status = existing.status().cloned();
                next.data = obj.data;
                if served.status_subresource {
                    next.data.remove("status");
                    if let Some(status) = status {
                        next.data.insert("status".to_string(), status);
                    }
                }
                next.metadata.labels = obj.metadata.labels;
                next.metadata.annotations = obj.metadata.annotations;
            }
            Write::Status => match obj.data.remove("status") {
                Some(status) => {
                    next.data.insert("status".to_string(), status);
                }
                None => {
                    next.data.remove("status");
                }
            },
        }

        if next == *existing {
            return Ok(next);
        }

        let spec_changed = next.without_status() != existing.without_status();
        let tracks_status_separately = served.status_subresource;
        if spec_changed || (!tracks_status_separately && next.status() != existing.status()) {
            next.metadata.generation = Some(existing.metadata.generation.unwrap_or(0) + 1);
        }
        next.metadata.resource_version = Some(self.next_resource_version());

        self.objects.insert(object_ref, next.clone());
        self.emit(WatchEvent::Modified(next.clone()));
        Ok(next)
    }

    fn serve(&self, gvk: &GroupVersionKind) -> StoreResult<ServedKind> {
        self.served(gvk)
            .ok_or_else(|| StoreError::NoKindMatch(gvk.clone()))
    }

    /// Validates identity and applies scope rules to the object's key.
    fn normalize(&self, obj: &mut DynamicObject) -> StoreResult<ServedKind> {
        let served = self.serve(&obj.gvk)?;
        validate_name(&obj.metadata.name)?;
        if served.scope.is_namespaced() {
            match obj.metadata.namespace.as_deref() {
                Some(ns) if !ns.is_empty() => validate_name(ns)?,
                _ => {
                    return Err(StoreError::invalid(format!(
                        "{} {:?}: namespace is required for a namespaced kind",
                        obj.gvk.kind, obj.metadata.name
                    )));
                }
            }
        } else {
            obj.metadata.namespace = None;
        }
        Ok(served)
    }

    fn require_namespace(&self, namespace: Option<&str>) -> StoreResult<()> {
        let name = namespace.unwrap_or_default();
        let ns_ref = ObjectRef::new(Namespace::gvk(), trellis_core::ObjectKey::cluster(name));
        if self.objects.contains_key(&ns_ref) {
            Ok(())
        } else {
            Err(StoreError::not_found("Namespace", ns_ref.key))
        }
    }

    fn next_resource_version(&mut self) -> String {
        self.resource_version += 1;
        self.resource_version.to_string()
    }

    fn emit(&self, event: WatchEvent) {
        // No subscribers is not an error.
        let _ = self.events.send(event);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Write {
    Object,
    Status,
}

/// Names are lowercase RFC 1123 subdomains.
fn validate_name(name: &str) -> StoreResult<()> {
    if name.is_empty() {
        return Err(StoreError::invalid("metadata.name is required"));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(StoreError::invalid(format!(
            "name {name:?} must be no more than {MAX_NAME_LEN} characters"
        )));
    }
    let valid_chars = name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.');
    let valid_edges = name.starts_with(|c: char| c.is_ascii_alphanumeric())
        && name.ends_with(|c: char| c.is_ascii_alphanumeric());
    if !valid_chars || !valid_edges {
        return Err(StoreError::invalid(format!(
            "name {name:?} must consist of lowercase alphanumeric characters, '-' or '.', and must start and end with an alphanumeric character"
        )));
    }
    Ok(())
}

fn now_epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}
