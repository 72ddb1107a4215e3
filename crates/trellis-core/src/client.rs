//! Store client contract.
//!
//! # Toyota Way: Standardized Work (標準作業)
//! The harness and the reconciler under test talk to the store through the
//! same [`Client`] handle, so what the test seeds is exactly what the
//! reconciler observes.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::StoreResult;
use crate::meta::GroupVersionKind;
use crate::object::{DynamicObject, Object, ObjectKey, ObjectRef};
use crate::scheme::Scheme;

/// Handle for create/get/list/update/delete against a backing store.
///
/// Every call is an independent, identity-addressed request, so one client
/// can be shared between tasks without extra locking.
#[async_trait]
pub trait Client: Send + Sync {
    /// Creates an object and returns it as stored.
    async fn create(&self, obj: DynamicObject) -> StoreResult<DynamicObject>;

    /// Fetches one object.
    async fn get(&self, object_ref: &ObjectRef) -> StoreResult<DynamicObject>;

    /// Lists objects of a kind, optionally restricted to one namespace.
    async fn list(
        &self,
        gvk: &GroupVersionKind,
        namespace: Option<&str>,
    ) -> StoreResult<Vec<DynamicObject>>;

    /// Replaces an object. Status is left untouched for kinds with a
    /// status subresource.
    async fn update(&self, obj: DynamicObject) -> StoreResult<DynamicObject>;

    /// Replaces only the status of an object.
    async fn update_status(&self, obj: DynamicObject) -> StoreResult<DynamicObject>;

    /// Deletes one object.
    async fn delete(&self, object_ref: &ObjectRef) -> StoreResult<()>;

    /// The scheme this client was built with.
    fn scheme(&self) -> &Scheme;
}

/// Client shared between the harness and the reconciler under test.
pub type SharedClient = Arc<dyn Client>;

/// Typed convenience methods over any [`Client`].
#[async_trait]
pub trait ClientExt: Client {
    /// Fetches and decodes one object.
    async fn get_as<K: Object>(&self, key: &ObjectKey) -> StoreResult<K>;

    /// Lists and decodes objects of a kind.
    async fn list_as<K: Object>(&self, namespace: Option<&str>) -> StoreResult<Vec<K>>;

    /// Creates a typed object and returns it as stored.
    async fn create_typed<K: Object>(&self, obj: &K) -> StoreResult<K>;

    /// Replaces a typed object and returns it as stored.
    async fn update_typed<K: Object>(&self, obj: &K) -> StoreResult<K>;

    /// Replaces the status of a typed object.
    async fn update_status_typed<K: Object>(&self, obj: &K) -> StoreResult<K>;

    /// Deletes a typed object.
    async fn delete_typed<K: Object>(&self, obj: &K) -> StoreResult<()>;
}

#[async_trait]
impl<C: Client + ?Sized> ClientExt for C {
    async fn get_as<K: Object>(&self, key: &ObjectKey) -> StoreResult<K> {
        let object_ref = ObjectRef::new(K::gvk(), key.clone().scoped(K::scope()));
        self.get(&object_ref).await?.try_parse()
    }

    async fn list_as<K: Object>(&self, namespace: Option<&str>) -> StoreResult<Vec<K>> {
        self.list(&K::gvk(), namespace)
            .await?
            .iter()
            .map(DynamicObject::try_parse)
            .collect()
    }

    async fn create_typed<K: Object>(&self, obj: &K) -> StoreResult<K> {
        self.create(DynamicObject::from_typed(obj)?).await?.try_parse()
    }

    async fn update_typed<K: Object>(&self, obj: &K) -> StoreResult<K> {
        self.update(DynamicObject::from_typed(obj)?).await?.try_parse()
    }

    async fn update_status_typed<K: Object>(&self, obj: &K) -> StoreResult<K> {
        self.update_status(DynamicObject::from_typed(obj)?)
            .await?
            .try_parse()
    }

    async fn delete_typed<K: Object>(&self, obj: &K) -> StoreResult<()> {
        self.delete(&ObjectRef::of(obj)).await
    }
}

/// What [`create_or_update`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationResult {
    /// The object did not exist and was created.
    Created,
    /// The object existed and was changed.
    Updated,
    /// The object existed and the mutation left it as it was; nothing was written.
    Unchanged,
}

/// Fetches the object addressed by `obj`, applies `mutate` and writes the
/// result back, creating the object when it does not exist yet.
///
/// On return `obj` holds the stored state. When the mutation does not change
/// the fetched object no write is issued, so repeated calls converge.
pub async fn create_or_update<C, K, F>(
    client: &C,
    obj: &mut K,
    mutate: F,
) -> StoreResult<OperationResult>
where
    C: Client + ?Sized,
    K: Object + PartialEq,
    F: FnOnce(&mut K) -> StoreResult<()> + Send,
{
    let key = obj.key();
    match client.get_as::<K>(&key).await {
        Ok(existing) => {
            *obj = existing.clone();
            mutate(obj)?;
            if *obj == existing {
                return Ok(OperationResult::Unchanged);
            }
            *obj = client.update_typed(obj).await?;
            Ok(OperationResult::Updated)
        }
        Err(err) if err.is_not_found() => {
            mutate(obj)?;
            *obj = client.create_typed(obj).await?;
            Ok(OperationResult::Created)
        }
        Err(err) => Err(err),
    }
}
