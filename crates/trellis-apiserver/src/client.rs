//! Client for a local control plane.

use std::sync::Arc;

use async_trait::async_trait;
use trellis_core::{Client, DynamicObject, GroupVersionKind, ObjectRef, Scheme, StoreError, StoreResult};

use crate::server::ServerHandle;
use crate::watch::WatchStream;

/// Connection details returned by a started environment.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    handle: ServerHandle,
    endpoint: String,
}

impl ClientConfig {
    pub(crate) const fn new(handle: ServerHandle, endpoint: String) -> Self {
        Self { handle, endpoint }
    }

    /// Address of the control plane, for logging.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// [`Client`] talking to a local control plane.
///
/// Only kinds registered in the client's [`Scheme`] may be used.
#[derive(Debug, Clone)]
pub struct StoreClient {
    handle: ServerHandle,
    scheme: Arc<Scheme>,
}

impl StoreClient {
    /// Builds a client from connection details and a scheme.
    ///
    /// # Errors
    /// Returns an error if the control plane is not accepting requests.
    pub fn new(config: &ClientConfig, scheme: Arc<Scheme>) -> StoreResult<Self> {
        if config.handle.is_closed() {
            return Err(StoreError::unavailable(format!(
                "control plane at {} is not running",
                config.endpoint
            )));
        }
        Ok(Self {
            handle: config.handle.clone(),
            scheme,
        })
    }

    /// Streams changes to one kind.
    ///
    /// # Errors
    /// Returns an error if the kind is not registered or the control plane
    /// is gone.
    pub async fn watch(&self, gvk: &GroupVersionKind) -> StoreResult<WatchStream> {
        self.check_registered(gvk)?;
        let receiver = self.handle.watch().await?;
        Ok(WatchStream::new(gvk.clone(), receiver))
    }

    fn check_registered(&self, gvk: &GroupVersionKind) -> StoreResult<()> {
        if self.scheme.recognizes(gvk) {
            Ok(())
        } else {
            Err(StoreError::NotRegistered(gvk.clone()))
        }
    }
}

#[async_trait]
impl Client for StoreClient {
    async fn create(&self, obj: DynamicObject) -> StoreResult<DynamicObject> {
        self.check_registered(&obj.gvk)?;
        self.handle.create(obj).await
    }

    async fn get(&self, object_ref: &ObjectRef) -> StoreResult<DynamicObject> {
        self.check_registered(&object_ref.gvk)?;
        self.handle.get(object_ref.clone()).await
    }

    async fn list(
        &self,
        gvk: &GroupVersionKind,
        namespace: Option<&str>,
    ) -> StoreResult<Vec<DynamicObject>> {
        self.check_registered(gvk)?;
        self.handle
            .list(gvk.clone(), namespace.map(str::to_string))
            .await
    }

    async fn update(&self, obj: DynamicObject) -> StoreResult<DynamicObject> {
        self.check_registered(&obj.gvk)?;
        self.handle.update(obj).await
    }

    async fn update_status(&self, obj: DynamicObject) -> StoreResult<DynamicObject> {
        self.check_registered(&obj.gvk)?;
        self.handle.update_status(obj).await
    }

    async fn delete(&self, object_ref: &ObjectRef) -> StoreResult<()> {
        self.check_registered(&object_ref.gvk)?;
        self.handle.delete(object_ref.clone()).await
    }

    fn scheme(&self) -> &Scheme {
        &self.scheme
    }
}
