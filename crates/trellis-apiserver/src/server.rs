//! Control plane actor.
//!
//! The [`ObjectStore`] is owned by a single task. Requests arrive over an
//! mpsc mailbox and are answered over oneshot channels, so every operation
//! is applied atomically and in arrival order. [`ServerHandle`] is the
//! cloneable front door.

use tokio::sync::{broadcast, mpsc, oneshot};
use trellis_core::{DynamicObject, GroupVersionKind, ObjectRef, StoreError, StoreResult};

use crate::store::ObjectStore;
use crate::watch::WatchEvent;

/// Messages understood by the control plane actor.
#[derive(Debug)]
pub enum ApiMessage {
    /// Create an object.
    Create {
        /// Object to create.
        object: DynamicObject,
        /// Response channel.
        respond_to: oneshot::Sender<StoreResult<DynamicObject>>,
    },
    /// Fetch an object.
    Get {
        /// Object to fetch.
        object_ref: ObjectRef,
        /// Response channel.
        respond_to: oneshot::Sender<StoreResult<DynamicObject>>,
    },
    /// List objects of a kind.
    List {
        /// Kind to list.
        gvk: GroupVersionKind,
        /// Restrict to one namespace.
        namespace: Option<String>,
        /// Response channel.
        respond_to: oneshot::Sender<StoreResult<Vec<DynamicObject>>>,
    },
    /// Replace an object.
    Update {
        /// New object.
        object: DynamicObject,
        /// Response channel.
        respond_to: oneshot::Sender<StoreResult<DynamicObject>>,
    },
    /// Replace the status of an object.
    UpdateStatus {
        /// Object carrying the new status.
        object: DynamicObject,
        /// Response channel.
        respond_to: oneshot::Sender<StoreResult<DynamicObject>>,
    },
    /// Delete an object.
    Delete {
        /// Object to delete.
        object_ref: ObjectRef,
        /// Response channel.
        respond_to: oneshot::Sender<StoreResult<()>>,
    },
    /// Subscribe to changes.
    Watch {
        /// Response channel.
        respond_to: oneshot::Sender<broadcast::Receiver<WatchEvent>>,
    },
    /// Readiness probe.
    Ping {
        /// Response channel.
        respond_to: oneshot::Sender<()>,
    },
    /// Stop serving.
    Shutdown {
        /// Response channel.
        respond_to: oneshot::Sender<()>,
    },
}

/// Cloneable handle to a running control plane.
#[derive(Debug, Clone)]
pub struct ServerHandle {
    sender: mpsc::Sender<ApiMessage>,
}

impl ServerHandle {
    /// Spawns the actor owning `store` and returns its handle and task.
    #[must_use]
    pub fn spawn(store: ObjectStore, mailbox_capacity: usize) -> (Self, tokio::task::JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(mailbox_capacity.max(1));
        let server = ApiServer { store, receiver };
        let task = tokio::spawn(server.run());
        (Self { sender }, task)
    }

    /// Returns true once the actor has stopped accepting requests.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    async fn call<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> ApiMessage) -> StoreResult<T> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(build(tx))
            .await
            .map_err(|e| StoreError::unavailable(format!("channel send failed: {e}")))?;
        rx.await
            .map_err(|e| StoreError::unavailable(format!("response receive failed: {e}")))
    }

    /// Creates an object.
    pub async fn create(&self, object: DynamicObject) -> StoreResult<DynamicObject> {
        self.call(|respond_to| ApiMessage::Create { object, respond_to }).await?
    }

    /// Fetches an object.
    pub async fn get(&self, object_ref: ObjectRef) -> StoreResult<DynamicObject> {
        self.call(|respond_to| ApiMessage::Get { object_ref, respond_to }).await?
    }

    /// Lists objects of a kind.
    pub async fn list(&self, gvk: GroupVersionKind, namespace: Option<String>) -> StoreResult<Vec<DynamicObject>> {
        self.call(|respond_to| ApiMessage::List {
            gvk,
            namespace,
            respond_to,
        })
        .await?
    }

    /// Replaces an object.
    pub async fn update(&self, object: DynamicObject) -> StoreResult<DynamicObject> {
        self.call(|respond_to| ApiMessage::Update { object, respond_to }).await?
    }

    /// Replaces the status of an object.
    pub async fn update_status(&self, object: DynamicObject) -> StoreResult<DynamicObject> {
        self.call(|respond_to| ApiMessage::UpdateStatus { object, respond_to })
            .await?
    }

    /// Deletes an object.
    pub async fn delete(&self, object_ref: ObjectRef) -> StoreResult<()> {
        self.call(|respond_to| ApiMessage::Delete { object_ref, respond_to }).await?
    }

    /// Subscribes to every future change.
    pub async fn watch(&self) -> StoreResult<broadcast::Receiver<WatchEvent>> {
        self.call(|respond_to| ApiMessage::Watch { respond_to }).await
    }

    /// Waits until the actor answers.
    pub async fn ping(&self) -> StoreResult<()> {
        self.call(|respond_to| ApiMessage::Ping { respond_to }).await
    }

    /// Asks the actor to stop and waits for the acknowledgement.
    pub async fn shutdown(&self) -> StoreResult<()> {
        self.call(|respond_to| ApiMessage::Shutdown { respond_to }).await
    }
}

/// Task owning the store.
struct ApiServer {
    store: ObjectStore,
    receiver: mpsc::Receiver<ApiMessage>,
}

impl ApiServer {
    async fn run(mut self) {
        tracing::debug!("control plane started");
        while let Some(message) = self.receiver.recv().await {
            if let ApiMessage::Shutdown { respond_to } = message {
                self.receiver.close();
                let _ = respond_to.send(());
                break;
            }
            self.handle_message(message);
        }
        tracing::debug!(objects = self.store.len(), "control plane stopped");
    }

    fn handle_message(&mut self, message: ApiMessage) {
        match message {
            ApiMessage::Create { object, respond_to } => {
                let _ = respond_to.send(self.store.create(object));
            }
            ApiMessage::Get { object_ref, respond_to } => {
                let _ = respond_to.send(self.store.get(&object_ref));
            }
            ApiMessage::List {
                gvk,
                namespace,
                respond_to,
            } => {
                let _ = respond_to.send(self.store.list(&gvk, namespace.as_deref()));
            }
            ApiMessage::Update { object, respond_to } => {
                let _ = respond_to.send(self.store.update(object));
            }
            ApiMessage::UpdateStatus { object, respond_to } => {
                let _ = respond_to.send(self.store.update_status(object));
            }
            ApiMessage::Delete { object_ref, respond_to } => {
                let result = self.store.delete(&object_ref).map(|removed| {
                    tracing::trace!(object = %object_ref, removed = removed.len(), "deleted");
                });
                let _ = respond_to.send(result);
            }
            ApiMessage::Watch { respond_to } => {
                let _ = respond_to.send(self.store.subscribe());
            }
            ApiMessage::Ping { respond_to } | ApiMessage::Shutdown { respond_to } => {
                let _ = respond_to.send(());
            }
        }
    }
}
