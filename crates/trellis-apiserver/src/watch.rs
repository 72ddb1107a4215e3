//! Change notifications.

use tokio::sync::broadcast;
use trellis_core::{DynamicObject, GroupVersionKind};

/// One change to a stored object.
#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent {
    /// The object was created.
    Added(DynamicObject),
    /// The object was updated.
    Modified(DynamicObject),
    /// The object was deleted.
    Deleted(DynamicObject),
}

impl WatchEvent {
    /// The object the event is about.
    #[must_use]
    pub const fn object(&self) -> &DynamicObject {
        match self {
            Self::Added(obj) | Self::Modified(obj) | Self::Deleted(obj) => obj,
        }
    }
}

/// Stream of changes to one kind.
#[derive(Debug)]
pub struct WatchStream {
    gvk: GroupVersionKind,
    receiver: broadcast::Receiver<WatchEvent>,
}

impl WatchStream {
    pub(crate) const fn new(gvk: GroupVersionKind, receiver: broadcast::Receiver<WatchEvent>) -> Self {
        Self { gvk, receiver }
    }

    /// Waits for the next change to the watched kind.
    ///
    /// Returns `None` once the control plane has stopped. Events dropped
    /// because the watcher fell behind are skipped.
    pub async fn next(&mut self) -> Option<WatchEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if event.object().gvk == self.gvk => return Some(event),
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(kind = %self.gvk, skipped, "watcher fell behind, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use trellis_core::{ConfigMap, Namespace, Object};

    use super::*;
    use crate::store::ObjectStore;

    #[test]
    fn test_stream_filters_by_kind_and_ends_with_store() {
        let mut store = ObjectStore::new();
        let mut stream = WatchStream::new(ConfigMap::gvk(), store.subscribe());

        store
            .create(DynamicObject::from_typed(&Namespace::new("other")).unwrap())
            .unwrap();
        store
            .create(DynamicObject::from_typed(&ConfigMap::new("other", "cm")).unwrap())
            .unwrap();

        let event = tokio_test::block_on(stream.next()).unwrap();
        assert!(matches!(&event, WatchEvent::Added(_)));
        assert_eq!(event.object().key().to_string(), "other/cm");

        drop(store);
        assert!(tokio_test::block_on(stream.next()).is_none());
    }
}
