//! Event Router: maps notifications of one resource kind onto queue keys.

use crate::key::ObjectKey;
use crate::notification::Notification;
use crate::queue::WorkQueue;
use kube::Resource;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

type Predicate<K> = Arc<dyn Fn(&K) -> bool + Send + Sync>;
type KeyMapper<K> = Arc<dyn Fn(&K) -> Option<ObjectKey> + Send + Sync>;

/// Filters notifications and pushes the key they map to onto a queue.
///
/// By default every object passes and maps to its own key. Controllers that
/// watch child objects supply a mapper back to the parent's key.
pub struct EventRouter<K> {
    name: String,
    queue: WorkQueue<ObjectKey>,
    predicate: Option<Predicate<K>>,
    mapper: KeyMapper<K>,
}

impl<K: Resource + 'static> EventRouter<K> {
    pub fn new(name: impl Into<String>, queue: WorkQueue<ObjectKey>) -> Self {
        Self {
            name: name.into(),
            queue,
            predicate: None,
            mapper: Arc::new(|obj: &K| ObjectKey::for_object(obj).ok()),
        }
    }

    /// Only objects for which `predicate` holds are routed.
    #[must_use]
    pub fn with_predicate(mut self, predicate: impl Fn(&K) -> bool + Send + Sync + 'static) -> Self {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    /// Replaces the default object-to-key mapping.
    #[must_use]
    pub fn with_key_mapper(
        mut self,
        mapper: impl Fn(&K) -> Option<ObjectKey> + Send + Sync + 'static,
    ) -> Self {
        self.mapper = Arc::new(mapper);
        self
    }

    /// Routes one notification. Returns the key that was queued, if any.
    ///
    /// An update passes the predicate if either side does, so an object that
    /// stops matching still triggers one last reconciliation.
    pub fn route(&self, notification: &Notification<K>) -> Option<ObjectKey> {
        let key = match notification {
            Notification::Updated { old, new } => {
                if !self.accepts(old) && !self.accepts(new) {
                    return None;
                }
                (self.mapper)(new).or_else(|| (self.mapper)(old))
            }
            other => {
                let obj = other.object();
                if !self.accepts(obj) {
                    return None;
                }
                (self.mapper)(obj)
            }
        }?;

        trace!(router = %self.name, kind = notification.kind(), key = %key, "Routing");
        self.queue.add(key.clone());
        Some(key)
    }

    fn accepts(&self, obj: &K) -> bool {
        self.predicate.as_ref().is_none_or(|p| p(obj))
    }
}

impl<K> fmt::Debug for EventRouter<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventRouter")
            .field("name", &self.name)
            .field("queue", &self.queue)
            .finish_non_exhaustive()
    }
}
