//! Typed change notifications produced by the informer cache.

use std::sync::Arc;

/// How a deletion was observed.
#[derive(Debug)]
pub enum Deleted<K> {
    /// The watch delivered the final state of the object
    Final(Arc<K>),
    /// The object vanished while the watch was down; this is the last state
    /// the cache held for it
    LastKnown(Arc<K>),
}

impl<K> Deleted<K> {
    pub fn object(&self) -> &Arc<K> {
        match self {
            Deleted::Final(obj) | Deleted::LastKnown(obj) => obj,
        }
    }
}

/// A change to one cached object.
#[derive(Debug)]
pub enum Notification<K> {
    Added(Arc<K>),
    Updated { old: Arc<K>, new: Arc<K> },
    Deleted(Deleted<K>),
}

impl<K> Notification<K> {
    /// Latest known state of the object, whatever the change was.
    pub fn object(&self) -> &Arc<K> {
        match self {
            Notification::Added(obj) => obj,
            Notification::Updated { new, .. } => new,
            Notification::Deleted(deleted) => deleted.object(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Notification::Added(_) => "added",
            Notification::Updated { .. } => "updated",
            Notification::Deleted(Deleted::Final(_)) => "deleted",
            Notification::Deleted(Deleted::LastKnown(_)) => "deleted-last-known",
        }
    }
}

impl<K> Clone for Deleted<K> {
    fn clone(&self) -> Self {
        match self {
            Deleted::Final(obj) => Deleted::Final(Arc::clone(obj)),
            Deleted::LastKnown(obj) => Deleted::LastKnown(Arc::clone(obj)),
        }
    }
}

impl<K> Clone for Notification<K> {
    fn clone(&self) -> Self {
        match self {
            Notification::Added(obj) => Notification::Added(Arc::clone(obj)),
            Notification::Updated { old, new } => Notification::Updated {
                old: Arc::clone(old),
                new: Arc::clone(new),
            },
            Notification::Deleted(deleted) => Notification::Deleted(deleted.clone()),
        }
    }
}
