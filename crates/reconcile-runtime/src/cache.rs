//! Informer cache.
//!
//! [`store`] returns a reader/writer pair over the same object map. The
//! writer is fed raw watch events and reports the [`Notification`]s they
//! imply; readers only ever see whole snapshots.

use crate::key::ObjectKey;
use crate::notification::{Deleted, Notification};
use kube::Resource;
use kube_runtime::watcher;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::watch;
use tracing::{debug, warn};

type Objects<K> = HashMap<ObjectKey, Arc<K>>;

/// Creates an empty cache and the writer that fills it.
pub fn store<K>() -> (Cache<K>, CacheWriter<K>) {
    let objects = Arc::new(RwLock::new(HashMap::new()));
    let (synced_tx, synced_rx) = watch::channel(false);
    (
        Cache {
            objects: Arc::clone(&objects),
            synced: synced_rx,
        },
        CacheWriter {
            objects,
            relist: None,
            synced: synced_tx,
        },
    )
}

/// Read side of the informer cache. Cheap to clone.
pub struct Cache<K> {
    objects: Arc<RwLock<Objects<K>>>,
    synced: watch::Receiver<bool>,
}

impl<K> Cache<K> {
    /// Last observed version of the object at `key`.
    pub fn get(&self, key: &ObjectKey) -> Option<Arc<K>> {
        self.read().get(key).cloned()
    }

    /// Snapshot of every cached object, in no particular order.
    pub fn list(&self) -> Vec<Arc<K>> {
        self.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// True once the first full listing has been applied.
    pub fn is_synced(&self) -> bool {
        *self.synced.borrow()
    }

    /// Signal that flips to `true` on the first completed listing.
    pub fn synced_signal(&self) -> watch::Receiver<bool> {
        self.synced.clone()
    }

    /// Waits for the first completed listing. Returns `false` if the writer
    /// went away before that happened.
    pub async fn wait_until_synced(&self) -> bool {
        let mut rx = self.synced.clone();
        rx.wait_for(|synced| *synced).await.is_ok()
    }

    fn read(&self) -> RwLockReadGuard<'_, Objects<K>> {
        self.objects.read().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(any(test, feature = "test-util"))]
impl<K: Resource> Cache<K> {
    /// A synced cache holding exactly `objects`.
    pub fn from_objects(objects: impl IntoIterator<Item = K>) -> Self {
        let map = objects
            .into_iter()
            .filter_map(|obj| Some((ObjectKey::for_object(&obj).ok()?, Arc::new(obj))))
            .collect();
        let (_tx, synced) = watch::channel(true);
        Self {
            objects: Arc::new(RwLock::new(map)),
            synced,
        }
    }
}

impl<K> Clone for Cache<K> {
    fn clone(&self) -> Self {
        Self {
            objects: Arc::clone(&self.objects),
            synced: self.synced.clone(),
        }
    }
}

impl<K> fmt::Debug for Cache<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("len", &self.len())
            .field("synced", &self.is_synced())
            .finish()
    }
}

/// Write side of the informer cache.
pub struct CacheWriter<K> {
    objects: Arc<RwLock<Objects<K>>>,
    /// Objects seen since the last `Init`, swapped in at `InitDone`
    relist: Option<Objects<K>>,
    synced: watch::Sender<bool>,
}

impl<K: Resource> CacheWriter<K> {
    /// Applies one watch event and returns the changes it caused.
    pub fn apply(&mut self, event: watcher::Event<K>) -> Vec<Notification<K>> {
        match event {
            watcher::Event::Apply(obj) => self.upsert(obj).into_iter().collect(),
            watcher::Event::Delete(obj) => {
                let Some(key) = key_of(&obj) else {
                    return Vec::new();
                };
                self.write().remove(&key);
                vec![Notification::Deleted(Deleted::Final(Arc::new(obj)))]
            }
            watcher::Event::Init => {
                debug!("Relist started");
                self.relist = Some(HashMap::new());
                Vec::new()
            }
            watcher::Event::InitApply(obj) => {
                let Some(key) = key_of(&obj) else {
                    return Vec::new();
                };
                self.relist
                    .get_or_insert_with(HashMap::new)
                    .insert(key, Arc::new(obj));
                Vec::new()
            }
            watcher::Event::InitDone => self.finish_relist(),
        }
    }

    fn upsert(&mut self, obj: K) -> Option<Notification<K>> {
        let key = key_of(&obj)?;
        let new = Arc::new(obj);
        let old = self.write().insert(key, Arc::clone(&new));
        match old {
            None => Some(Notification::Added(new)),
            Some(old) if same_version(&*old, &*new) => None,
            Some(old) => Some(Notification::Updated { old, new }),
        }
    }

    fn finish_relist(&mut self) -> Vec<Notification<K>> {
        let fresh = self.relist.take().unwrap_or_default();
        let mut notifications = Vec::new();

        {
            let mut objects = self.write();
            let previous = std::mem::replace(&mut *objects, fresh);

            for (key, new) in objects.iter() {
                match previous.get(key) {
                    None => notifications.push(Notification::Added(Arc::clone(new))),
                    Some(old) if !same_version(&**old, &**new) => {
                        notifications.push(Notification::Updated {
                            old: Arc::clone(old),
                            new: Arc::clone(new),
                        });
                    }
                    Some(_) => {}
                }
            }

            for (key, old) in previous {
                if !objects.contains_key(&key) {
                    notifications.push(Notification::Deleted(Deleted::LastKnown(old)));
                }
            }
        }

        self.synced.send_if_modified(|synced| {
            let first = !*synced;
            *synced = true;
            first
        });
        debug!(changes = notifications.len(), "Relist complete");
        notifications
    }

    fn write(&self) -> RwLockWriteGuard<'_, Objects<K>> {
        self.objects.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<K> fmt::Debug for CacheWriter<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheWriter")
            .field("relisting", &self.relist.is_some())
            .finish_non_exhaustive()
    }
}

fn key_of<K: Resource>(obj: &K) -> Option<ObjectKey> {
    match ObjectKey::for_object(obj) {
        Ok(key) => Some(key),
        Err(e) => {
            warn!("Ignoring watched object: {}", e);
            None
        }
    }
}

fn same_version<K: Resource>(old: &K, new: &K) -> bool {
    let (old, new) = (&old.meta().resource_version, &new.meta().resource_version);
    old.is_some() && old == new
}
