//! Worker pool: N loops pulling keys off one queue into a reconciler.

use crate::cache::Cache;
use crate::error::RuntimeError;
use crate::key::ObjectKey;
use crate::queue::WorkQueue;
use crate::shutdown::Shutdown;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Default number of retries before a failing key is dropped.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Level-triggered reconcile function for one kind of key.
///
/// Implementations must re-read current state from their caches; the key is
/// the only thing carried through the queue.
#[async_trait]
pub trait Reconcile: Send + Sync + 'static {
    type Error: fmt::Display + Send + Sync + 'static;

    async fn reconcile(&self, key: &ObjectKey) -> Result<(), Self::Error>;
}

/// Runs a [`Reconcile`] against a [`WorkQueue`].
pub struct WorkerPool<R> {
    reconciler: Arc<R>,
    queue: WorkQueue<ObjectKey>,
    workers: usize,
    max_retries: u32,
    sync_signals: Vec<watch::Receiver<bool>>,
}

impl<R: Reconcile> WorkerPool<R> {
    pub fn new(reconciler: Arc<R>, queue: WorkQueue<ObjectKey>) -> Self {
        Self {
            reconciler,
            queue,
            workers: 1,
            max_retries: DEFAULT_MAX_RETRIES,
            sync_signals: Vec::new(),
        }
    }

    #[must_use]
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    #[must_use]
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Holds workers back until `cache` has completed its first listing.
    #[must_use]
    pub fn wait_for<K>(mut self, cache: &Cache<K>) -> Self {
        self.sync_signals.push(cache.synced_signal());
        self
    }

    /// Runs until `shutdown` fires, then drains the queue and joins every
    /// worker so in-flight reconciles complete.
    pub async fn run(self, shutdown: Shutdown) -> Result<(), RuntimeError> {
        let Self {
            reconciler,
            queue,
            workers,
            max_retries,
            sync_signals,
        } = self;

        info!("Waiting for {} caches to sync ({})", sync_signals.len(), queue.name());
        for mut signal in sync_signals {
            tokio::select! {
                synced = signal.wait_for(|synced| *synced) => {
                    if synced.is_err() {
                        warn!("Cache closed before its first sync, {} workers not started", queue.name());
                        queue.shut_down();
                        return Ok(());
                    }
                }
                () = shutdown.cancelled() => {
                    queue.shut_down();
                    return Ok(());
                }
            }
        }

        info!("Starting {} {} workers", workers, queue.name());
        let handles: Vec<_> = (0..workers)
            .map(|id| {
                let reconciler = Arc::clone(&reconciler);
                let queue = queue.clone();
                tokio::spawn(async move {
                    while let Some(key) = queue.get().await {
                        process(&*reconciler, &queue, key, max_retries).await;
                    }
                    debug!(worker = id, "Worker exiting");
                })
            })
            .collect();

        shutdown.cancelled().await;
        info!("Shutting down {} workers", queue.name());
        queue.shut_down();

        for handle in handles {
            handle.await?;
        }
        Ok(())
    }
}

async fn process<R: Reconcile>(
    reconciler: &R,
    queue: &WorkQueue<ObjectKey>,
    key: ObjectKey,
    max_retries: u32,
) {
    debug!("Reconciling {}", key);
    match reconciler.reconcile(&key).await {
        Ok(()) => {
            queue.forget(&key);
            if let Some(metrics) = queue.metrics() {
                metrics.record_reconcile(true);
            }
        }
        Err(e) => {
            if let Some(metrics) = queue.metrics() {
                metrics.record_reconcile(false);
            }
            let attempts = queue.num_requeues(&key);
            if attempts < max_retries {
                warn!("Error reconciling {} (attempt {}): {}", key, attempts + 1, e);
                queue.add_rate_limited(key.clone());
            } else {
                error!("Dropping {} after {} retries: {}", key, attempts, e);
                queue.forget(&key);
                if let Some(metrics) = queue.metrics() {
                    metrics.record_drop();
                }
            }
        }
    }
    queue.done(&key);
}

impl<R> fmt::Debug for WorkerPool<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("queue", &self.queue)
            .field("workers", &self.workers)
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backoff::ExponentialBackoff;
    use crate::cache::store;
    use k8s_openapi::api::core::v1::ConfigMap;
    use kube_runtime::watcher;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<HashMap<ObjectKey, u32>>,
        fail: bool,
    }

    impl Recorder {
        fn calls(&self, key: &ObjectKey) -> u32 {
            self.calls.lock().unwrap().get(key).copied().unwrap_or(0)
        }
    }

    #[async_trait]
    impl Reconcile for Recorder {
        type Error = String;

        async fn reconcile(&self, key: &ObjectKey) -> Result<(), String> {
            *self.calls.lock().unwrap().entry(key.clone()).or_insert(0) += 1;
            if self.fail {
                Err("boom".to_string())
            } else {
                Ok(())
            }
        }
    }

    fn fast_queue() -> WorkQueue<ObjectKey> {
        WorkQueue::with_config(
            "test",
            ExponentialBackoff::new(Duration::from_millis(1), Duration::from_millis(5)),
            None,
        )
    }

    async fn eventually(mut check: impl FnMut() -> bool) {
        for _ in 0..200 {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached");
    }

    #[tokio::test]
    async fn test_success_reconciles_once() {
        let recorder = Arc::new(Recorder::default());
        let queue = fast_queue();
        let key = ObjectKey::namespaced("default", "vm1");
        queue.add(key.clone());

        let (trigger, shutdown) = Shutdown::new();
        let pool = WorkerPool::new(Arc::clone(&recorder), queue.clone()).workers(3);
        let handle = tokio::spawn(pool.run(shutdown));

        eventually(|| recorder.calls(&key) == 1).await;
        assert_eq!(queue.num_requeues(&key), 0);

        trigger.trigger();
        handle.await.unwrap().unwrap();
        assert_eq!(recorder.calls(&key), 1);
    }

    #[tokio::test]
    async fn test_failing_key_is_dropped_after_max_retries() {
        let recorder = Arc::new(Recorder {
            fail: true,
            ..Default::default()
        });
        let queue = fast_queue();
        let key = ObjectKey::namespaced("default", "broken");
        queue.add(key.clone());

        let (trigger, shutdown) = Shutdown::new();
        let pool = WorkerPool::new(Arc::clone(&recorder), queue.clone()).max_retries(2);
        let handle = tokio::spawn(pool.run(shutdown));

        // First attempt plus two retries
        eventually(|| recorder.calls(&key) == 3).await;
        eventually(|| queue.num_requeues(&key) == 0).await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(recorder.calls(&key), 3);

        trigger.trigger();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_workers_wait_for_cache_sync() {
        let recorder = Arc::new(Recorder::default());
        let queue = fast_queue();
        let key = ObjectKey::namespaced("default", "vm1");
        queue.add(key.clone());

        let (cache, mut writer) = store::<ConfigMap>();
        let (trigger, shutdown) = Shutdown::new();
        let pool = WorkerPool::new(Arc::clone(&recorder), queue.clone()).wait_for(&cache);
        let handle = tokio::spawn(pool.run(shutdown));

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(recorder.calls(&key), 0);

        writer.apply(watcher::Event::Init);
        writer.apply(watcher::Event::InitDone);
        eventually(|| recorder.calls(&key) == 1).await;

        trigger.trigger();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_before_sync_returns() {
        let recorder = Arc::new(Recorder::default());
        let queue = fast_queue();
        let (cache, _writer) = store::<ConfigMap>();
        let (trigger, shutdown) = Shutdown::new();
        trigger.trigger();

        WorkerPool::new(recorder, queue.clone())
            .wait_for(&cache)
            .run(shutdown)
            .await
            .unwrap();
        assert!(queue.is_shutting_down());
    }
}
