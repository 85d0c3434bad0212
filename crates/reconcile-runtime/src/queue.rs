//! Deduplicating, rate-limited work queue.
//!
//! A key is in at most one of two places at a time: waiting in the queue, or
//! being processed by exactly one worker. Adding a key that is already waiting
//! is a no-op; adding a key that is being processed marks it dirty, and
//! [`WorkQueue::done`] puts it back so the next attempt sees the latest state.

use crate::backoff::ExponentialBackoff;
use crate::metrics::QueueMetrics;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::hash::Hash;
use std::pin::pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tracing::trace;

struct State<T> {
    queue: VecDeque<T>,
    /// Keys that need processing: waiting in `queue`, or re-added in flight
    dirty: HashSet<T>,
    processing: HashSet<T>,
    /// Consecutive failures per key
    failures: HashMap<T, u32>,
    shutting_down: bool,
}

struct Inner<T> {
    name: String,
    state: Mutex<State<T>>,
    notify: Notify,
    backoff: ExponentialBackoff,
    metrics: Option<QueueMetrics>,
}

/// Shared handle to a work queue. Clones refer to the same queue.
pub struct WorkQueue<T> {
    inner: Arc<Inner<T>>,
}

impl<T> WorkQueue<T>
where
    T: Clone + Eq + Hash + Send + 'static,
{
    /// Queue with the default per-item backoff and no metrics.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(name, ExponentialBackoff::default(), None)
    }

    /// Queue whose rate-limited requeues follow `backoff`. Depth and
    /// reconcile outcomes go to `metrics` when given.
    pub fn with_config(
        name: impl Into<String>,
        backoff: ExponentialBackoff,
        metrics: Option<QueueMetrics>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                state: Mutex::new(State {
                    queue: VecDeque::new(),
                    dirty: HashSet::new(),
                    processing: HashSet::new(),
                    failures: HashMap::new(),
                    shutting_down: false,
                }),
                notify: Notify::new(),
                backoff,
                metrics,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn metrics(&self) -> Option<&QueueMetrics> {
        self.inner.metrics.as_ref()
    }

    /// Marks `item` as needing processing. Ignored after shutdown.
    pub fn add(&self, item: T) {
        let mut state = self.lock();
        if state.shutting_down || !state.dirty.insert(item.clone()) {
            return;
        }
        if let Some(metrics) = &self.inner.metrics {
            metrics.record_add();
        }
        if state.processing.contains(&item) {
            // Picked up again by `done`
            return;
        }
        state.queue.push_back(item);
        self.record_depth(&state);
        drop(state);
        self.inner.notify.notify_one();
    }

    /// Waits for the next item. `None` once the queue is shut down and every
    /// waiting item has been handed out.
    pub async fn get(&self) -> Option<T> {
        loop {
            let mut notified = pin!(self.inner.notify.notified());
            // Register before inspecting the state so a concurrent add or
            // shutdown cannot slip between the check and the wait.
            notified.as_mut().enable();
            {
                let mut state = self.lock();
                if let Some(item) = state.queue.pop_front() {
                    state.dirty.remove(&item);
                    state.processing.insert(item.clone());
                    self.record_depth(&state);
                    return Some(item);
                }
                if state.shutting_down {
                    return None;
                }
            }
            notified.await;
        }
    }

    /// Finishes processing of `item`, requeueing it if it was re-added meanwhile.
    pub fn done(&self, item: &T) {
        let mut state = self.lock();
        state.processing.remove(item);
        if state.dirty.contains(item) {
            state.queue.push_back(item.clone());
            self.record_depth(&state);
            drop(state);
            self.inner.notify.notify_one();
        }
    }

    /// Clears the failure count of `item`.
    pub fn forget(&self, item: &T) {
        self.lock().failures.remove(item);
    }

    /// How many times `item` has been requeued with backoff since it was last
    /// forgotten.
    pub fn num_requeues(&self, item: &T) -> u32 {
        self.lock().failures.get(item).copied().unwrap_or(0)
    }

    /// Re-adds `item` after its backoff delay and bumps its failure count.
    pub fn add_rate_limited(&self, item: T) {
        let delay = {
            let mut state = self.lock();
            let failures = state.failures.entry(item.clone()).or_insert(0);
            let delay = self.inner.backoff.delay_for_attempt(*failures);
            *failures += 1;
            delay
        };
        if let Some(metrics) = &self.inner.metrics {
            metrics.record_retry();
        }
        self.add_after(item, delay);
    }

    /// Adds `item` once `delay` has elapsed.
    pub fn add_after(&self, item: T, delay: Duration) {
        if self.is_shutting_down() {
            return;
        }
        if delay.is_zero() {
            self.add(item);
            return;
        }
        trace!(queue = %self.inner.name, ?delay, "Delaying add");
        let queue = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            queue.add(item);
        });
    }

    /// Stops accepting new items and wakes every waiting `get`.
    pub fn shut_down(&self) {
        self.lock().shutting_down = true;
        self.inner.notify.notify_waiters();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.lock().shutting_down
    }

    /// Number of items waiting (not counting those being processed).
    pub fn len(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().queue.is_empty()
    }

    fn record_depth(&self, state: &State<T>) {
        if let Some(metrics) = &self.inner.metrics {
            metrics.set_depth(state.queue.len());
        }
    }

    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> Clone for WorkQueue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for WorkQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkQueue")
            .field("name", &self.inner.name)
            .finish_non_exhaustive()
    }
}
