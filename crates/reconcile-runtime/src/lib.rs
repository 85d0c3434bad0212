//! Controller machinery shared by the RancherVM controllers.
//!
//! Watch streams feed an informer [`Cache`]; every change the cache observes
//! becomes a [`Notification`], which [`EventRouter`]s turn into [`ObjectKey`]s
//! on a deduplicating [`WorkQueue`]. A [`WorkerPool`] drains the queue into a
//! [`Reconcile`] implementation, retrying failures with exponential backoff.

pub mod backoff;
pub mod cache;
pub mod error;
pub mod informer;
pub mod key;
pub mod metrics;
pub mod notification;
pub mod probes;
pub mod queue;
pub mod router;
pub mod shutdown;
pub mod worker;

pub use backoff::ExponentialBackoff;
pub use cache::{store, Cache, CacheWriter};
pub use error::RuntimeError;
pub use informer::{watch_stream, Informer};
pub use key::ObjectKey;
pub use metrics::QueueMetrics;
pub use notification::{Deleted, Notification};
pub use probes::ProbeState;
pub use queue::WorkQueue;
pub use router::EventRouter;
pub use shutdown::{shutdown_on_ctrl_c, Shutdown, ShutdownTrigger};
pub use worker::{Reconcile, WorkerPool};
