//! Prometheus metrics for one work queue.
//!
//! Collectors are registered on the registry passed in, never on the
//! process-global default registry.

use crate::error::RuntimeError;
use prometheus::core::Collector;
use prometheus::{IntCounter, IntCounterVec, IntGauge, Opts, Registry};

/// Counters and gauges for a single named queue.
#[derive(Debug, Clone)]
pub struct QueueMetrics {
    adds: IntCounter,
    retries: IntCounter,
    drops: IntCounter,
    reconciles: IntCounterVec,
    depth: IntGauge,
}

impl QueueMetrics {
    /// Builds the collectors for `queue` and registers them on `registry`.
    pub fn register(queue: &str, registry: &Registry) -> Result<Self, RuntimeError> {
        let opts = |name: &str, help: &str| Opts::new(name, help).const_label("queue", queue);

        let adds = register_collector(
            registry,
            IntCounter::with_opts(opts("workqueue_adds_total", "Keys added to the work queue"))?,
        )?;
        let retries = register_collector(
            registry,
            IntCounter::with_opts(opts(
                "workqueue_retries_total",
                "Keys requeued with backoff after a failed reconcile",
            ))?,
        )?;
        let drops = register_collector(
            registry,
            IntCounter::with_opts(opts(
                "workqueue_drops_total",
                "Keys dropped after exhausting their retries",
            ))?,
        )?;
        let reconciles = register_collector(
            registry,
            IntCounterVec::new(
                opts("reconcile_total", "Reconcile attempts grouped by result"),
                &["result"],
            )?,
        )?;
        let depth = register_collector(
            registry,
            IntGauge::with_opts(opts("workqueue_depth", "Keys waiting to be processed"))?,
        )?;

        Ok(Self {
            adds,
            retries,
            drops,
            reconciles,
            depth,
        })
    }

    pub(crate) fn record_add(&self) {
        self.adds.inc();
    }

    pub(crate) fn record_retry(&self) {
        self.retries.inc();
    }

    pub(crate) fn record_drop(&self) {
        self.drops.inc();
    }

    pub(crate) fn record_reconcile(&self, success: bool) {
        let result = if success { "success" } else { "error" };
        self.reconciles.with_label_values(&[result]).inc();
    }

    pub(crate) fn set_depth(&self, depth: usize) {
        self.depth.set(i64::try_from(depth).unwrap_or(i64::MAX));
    }
}

fn register_collector<C>(registry: &Registry, collector: C) -> Result<C, RuntimeError>
where
    C: Clone + Collector + Send + Sync + 'static,
{
    registry.register(Box::new(collector.clone()))?;
    Ok(collector)
}
