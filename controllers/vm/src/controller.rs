//! Main controller implementation.
//!
//! Wires informers, the work queue, the worker pool and the probe server
//! together, and runs them until shutdown.

use crate::client::KubeClusterClient;
use crate::config::ControllerConfig;
use crate::error::ControllerError;
use crate::reconciler::Reconciler;
use crate::watcher;
use kube::Client;
use prometheus::Registry;
use reconcile_runtime::{
    probes, ExponentialBackoff, ProbeState, QueueMetrics, RuntimeError, Shutdown, WorkQueue,
    WorkerPool,
};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

const QUEUE_NAME: &str = "virtualmachine";

/// Main controller for VirtualMachine lifecycle management.
pub struct Controller {
    workers: JoinHandle<Result<(), RuntimeError>>,
    background: Vec<JoinHandle<()>>,
}

impl Controller {
    /// Creates the controller and starts its informers, workers and probe
    /// server in background tasks.
    pub async fn new(config: ControllerConfig, shutdown: Shutdown) -> Result<Self, ControllerError> {
        info!("Initializing VM Controller");

        let client = Client::try_default().await?;

        let registry = Registry::new();
        let metrics = QueueMetrics::register(QUEUE_NAME, &registry)?;
        let queue = WorkQueue::with_config(QUEUE_NAME, ExponentialBackoff::default(), Some(metrics));

        let (caches, mut background) = watcher::start(&client, &config, &queue, &shutdown);

        let probe_state = ProbeState::new(registry)
            .track(&caches.vms)
            .track(&caches.pods)
            .track(&caches.services)
            .track(&caches.credentials);
        let probe_addr = config.metrics_addr;
        let probe_shutdown = shutdown.clone();
        background.push(tokio::spawn(async move {
            if let Err(e) = probes::serve(probe_addr, probe_state, probe_shutdown).await {
                error!("Probe server failed: {}", e);
            }
        }));

        let pool = WorkerPool::new(
            Arc::new(Reconciler::new(
                caches.clone(),
                Arc::new(KubeClusterClient::new(client)),
                config.clone(),
            )),
            queue,
        )
        .workers(config.workers)
        .max_retries(config.max_retries)
        .wait_for(&caches.vms)
        .wait_for(&caches.pods)
        .wait_for(&caches.services)
        .wait_for(&caches.credentials);

        let workers = tokio::spawn(pool.run(shutdown));

        Ok(Self {
            workers,
            background,
        })
    }

    /// Runs the controller until shutdown.
    pub async fn run(self) -> Result<(), ControllerError> {
        info!("VM Controller running");

        let result = self
            .workers
            .await
            .map_err(|e| ControllerError::Runtime(RuntimeError::Join(e)))?;

        for handle in self.background {
            if let Err(e) = handle.await {
                warn!("Background task failed: {}", e);
            }
        }

        info!("VM Controller stopped");
        result.map_err(ControllerError::from)
    }
}
