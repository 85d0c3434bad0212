//! Main controller implementation.

use crate::client::KubeArpTableClient;
use crate::config::ControllerConfig;
use crate::error::ControllerError;
use crate::reconciler::ArpReconciler;
use crate::sync::ArpTableSync;
use crds::{ARPTable, VirtualMachine};
use kube::{Api, Client};
use kube_runtime::watcher;
use prometheus::Registry;
use reconcile_runtime::{
    probes, store, watch_stream, EventRouter, ExponentialBackoff, Informer, ProbeState, QueueMetrics,
    RuntimeError, Shutdown, WorkQueue, WorkerPool,
};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

const QUEUE_NAME: &str = "arptable";

/// IP discovery controller for one host.
pub struct Controller {
    workers: JoinHandle<Result<(), RuntimeError>>,
    background: Vec<JoinHandle<()>>,
}

impl Controller {
    pub async fn new(config: ControllerConfig, shutdown: Shutdown) -> Result<Self, ControllerError> {
        info!("Initializing IP Discovery Controller");

        let client = Client::try_default().await?;

        let registry = Registry::new();
        let metrics = QueueMetrics::register(QUEUE_NAME, &registry)?;
        let queue = WorkQueue::with_config(QUEUE_NAME, ExponentialBackoff::default(), Some(metrics));

        let (arp_tables, arp_writer) = store::<ARPTable>();
        let (vms, vm_writer) = store::<VirtualMachine>();

        let arp_informer =
            Informer::new("arptable", arp_writer).route_to(EventRouter::new("arptable", queue.clone()));
        let vm_informer =
            Informer::new("virtualmachine", vm_writer).route_to(EventRouter::new("virtualmachine", queue.clone()));

        let mut background = Vec::new();
        {
            let api: Api<ARPTable> = Api::all(client.clone());
            let shutdown = shutdown.clone();
            background.push(tokio::spawn(async move {
                arp_informer
                    .run(watch_stream(api, watcher::Config::default()), shutdown)
                    .await;
            }));
        }
        {
            let api: Api<VirtualMachine> = Api::all(client.clone());
            let shutdown = shutdown.clone();
            background.push(tokio::spawn(async move {
                vm_informer
                    .run(watch_stream(api, watcher::Config::default()), shutdown)
                    .await;
            }));
        }

        let probe_state = ProbeState::new(registry).track(&arp_tables).track(&vms);
        let probe_addr = config.metrics_addr;
        let probe_shutdown = shutdown.clone();
        background.push(tokio::spawn(async move {
            if let Err(e) = probes::serve(probe_addr, probe_state, probe_shutdown).await {
                error!("Probe server failed: {}", e);
            }
        }));

        let sync = ArpTableSync::new(
            arp_tables.clone(),
            Arc::new(KubeArpTableClient::new(client)),
            config,
        );
        background.push(tokio::spawn(sync.run(shutdown.clone())));

        let pool = WorkerPool::new(Arc::new(ArpReconciler::new(arp_tables.clone(), vms.clone())), queue)
            .workers(1)
            .wait_for(&arp_tables)
            .wait_for(&vms);
        let workers = tokio::spawn(pool.run(shutdown));

        Ok(Self { workers, background })
    }

    /// Runs the controller until shutdown.
    pub async fn run(self) -> Result<(), ControllerError> {
        info!("IP Discovery Controller running");

        let result = self
            .workers
            .await
            .map_err(|e| ControllerError::Runtime(RuntimeError::Join(e)))?;

        for handle in self.background {
            if let Err(e) = handle.await {
                warn!("Background task failed: {}", e);
            }
        }

        info!("IP Discovery Controller stopped");
        result.map_err(ControllerError::from)
    }
}
