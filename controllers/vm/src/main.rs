//! VM Controller
//!
//! Runs each VirtualMachine as a KVM workload pod plus a noVNC console pod
//! and NodePort service, and reports the observed lifecycle state back onto
//! the VirtualMachine's status.

mod client;
mod config;
mod controller;
mod error;
mod reconcile_helpers;
mod reconciler;
#[cfg(test)]
mod test_utils;
mod watcher;
mod workload;

use crate::config::ControllerConfig;
use crate::controller::Controller;
use crate::error::ControllerError;
use reconcile_runtime::shutdown_on_ctrl_c;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting VM Controller");

    let config = ControllerConfig::from_env()?;

    info!("Configuration:");
    info!("  Namespace: {}", config.namespace.as_deref().unwrap_or("all namespaces"));
    info!("  Workers: {}", config.workers);
    info!("  Max retries: {}", config.max_retries);
    info!("  Console host: {}", config.console_host);
    info!("  VM interface: {}", config.vm_interface);
    info!("  Metrics address: {}", config.metrics_addr);

    let shutdown = shutdown_on_ctrl_c();
    let controller = Controller::new(config, shutdown).await?;
    controller.run().await?;

    Ok(())
}
