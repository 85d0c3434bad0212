//! IP Discovery Controller
//!
//! Runs on every host. Publishes the neighbours seen on the VM bridge as an
//! ARPTable named after the host, so guests' MAC addresses can be matched to
//! their IPs.

mod arp;
mod client;
mod config;
mod controller;
mod error;
mod reconciler;
mod sync;
#[cfg(test)]
mod test_utils;

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

    info!("Starting IP Discovery Controller");

    let config = ControllerConfig::from_env()?;

    info!("Configuration:");
    info!("  Node: {}", config.node_name);
    info!("  Bridge: {}", config.bridge_interface);
    info!("  ARP table: {}", config.arp_table_path.display());
    info!("  Sync interval: {:?}", config.sync_interval);
    info!("  Metrics address: {}", config.metrics_addr);

    let shutdown = shutdown_on_ctrl_c();
    Controller::new(config, shutdown).await?.run().await
}
