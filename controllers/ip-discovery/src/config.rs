//! Controller configuration, read once from the environment at startup.

use crate::error::ControllerError;
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Settings for the per-node IP discovery agent.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Name of this host; also the name of the ARPTable it publishes
    pub node_name: String,
    /// Only neighbours on this device are published
    pub bridge_interface: String,
    /// Kernel neighbour table, normally `/proc/net/arp`
    pub arp_table_path: PathBuf,
    /// Period between resyncs of the published table
    pub sync_interval: Duration,
    /// Listen address of the health and metrics server
    pub metrics_addr: SocketAddr,
}

impl ControllerConfig {
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ControllerError> {
        let node_name = lookup("NODE_NAME")
            .filter(|name| !name.is_empty())
            .ok_or_else(|| ControllerError::InvalidConfig("NODE_NAME environment variable is required".to_string()))?;

        let sync_secs: u64 = match lookup("SYNC_INTERVAL_SECS") {
            None => 3,
            Some(raw) => raw.parse().map_err(|e| {
                ControllerError::InvalidConfig(format!("SYNC_INTERVAL_SECS={raw:?}: {e}"))
            })?,
        };
        if sync_secs == 0 {
            return Err(ControllerError::InvalidConfig(
                "SYNC_INTERVAL_SECS must be at least 1".to_string(),
            ));
        }

        let metrics_addr = match lookup("METRICS_ADDR") {
            None => SocketAddr::from(([0, 0, 0, 0], 8081)),
            Some(raw) => raw
                .parse()
                .map_err(|e| ControllerError::InvalidConfig(format!("METRICS_ADDR={raw:?}: {e}")))?,
        };

        Ok(Self {
            node_name,
            bridge_interface: lookup("BRIDGE_INTERFACE").unwrap_or_else(|| "br0".to_string()),
            arp_table_path: lookup("ARP_TABLE_PATH")
                .map_or_else(|| PathBuf::from("/proc/net/arp"), PathBuf::from),
            sync_interval: Duration::from_secs(sync_secs),
            metrics_addr,
        })
    }
}
