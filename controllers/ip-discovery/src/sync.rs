//! Periodic publication of this host's ARPTable.
//!
//! The timer, not watch events, drives every write: each tick re-reads the
//! neighbour table and upserts `ARPTable/<node>` against the cached copy.

use crate::arp::parse_arp_table;
use crate::client::ArpTableClient;
use crate::config::ControllerConfig;
use crate::error::ControllerError;
use crds::{ARPTable, ARPTableSpec};
use reconcile_runtime::{Cache, ObjectKey, Shutdown};
use std::sync::Arc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// What a single sync did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Created,
    Replaced,
    Unchanged,
}

pub struct ArpTableSync {
    cache: Cache<ARPTable>,
    client: Arc<dyn ArpTableClient>,
    config: ControllerConfig,
}

impl ArpTableSync {
    pub fn new(cache: Cache<ARPTable>, client: Arc<dyn ArpTableClient>, config: ControllerConfig) -> Self {
        Self { cache, client, config }
    }

    /// Reads the neighbour table once and upserts it.
    pub async fn sync_once(&self) -> Result<SyncOutcome, ControllerError> {
        let path = &self.config.arp_table_path;
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ControllerError::ArpRead {
                path: path.clone(),
                source,
            })?;
        let table = parse_arp_table(&contents, &self.config.bridge_interface);

        let node = &self.config.node_name;
        match self.cache.get(&ObjectKey::cluster(node.as_str())) {
            None => {
                self.client
                    .create(&ARPTable::new(node, ARPTableSpec { table }))
                    .await?;
                info!("Created ARPTable {}", node);
                Ok(SyncOutcome::Created)
            }
            Some(current) if current.spec.table == table => Ok(SyncOutcome::Unchanged),
            Some(current) => {
                let mut updated = ARPTable::clone(&current);
                updated.spec.table = table;
                self.client.replace(&updated).await?;
                debug!("Replaced ARPTable {} ({} entries)", node, updated.spec.table.len());
                Ok(SyncOutcome::Replaced)
            }
        }
    }

    /// Syncs on every tick until shutdown. Failures are logged and left for
    /// the next tick.
    pub async fn run(self, shutdown: Shutdown) {
        tokio::select! {
            () = shutdown.cancelled() => return,
            _ = self.cache.wait_until_synced() => {}
        }

        let mut ticker = tokio::time::interval(self.config.sync_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }
            match self.sync_once().await {
                Ok(outcome) => debug!("ARP sync: {:?}", outcome),
                Err(e) => warn!("ARP sync failed: {}", e),
            }
        }
        info!("ARP sync stopped");
    }
}
