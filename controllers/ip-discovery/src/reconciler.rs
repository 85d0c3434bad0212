//! Observer for ARPTable and VirtualMachine events.
//!
//! Keeps the caches warm for correlating guests with their addresses. No
//! writes happen here; the periodic sync owns the ARPTable.

use crate::error::ControllerError;
use async_trait::async_trait;
use crds::{ARPTable, VirtualMachine};
use reconcile_runtime::{Cache, ObjectKey, Reconcile};
use tracing::debug;

pub struct ArpReconciler {
    arp_tables: Cache<ARPTable>,
    vms: Cache<VirtualMachine>,
}

impl ArpReconciler {
    pub fn new(arp_tables: Cache<ARPTable>, vms: Cache<VirtualMachine>) -> Self {
        Self { arp_tables, vms }
    }
}

#[async_trait]
impl Reconcile for ArpReconciler {
    type Error = ControllerError;

    async fn reconcile(&self, key: &ObjectKey) -> Result<(), ControllerError> {
        // ARPTables are cluster-scoped, VirtualMachines namespaced
        if key.namespace().is_none() {
            match self.arp_tables.get(key) {
                Some(table) => debug!("ARPTable {} has {} entries", key, table.spec.table.len()),
                None => debug!("ARPTable {} deleted", key),
            }
        } else {
            match self.vms.get(key) {
                Some(vm) => debug!(
                    "VirtualMachine {} mac {}",
                    key,
                    vm.status.as_ref().map_or("<unassigned>", |s| s.mac.as_str())
                ),
                None => debug!("VirtualMachine {} deleted", key),
            }
        }
        Ok(())
    }
}
