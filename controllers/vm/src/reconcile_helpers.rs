//! Helper functions for the VM reconciler
//!
//! Pure derivations from observed objects; nothing here talks to the cluster.

use crds::{VirtualMachineStatus, VmState};
use k8s_openapi::api::core::v1::{Pod, Service};

/// Instance id derived from the store-assigned uid: `i-` plus its first eight
/// characters.
pub fn derive_instance_id(uid: &str) -> Option<String> {
    uid.get(..8).map(|prefix| format!("i-{prefix}"))
}

/// Locally administered MAC derived from the first eight uid characters.
pub fn derive_mac(uid: &str) -> Option<String> {
    let octets = [uid.get(0..2)?, uid.get(2..4)?, uid.get(4..6)?, uid.get(6..8)?];
    Some(format!("06:fe:{}", octets.join(":")))
}

/// VM state implied by its workload pod.
///
/// A pod being deleted reports `stopping` even while it still passes its
/// readiness probe.
pub fn observed_pod_state(pod: &Pod) -> VmState {
    if pod.metadata.deletion_timestamp.is_some() {
        return VmState::Stopping;
    }
    if is_pod_ready(pod) {
        VmState::Running
    } else {
        VmState::Pending
    }
}

pub fn is_pod_ready(pod: &Pod) -> bool {
    pod.status
        .as_ref()
        .and_then(|status| status.conditions.as_ref())
        .is_some_and(|conditions| {
            conditions
                .iter()
                .any(|c| c.type_ == "Ready" && c.status == "True")
        })
}

/// `host:nodePort` once the service has a node port allocated.
pub fn console_endpoint(host: &str, service: &Service) -> Option<String> {
    let port = service
        .spec
        .as_ref()?
        .ports
        .as_ref()?
        .first()?
        .node_port
        .filter(|port| *port > 0)?;
    Some(format!("{host}:{port}"))
}

/// Check if the stored status differs from the desired one
///
/// Status carries no timestamps, so a field-wise comparison is enough to stop
/// a status write from re-triggering another write.
pub fn status_needs_update(current: Option<&VirtualMachineStatus>, desired: &VirtualMachineStatus) -> bool {
    match current {
        Some(current) => current != desired,
        None => true,
    }
}

#[cfg(test)]
#[path = "reconcile_helpers_test.rs"]
mod tests;
