//! VirtualMachine reconciliation logic.
//!
//! Level-triggered: every pass re-reads the VM and its children from the
//! informer caches and converges them toward `spec.action`, writing status
//! only when it changed.

use crate::client::ClusterClient;
use crate::config::ControllerConfig;
use crate::error::ControllerError;
use crate::reconcile_helpers::{
    console_endpoint, derive_instance_id, derive_mac, observed_pod_state, status_needs_update,
};
use crate::watcher::Caches;
use crate::workload::{console_name, console_pod, console_service, vm_pod};
use async_trait::async_trait;
use crds::{ActionType, VirtualMachine, VirtualMachineStatus, VmState};
use kube::ResourceExt;
use reconcile_runtime::{ObjectKey, Reconcile};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Reconciler for VirtualMachine keys
pub struct Reconciler {
    caches: Caches,
    client: Arc<dyn ClusterClient>,
    config: ControllerConfig,
}

#[async_trait]
impl Reconcile for Reconciler {
    type Error = ControllerError;

    async fn reconcile(&self, key: &ObjectKey) -> Result<(), ControllerError> {
        let Some(vm) = self.caches.vms.get(key) else {
            debug!("VirtualMachine {} no longer cached, cleaning up children", key);
            self.delete_children(key).await;
            return Ok(());
        };

        if vm.metadata.deletion_timestamp.is_some() {
            return self.terminate(&vm, key).await;
        }

        if !vm.has_identity() {
            return self.assign_identity(&vm, key).await;
        }

        match &vm.spec.action {
            ActionType::Start => self.start(&vm, key).await,
            ActionType::Stop => self.stop(&vm, key).await,
            other => {
                warn!("Detected vm {} with invalid action \"{}\"", key, other);
                Ok(())
            }
        }
    }
}

impl Reconciler {
    pub fn new(caches: Caches, client: Arc<dyn ClusterClient>, config: ControllerConfig) -> Self {
        Self {
            caches,
            client,
            config,
        }
    }

    /// Derives id and MAC from the uid. Existing values are never replaced.
    async fn assign_identity(&self, vm: &VirtualMachine, key: &ObjectKey) -> Result<(), ControllerError> {
        let uid = vm.uid().ok_or_else(|| ControllerError::MissingUid(key.to_string()))?;
        let (Some(id), Some(mac)) = (derive_instance_id(&uid), derive_mac(&uid)) else {
            return Err(ControllerError::MissingUid(format!("{key} has uid {uid:?}")));
        };

        let mut status = vm.status_or_default();
        if status.id.is_empty() {
            status.id = id;
        }
        if status.mac.is_empty() {
            status.mac = mac;
        }
        info!("Assigning identity to {}: id={} mac={}", key, status.id, status.mac);
        self.write_status(vm, status).await?;
        Ok(())
    }

    async fn start(&self, vm: &VirtualMachine, key: &ObjectKey) -> Result<(), ControllerError> {
        let vm = self.ensure_vm_pod(vm, key).await?;
        self.ensure_console_pod(&vm, key).await?;
        self.ensure_console_service(&vm, key).await?;
        Ok(())
    }

    /// Creates the workload pod if absent and reports the state it implies.
    async fn ensure_vm_pod(&self, vm: &VirtualMachine, key: &ObjectKey) -> Result<VirtualMachine, ControllerError> {
        let state = match self.caches.pods.get(key) {
            Some(pod) => {
                debug!("Found existing vm pod {}", key);
                observed_pod_state(&pod)
            }
            None => {
                let public_keys = self.resolve_public_keys(vm);
                let pod = vm_pod(vm, &public_keys, &self.config);
                self.create_pod(key, &pod).await?;
                VmState::Pending
            }
        };

        let mut status = vm.status_or_default();
        status.state = state;
        self.write_status(vm, status).await
    }

    async fn ensure_console_pod(&self, vm: &VirtualMachine, key: &ObjectKey) -> Result<(), ControllerError> {
        let console_key = console_key(key);
        if self.caches.pods.get(&console_key).is_some() {
            debug!("Found existing novnc pod {}", console_key);
            return Ok(());
        }
        self.create_pod(&console_key, &console_pod(vm, &self.config)).await
    }

    /// Creates the console service if absent and records its endpoint.
    async fn ensure_console_service(&self, vm: &VirtualMachine, key: &ObjectKey) -> Result<(), ControllerError> {
        let console_key = console_key(key);
        let service = match self.caches.services.get(&console_key) {
            Some(service) => {
                debug!("Found existing novnc service {}", console_key);
                (*service).clone()
            }
            None => {
                info!("Creating novnc service {}", console_key);
                let namespace = namespace_of(key)?;
                match self
                    .client
                    .create_service(namespace, &console_service(vm, &self.config))
                    .await
                {
                    Ok(service) => service,
                    // Created by an earlier pass the cache has not caught up with
                    Err(e) if e.is_conflict() => {
                        debug!("novnc service {} already exists", console_key);
                        return Ok(());
                    }
                    Err(e) => return Err(e),
                }
            }
        };

        let Some(endpoint) = console_endpoint(&self.config.console_host, &service) else {
            debug!("novnc service {} has no node port yet", console_key);
            return Ok(());
        };
        let mut status = vm.status_or_default();
        status.vnc_endpoint = Some(endpoint);
        self.write_status(vm, status).await?;
        Ok(())
    }

    /// Deletes the workload pod; console pod and service are kept for the
    /// next start.
    async fn stop(&self, vm: &VirtualMachine, key: &ObjectKey) -> Result<(), ControllerError> {
        let state = match self.caches.pods.get(key) {
            None => VmState::Stopped,
            Some(pod) if pod.metadata.deletion_timestamp.is_some() => VmState::Stopping,
            Some(_) => {
                info!("Deleting vm pod {}", key);
                match self.client.delete_pod(namespace_of(key)?, &key.name).await {
                    Ok(()) => VmState::Stopping,
                    Err(e) if e.is_not_found() => VmState::Stopped,
                    Err(e) => {
                        warn!("Error deleting vm pod {}: {}", key, e);
                        VmState::Error
                    }
                }
            }
        };

        let mut status = vm.status_or_default();
        status.state = state;
        self.write_status(vm, status).await?;
        Ok(())
    }

    /// VM is marked for deletion: remove children and report progress.
    async fn terminate(&self, vm: &VirtualMachine, key: &ObjectKey) -> Result<(), ControllerError> {
        self.delete_children(key).await;

        let mut status = vm.status_or_default();
        status.state = if self.caches.pods.get(key).is_some() {
            VmState::Terminating
        } else {
            VmState::Terminated
        };
        self.write_status(vm, status).await?;
        Ok(())
    }

    /// Deletes workload pod, console pod and console service. Absent children
    /// count as deleted; other failures are logged and not retried.
    async fn delete_children(&self, key: &ObjectKey) {
        let Some(namespace) = key.namespace() else {
            warn!("VirtualMachine key {} has no namespace", key);
            return;
        };
        let console = console_name(&key.name);

        let results = [
            ("vm pod", self.client.delete_pod(namespace, &key.name).await),
            ("novnc pod", self.client.delete_pod(namespace, &console).await),
            ("novnc service", self.client.delete_service(namespace, &console).await),
        ];
        for (what, result) in results {
            match result {
                Ok(()) => debug!("Deleted {} for {}", what, key),
                Err(e) if e.is_not_found() => {}
                Err(e) => warn!("Error deleting {} for {}: {}", what, key, e),
            }
        }
    }

    async fn create_pod(&self, key: &ObjectKey, pod: &k8s_openapi::api::core::v1::Pod) -> Result<(), ControllerError> {
        info!("Creating pod {}", key);
        match self.client.create_pod(namespace_of(key)?, pod).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_conflict() => {
                debug!("Pod {} already exists", key);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Public keys of the referenced credentials. Missing credentials are
    /// skipped.
    fn resolve_public_keys(&self, vm: &VirtualMachine) -> Vec<String> {
        vm.spec
            .public_keys
            .iter()
            .filter_map(|name| match self.caches.credentials.get(&ObjectKey::cluster(name.as_str())) {
                Some(credential) => Some(credential.spec.public_key.clone()),
                None => {
                    warn!("Credential {} referenced by {} not found", name, vm.name_any());
                    None
                }
            })
            .collect()
    }

    /// Writes `status` if it differs from what `vm` carries. Returns the
    /// object later steps should build on.
    async fn write_status(
        &self,
        vm: &VirtualMachine,
        status: VirtualMachineStatus,
    ) -> Result<VirtualMachine, ControllerError> {
        if !status_needs_update(vm.status.as_ref(), &status) {
            return Ok(vm.clone());
        }
        debug!("Updating status of {} to {}", vm.name_any(), status.state);
        let mut updated = vm.clone();
        updated.status = Some(status);
        self.client.replace_vm_status(&updated).await
    }
}

fn console_key(key: &ObjectKey) -> ObjectKey {
    ObjectKey {
        namespace: key.namespace.clone(),
        name: console_name(&key.name),
    }
}

fn namespace_of(key: &ObjectKey) -> Result<&str, ControllerError> {
    key.namespace()
        .ok_or_else(|| ControllerError::InvalidConfig(format!("VirtualMachine key {key} has no namespace")))
}
