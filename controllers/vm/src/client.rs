//! Cluster write operations used by the reconciler.
//!
//! Reads always come from the informer caches; only writes go through this
//! trait so they can be mocked in unit tests.

use crate::error::ControllerError;
use async_trait::async_trait;
use crds::VirtualMachine;
use k8s_openapi::api::core::v1::{Pod, Service};
use kube::api::{DeleteParams, Patch, PatchParams, PostParams};
use kube::{Api, Client, ResourceExt};

/// Trait for the cluster writes the VM controller performs
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Writes `vm.status`, guarded by `vm`'s resourceVersion. Returns the
    /// stored object.
    async fn replace_vm_status(&self, vm: &VirtualMachine) -> Result<VirtualMachine, ControllerError>;

    async fn create_pod(&self, namespace: &str, pod: &Pod) -> Result<Pod, ControllerError>;
    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<(), ControllerError>;
    async fn create_service(&self, namespace: &str, service: &Service) -> Result<Service, ControllerError>;
    async fn delete_service(&self, namespace: &str, name: &str) -> Result<(), ControllerError>;
}

/// [`ClusterClient`] backed by the Kubernetes API.
#[derive(Clone)]
pub struct KubeClusterClient {
    client: Client,
}

impl KubeClusterClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ClusterClient for KubeClusterClient {
    async fn replace_vm_status(&self, vm: &VirtualMachine) -> Result<VirtualMachine, ControllerError> {
        let name = vm.name_any();
        let namespace = vm
            .namespace()
            .ok_or_else(|| ControllerError::InvalidConfig(format!("VirtualMachine {} has no namespace", name)))?;
        let api: Api<VirtualMachine> = Api::namespaced(self.client.clone(), &namespace);

        // resourceVersion turns the merge patch into a compare-and-swap
        let patch = serde_json::json!({
            "metadata": { "resourceVersion": vm.resource_version() },
            "status": vm.status,
        });
        api.patch_status(&name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(|e| ControllerError::from_kube(e, &format!("virtualmachine {}/{}", namespace, name)))
    }

    async fn create_pod(&self, namespace: &str, pod: &Pod) -> Result<Pod, ControllerError> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        api.create(&PostParams::default(), pod)
            .await
            .map_err(|e| ControllerError::from_kube(e, &format!("pod {}/{}", namespace, pod.name_any())))
    }

    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<(), ControllerError> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        api.delete(name, &DeleteParams::default())
            .await
            .map(|_| ())
            .map_err(|e| ControllerError::from_kube(e, &format!("pod {}/{}", namespace, name)))
    }

    async fn create_service(&self, namespace: &str, service: &Service) -> Result<Service, ControllerError> {
        let api: Api<Service> = Api::namespaced(self.client.clone(), namespace);
        api.create(&PostParams::default(), service)
            .await
            .map_err(|e| ControllerError::from_kube(e, &format!("service {}/{}", namespace, service.name_any())))
    }

    async fn delete_service(&self, namespace: &str, name: &str) -> Result<(), ControllerError> {
        let api: Api<Service> = Api::namespaced(self.client.clone(), namespace);
        api.delete(name, &DeleteParams::default())
            .await
            .map(|_| ())
            .map_err(|e| ControllerError::from_kube(e, &format!("service {}/{}", namespace, name)))
    }
}
