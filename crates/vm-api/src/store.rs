//! Backing store for the API.

use async_trait::async_trait;
use crds::{Credential, VirtualMachine};
use k8s_openapi::api::core::v1::Node;
use kube::api::{DeleteParams, ListParams, PostParams};
use kube::{Api, Client, Error as KubeError, ResourceExt};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("{0} already exists")]
    AlreadyExists(String),

    /// Anything else; the text is returned to the caller verbatim
    #[error("{0}")]
    Backend(String),
}

impl StoreError {
    fn from_kube(err: KubeError, what: &str) -> Self {
        match &err {
            KubeError::Api(resp) if resp.code == 404 => Self::NotFound(what.to_string()),
            KubeError::Api(resp) if resp.code == 409 => Self::AlreadyExists(what.to_string()),
            _ => Self::Backend(err.to_string()),
        }
    }
}

/// Operations the API performs against the cluster.
#[async_trait]
pub trait ApiStore: Send + Sync {
    async fn list_instances(&self) -> Result<Vec<VirtualMachine>, StoreError>;
    async fn get_instance(&self, name: &str) -> Result<VirtualMachine, StoreError>;
    async fn create_instance(&self, vm: &VirtualMachine) -> Result<VirtualMachine, StoreError>;
    /// Writes `vm.spec`, guarded by its resourceVersion.
    async fn replace_instance(&self, vm: &VirtualMachine) -> Result<VirtualMachine, StoreError>;
    async fn delete_instance(&self, name: &str) -> Result<(), StoreError>;

    async fn list_credentials(&self) -> Result<Vec<Credential>, StoreError>;
    async fn create_credential(&self, credential: &Credential) -> Result<Credential, StoreError>;
    async fn delete_credential(&self, name: &str) -> Result<(), StoreError>;

    async fn list_hosts(&self) -> Result<Vec<Node>, StoreError>;
}

/// [`ApiStore`] backed by the Kubernetes API.
#[derive(Clone)]
pub struct KubeApiStore {
    vms: Api<VirtualMachine>,
    credentials: Api<Credential>,
    nodes: Api<Node>,
}

impl KubeApiStore {
    /// VirtualMachines live in `namespace`; credentials and nodes are
    /// cluster-scoped.
    pub fn new(client: Client, namespace: &str) -> Self {
        Self {
            vms: Api::namespaced(client.clone(), namespace),
            credentials: Api::all(client.clone()),
            nodes: Api::all(client),
        }
    }
}

#[async_trait]
impl ApiStore for KubeApiStore {
    async fn list_instances(&self) -> Result<Vec<VirtualMachine>, StoreError> {
        self.vms
            .list(&ListParams::default())
            .await
            .map(|list| list.items)
            .map_err(|e| StoreError::from_kube(e, "virtualmachines"))
    }

    async fn get_instance(&self, name: &str) -> Result<VirtualMachine, StoreError> {
        self.vms
            .get(name)
            .await
            .map_err(|e| StoreError::from_kube(e, &format!("virtualmachine {name}")))
    }

    async fn create_instance(&self, vm: &VirtualMachine) -> Result<VirtualMachine, StoreError> {
        self.vms
            .create(&PostParams::default(), vm)
            .await
            .map_err(|e| StoreError::from_kube(e, &format!("virtualmachine {}", vm.name_any())))
    }

    async fn replace_instance(&self, vm: &VirtualMachine) -> Result<VirtualMachine, StoreError> {
        let name = vm.name_any();
        self.vms
            .replace(&name, &PostParams::default(), vm)
            .await
            .map_err(|e| match e {
                // A stale resourceVersion is not a duplicate; report it as is
                KubeError::Api(resp) if resp.code == 409 => StoreError::Backend(resp.message),
                other => StoreError::from_kube(other, &format!("virtualmachine {name}")),
            })
    }

    async fn delete_instance(&self, name: &str) -> Result<(), StoreError> {
        self.vms
            .delete(name, &DeleteParams::default())
            .await
            .map(|_| ())
            .map_err(|e| StoreError::from_kube(e, &format!("virtualmachine {name}")))
    }

    async fn list_credentials(&self) -> Result<Vec<Credential>, StoreError> {
        self.credentials
            .list(&ListParams::default())
            .await
            .map(|list| list.items)
            .map_err(|e| StoreError::from_kube(e, "credentials"))
    }

    async fn create_credential(&self, credential: &Credential) -> Result<Credential, StoreError> {
        self.credentials
            .create(&PostParams::default(), credential)
            .await
            .map_err(|e| StoreError::from_kube(e, &format!("credential {}", credential.name_any())))
    }

    async fn delete_credential(&self, name: &str) -> Result<(), StoreError> {
        self.credentials
            .delete(name, &DeleteParams::default())
            .await
            .map(|_| ())
            .map_err(|e| StoreError::from_kube(e, &format!("credential {name}")))
    }

    async fn list_hosts(&self) -> Result<Vec<Node>, StoreError> {
        self.nodes
            .list(&ListParams::default())
            .await
            .map(|list| list.items)
            .map_err(|e| StoreError::from_kube(e, "nodes"))
    }
}
