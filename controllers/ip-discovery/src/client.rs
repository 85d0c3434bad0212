//! ARPTable writes.

use crate::error::ControllerError;
use async_trait::async_trait;
use crds::ARPTable;
use kube::api::PostParams;
use kube::{Api, Client, ResourceExt};

/// Trait for the ARPTable writes the controller performs
#[async_trait]
pub trait ArpTableClient: Send + Sync {
    async fn create(&self, table: &ARPTable) -> Result<ARPTable, ControllerError>;

    /// Replaces the stored table, guarded by `table`'s resourceVersion.
    async fn replace(&self, table: &ARPTable) -> Result<ARPTable, ControllerError>;
}

/// [`ArpTableClient`] backed by the Kubernetes API.
#[derive(Clone)]
pub struct KubeArpTableClient {
    api: Api<ARPTable>,
}

impl KubeArpTableClient {
    pub fn new(client: Client) -> Self {
        Self { api: Api::all(client) }
    }
}

#[async_trait]
impl ArpTableClient for KubeArpTableClient {
    async fn create(&self, table: &ARPTable) -> Result<ARPTable, ControllerError> {
        self.api
            .create(&PostParams::default(), table)
            .await
            .map_err(|e| ControllerError::from_kube(e, &format!("arptable {}", table.name_any())))
    }

    async fn replace(&self, table: &ARPTable) -> Result<ARPTable, ControllerError> {
        let name = table.name_any();
        self.api
            .replace(&name, &PostParams::default(), table)
            .await
            .map_err(|e| ControllerError::from_kube(e, &format!("arptable {}", name)))
    }
}
