//! Test utilities for unit testing the reconciler
//!
//! Fixtures for VMs, pods and services, plus a mock [`ClusterClient`] that
//! records every write.

use crate::client::ClusterClient;
use crate::error::ControllerError;
use async_trait::async_trait;
use crds::{ActionType, Credential, CredentialSpec, VirtualMachine, VirtualMachineSpec, VirtualMachineStatus, VmState};
use k8s_openapi::api::core::v1::{Pod, PodCondition, PodStatus, Service, ServicePort, ServiceSpec};
use kube::api::ObjectMeta;
use kube::ResourceExt;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

pub const TEST_UID: &str = "1a2b3c4d-5e6f-4a0b-8c1d-2e3f4a5b6c7d";

/// Helper to create a test VirtualMachine without status
pub fn create_test_vm(name: &str, namespace: &str, action: &str) -> VirtualMachine {
    VirtualMachine {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            uid: Some(TEST_UID.to_string()),
            resource_version: Some("1".to_string()),
            ..Default::default()
        },
        spec: VirtualMachineSpec {
            cpus: 2,
            memory_mb: 1024,
            image: "ubuntu".to_string(),
            action: ActionType::from(action),
            public_keys: vec![],
            hosted_novnc: false,
        },
        status: None,
    }
}

/// Helper to create a test VirtualMachine that already has its identity
pub fn create_identified_vm(name: &str, namespace: &str, action: &str, state: VmState) -> VirtualMachine {
    let mut vm = create_test_vm(name, namespace, action);
    vm.status = Some(VirtualMachineStatus {
        state,
        id: "i-1a2b3c4d".to_string(),
        mac: "06:fe:1a:2b:3c:4d".to_string(),
        vnc_endpoint: None,
    });
    vm
}

/// Helper to create a test child pod labelled with `role`
pub fn create_test_pod(name: &str, namespace: &str, role: &str) -> Pod {
    let vm_name = name.strip_suffix("-novnc").unwrap_or(name);
    Pod {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            labels: Some(BTreeMap::from([
                ("app".to_string(), "ranchervm".to_string()),
                ("name".to_string(), vm_name.to_string()),
                ("role".to_string(), role.to_string()),
            ])),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Helper to create a test console service with an allocated node port
pub fn create_test_service(vm_name: &str, namespace: &str, node_port: i32) -> Service {
    Service {
        metadata: ObjectMeta {
            name: Some(format!("{vm_name}-novnc")),
            namespace: Some(namespace.to_string()),
            labels: Some(BTreeMap::from([
                ("app".to_string(), "ranchervm".to_string()),
                ("name".to_string(), vm_name.to_string()),
                ("role".to_string(), "novnc".to_string()),
            ])),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            ports: Some(vec![ServicePort {
                port: 6080,
                node_port: Some(node_port),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        status: None,
    }
}

pub fn create_test_credential(name: &str, public_key: &str) -> Credential {
    Credential::new(
        name,
        CredentialSpec {
            public_key: public_key.to_string(),
        },
    )
}

/// Pod status with a single Ready condition
pub fn ready_condition(status: &str) -> PodStatus {
    PodStatus {
        conditions: Some(vec![PodCondition {
            type_: "Ready".to_string(),
            status: status.to_string(),
            ..Default::default()
        }]),
        ..Default::default()
    }
}

/// `meta` with a deletion timestamp set
pub fn terminating_meta(meta: ObjectMeta) -> ObjectMeta {
    let mut value = serde_json::to_value(&meta).unwrap();
    value["deletionTimestamp"] = serde_json::json!("2024-01-01T00:00:00Z");
    serde_json::from_value(value).unwrap()
}

/// How a mocked call should fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    NotFound,
    Conflict,
    Other,
}

impl Failure {
    fn to_error(self, what: &str) -> ControllerError {
        match self {
            Failure::NotFound => ControllerError::NotFound(what.to_string()),
            Failure::Conflict => ControllerError::Conflict(what.to_string()),
            Failure::Other => ControllerError::Watch(format!("{what}: connection refused")),
        }
    }
}

/// A write the mock observed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ReplaceStatus(String, VirtualMachineStatus),
    CreatePod(String),
    DeletePod(String),
    CreateService(String),
    DeleteService(String),
}

/// Mock ClusterClient for testing
#[derive(Clone, Default)]
pub struct MockClusterClient {
    calls: Arc<Mutex<Vec<Call>>>,
    created_pods: Arc<Mutex<Vec<Pod>>>,
    failures: Arc<Mutex<BTreeMap<&'static str, Failure>>>,
    node_port: i32,
}

impl MockClusterClient {
    pub fn new() -> Self {
        Self {
            node_port: 30001,
            ..Default::default()
        }
    }

    /// Make every call to `op` (e.g. `"delete_pod"`) fail.
    pub fn fail(&self, op: &'static str, failure: Failure) {
        self.failures.lock().unwrap().insert(op, failure);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn status_writes(&self) -> Vec<VirtualMachineStatus> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::ReplaceStatus(_, status) => Some(status),
                _ => None,
            })
            .collect()
    }

    pub fn created_pods(&self) -> Vec<Pod> {
        self.created_pods.lock().unwrap().clone()
    }

    fn record(&self, op: &'static str, call: Call, what: &str) -> Result<(), ControllerError> {
        self.calls.lock().unwrap().push(call);
        match self.failures.lock().unwrap().get(op) {
            Some(failure) => Err(failure.to_error(what)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ClusterClient for MockClusterClient {
    async fn replace_vm_status(&self, vm: &VirtualMachine) -> Result<VirtualMachine, ControllerError> {
        let status = vm.status.clone().unwrap_or_default();
        self.record("replace_vm_status", Call::ReplaceStatus(vm.name_any(), status), &vm.name_any())?;
        let mut stored = vm.clone();
        let version = stored
            .metadata
            .resource_version
            .as_deref()
            .and_then(|rv| rv.parse::<u64>().ok())
            .unwrap_or(0);
        stored.metadata.resource_version = Some((version + 1).to_string());
        Ok(stored)
    }

    async fn create_pod(&self, _namespace: &str, pod: &Pod) -> Result<Pod, ControllerError> {
        self.record("create_pod", Call::CreatePod(pod.name_any()), &pod.name_any())?;
        self.created_pods.lock().unwrap().push(pod.clone());
        Ok(pod.clone())
    }

    async fn delete_pod(&self, _namespace: &str, name: &str) -> Result<(), ControllerError> {
        self.record("delete_pod", Call::DeletePod(name.to_string()), name)
    }

    async fn create_service(&self, _namespace: &str, service: &Service) -> Result<Service, ControllerError> {
        self.record("create_service", Call::CreateService(service.name_any()), &service.name_any())?;
        let mut stored = service.clone();
        if let Some(port) = stored
            .spec
            .as_mut()
            .and_then(|s| s.ports.as_mut())
            .and_then(|p| p.first_mut())
        {
            port.node_port = Some(self.node_port);
        }
        Ok(stored)
    }

    async fn delete_service(&self, _namespace: &str, name: &str) -> Result<(), ControllerError> {
        self.record("delete_service", Call::DeleteService(name.to_string()), name)
    }
}
