//! In-memory [`ApiStore`] for handler tests.

use crate::store::{ApiStore, StoreError};
use async_trait::async_trait;
use crds::{ActionType, Credential, VirtualMachine, VirtualMachineSpec};
use k8s_openapi::api::core::v1::Node;
use kube::ResourceExt;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

pub fn test_vm(name: &str, action: &str) -> VirtualMachine {
    let mut vm = VirtualMachine::new(
        name,
        VirtualMachineSpec {
            cpus: 1,
            memory_mb: 512,
            image: "ubuntu".to_string(),
            action: ActionType::from(action),
            public_keys: vec![],
            hosted_novnc: false,
        },
    );
    vm.metadata.namespace = Some("default".to_string());
    vm
}

#[derive(Default)]
struct Inner {
    instances: BTreeMap<String, VirtualMachine>,
    credentials: BTreeMap<String, Credential>,
    replacements: usize,
    failure: Option<String>,
}

/// Mock ApiStore for testing
#[derive(Clone, Default)]
pub struct MockStore {
    inner: Arc<Mutex<Inner>>,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_instance(self, vm: VirtualMachine) -> Self {
        self.inner.lock().unwrap().instances.insert(vm.name_any(), vm);
        self
    }

    /// Make every later call fail with `message`.
    pub fn fail_with(&self, message: &str) {
        self.inner.lock().unwrap().failure = Some(message.to_string());
    }

    pub fn instance(&self, name: &str) -> Option<VirtualMachine> {
        self.inner.lock().unwrap().instances.get(name).cloned()
    }

    pub fn replacements(&self) -> usize {
        self.inner.lock().unwrap().replacements
    }

    fn with<T>(&self, f: impl FnOnce(&mut Inner) -> Result<T, StoreError>) -> Result<T, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(message) = &inner.failure {
            return Err(StoreError::Backend(message.clone()));
        }
        f(&mut inner)
    }
}

fn insert_new<T: Clone>(map: &mut BTreeMap<String, T>, name: String, obj: &T) -> Result<T, StoreError> {
    if map.contains_key(&name) {
        return Err(StoreError::AlreadyExists(name));
    }
    map.insert(name, obj.clone());
    Ok(obj.clone())
}

#[async_trait]
impl ApiStore for MockStore {
    async fn list_instances(&self) -> Result<Vec<VirtualMachine>, StoreError> {
        self.with(|inner| Ok(inner.instances.values().cloned().collect()))
    }

    async fn get_instance(&self, name: &str) -> Result<VirtualMachine, StoreError> {
        self.with(|inner| {
            inner
                .instances
                .get(name)
                .cloned()
                .ok_or_else(|| StoreError::NotFound(name.to_string()))
        })
    }

    async fn create_instance(&self, vm: &VirtualMachine) -> Result<VirtualMachine, StoreError> {
        self.with(|inner| insert_new(&mut inner.instances, vm.name_any(), vm))
    }

    async fn replace_instance(&self, vm: &VirtualMachine) -> Result<VirtualMachine, StoreError> {
        self.with(|inner| {
            inner.replacements += 1;
            inner.instances.insert(vm.name_any(), vm.clone());
            Ok(vm.clone())
        })
    }

    async fn delete_instance(&self, name: &str) -> Result<(), StoreError> {
        self.with(|inner| {
            inner
                .instances
                .remove(name)
                .map(|_| ())
                .ok_or_else(|| StoreError::NotFound(name.to_string()))
        })
    }

    async fn list_credentials(&self) -> Result<Vec<Credential>, StoreError> {
        self.with(|inner| Ok(inner.credentials.values().cloned().collect()))
    }

    async fn create_credential(&self, credential: &Credential) -> Result<Credential, StoreError> {
        self.with(|inner| insert_new(&mut inner.credentials, credential.name_any(), credential))
    }

    async fn delete_credential(&self, name: &str) -> Result<(), StoreError> {
        self.with(|inner| {
            inner
                .credentials
                .remove(name)
                .map(|_| ())
                .ok_or_else(|| StoreError::NotFound(name.to_string()))
        })
    }

    async fn list_hosts(&self) -> Result<Vec<Node>, StoreError> {
        self.with(|_| Ok(Vec::new()))
    }
}
