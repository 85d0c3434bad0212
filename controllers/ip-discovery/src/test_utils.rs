//! Test utilities: a recording ArpTableClient and scratch ARP files.

use crate::client::ArpTableClient;
use crate::error::ControllerError;
use async_trait::async_trait;
use crds::{ARPTable, ArpEntry};
use kube::ResourceExt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// A write the mock observed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Create(String, Vec<ArpEntry>),
    /// name, resourceVersion, table
    Replace(String, Option<String>, Vec<ArpEntry>),
}

/// Mock ArpTableClient for testing
#[derive(Clone, Default)]
pub struct MockArpTableClient {
    calls: Arc<Mutex<Vec<Call>>>,
    fail: Arc<AtomicBool>,
}

impl MockArpTableClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every write fail with a conflict.
    pub fn fail_writes(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: Call, table: &ARPTable) -> Result<ARPTable, ControllerError> {
        self.calls.lock().unwrap().push(call);
        if self.fail.load(Ordering::SeqCst) {
            return Err(ControllerError::Conflict(format!("arptable {}", table.name_any())));
        }
        Ok(table.clone())
    }
}

#[async_trait]
impl ArpTableClient for MockArpTableClient {
    async fn create(&self, table: &ARPTable) -> Result<ARPTable, ControllerError> {
        self.record(Call::Create(table.name_any(), table.spec.table.clone()), table)
    }

    async fn replace(&self, table: &ARPTable) -> Result<ARPTable, ControllerError> {
        self.record(
            Call::Replace(table.name_any(), table.resource_version(), table.spec.table.clone()),
            table,
        )
    }
}

/// A uniquely named file in the temp dir, removed on drop.
pub struct TempArpFile(PathBuf);

impl TempArpFile {
    pub fn new(contents: &str) -> Self {
        let path = std::env::temp_dir().join(format!("arp-{}", uuid::Uuid::new_v4()));
        std::fs::write(&path, contents).unwrap();
        Self(path)
    }

    pub fn path(&self) -> PathBuf {
        self.0.clone()
    }
}

impl Drop for TempArpFile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.0);
    }
}
