//! ARPTable CRD
//!
//! One table per host, published by the IP discovery controller running on
//! that host. Keyed by host name.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[kube(
    group = "vm.rancher.com",
    version = "v1alpha1",
    kind = "ARPTable",
    shortname = "arp",
    shortname = "arps",
    derive = "PartialEq"
)]
#[serde(rename_all = "snake_case")]
pub struct ARPTableSpec {
    /// Neighbour entries observed on the managed bridge
    #[serde(default)]
    pub table: Vec<ArpEntry>,
}

/// A single row of the kernel neighbour table.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ArpEntry {
    pub ip: String,
    pub hw_type: String,
    pub flags: String,
    pub hw_address: String,
    pub mask: String,
    pub device: String,
}
