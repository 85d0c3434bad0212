//! Credential CRD
//!
//! A named SSH public key that virtual machines reference by name.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[kube(
    group = "vm.rancher.com",
    version = "v1alpha1",
    kind = "Credential",
    shortname = "cred",
    shortname = "creds",
    derive = "PartialEq"
)]
#[serde(rename_all = "snake_case")]
pub struct CredentialSpec {
    /// Public key in authorized_keys format
    pub public_key: String,
}
