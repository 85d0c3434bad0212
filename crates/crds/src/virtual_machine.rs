//! VirtualMachine CRD
//!
//! Declares a KVM guest. Clients set `spec.action` to request a transition;
//! only the VM controller writes `status`.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[kube(
    group = "vm.rancher.com",
    version = "v1alpha1",
    kind = "VirtualMachine",
    namespaced,
    status = "VirtualMachineStatus",
    shortname = "vm",
    derive = "PartialEq",
    printcolumn = r#"{"name":"State","type":"string","jsonPath":".status.state"}"#,
    printcolumn = r#"{"name":"ID","type":"string","jsonPath":".status.id"}"#,
    printcolumn = r#"{"name":"Console","type":"string","jsonPath":".status.vnc_endpoint"}"#
)]
#[serde(rename_all = "snake_case")]
pub struct VirtualMachineSpec {
    /// Number of virtual CPUs
    pub cpus: i32,

    /// Guest memory in MiB
    pub memory_mb: i32,

    /// Machine image identifier
    pub image: String,

    /// Desired lifecycle action
    #[schemars(with = "String")]
    pub action: ActionType,

    /// Names of Credential resources whose keys are injected into the guest
    #[serde(default)]
    pub public_keys: Vec<String>,

    /// Request a hosted noVNC console endpoint
    #[serde(default)]
    pub hosted_novnc: bool,
}

/// Desired lifecycle action.
///
/// Anything other than the known actions is kept verbatim so the controller
/// can tell malformed desired state apart from a missing field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActionType {
    Start,
    Stop,
    Reboot,
    Unknown(String),
}

impl ActionType {
    pub fn as_str(&self) -> &str {
        match self {
            ActionType::Start => "start",
            ActionType::Stop => "stop",
            ActionType::Reboot => "reboot",
            ActionType::Unknown(other) => other,
        }
    }

    /// True for the actions clients are allowed to request.
    pub fn is_valid(&self) -> bool {
        !matches!(self, ActionType::Unknown(_))
    }
}

impl From<String> for ActionType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "start" => ActionType::Start,
            "stop" => ActionType::Stop,
            "reboot" => ActionType::Reboot,
            _ => ActionType::Unknown(value),
        }
    }
}

impl From<&str> for ActionType {
    fn from(value: &str) -> Self {
        ActionType::from(value.to_string())
    }
}

impl From<ActionType> for String {
    fn from(value: ActionType) -> Self {
        match value {
            ActionType::Unknown(other) => other,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct VirtualMachineStatus {
    /// Observed lifecycle state
    #[serde(default)]
    pub state: VmState,

    /// Instance id, assigned once and never changed
    #[serde(default)]
    pub id: String,

    /// Guest MAC address, assigned once and never changed
    #[serde(default)]
    pub mac: String,

    /// host:port of the console service once a node port is allocated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vnc_endpoint: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
/// Observed VM lifecycle state
#[serde(rename_all = "lowercase")]
pub enum VmState {
    #[default]
    Pending,
    Running,
    Stopping,
    Stopped,
    Terminating,
    Terminated,
    Error,
}

impl fmt::Display for VmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VmState::Pending => "pending",
            VmState::Running => "running",
            VmState::Stopping => "stopping",
            VmState::Stopped => "stopped",
            VmState::Terminating => "terminating",
            VmState::Terminated => "terminated",
            VmState::Error => "error",
        };
        f.write_str(s)
    }
}

impl VirtualMachine {
    /// Status as last observed, or the default (pending, no identity).
    pub fn status_or_default(&self) -> VirtualMachineStatus {
        self.status.clone().unwrap_or_default()
    }

    /// Whether both identity fields have been assigned.
    pub fn has_identity(&self) -> bool {
        self.status
            .as_ref()
            .is_some_and(|s| !s.id.is_empty() && !s.mac.is_empty())
    }
}
