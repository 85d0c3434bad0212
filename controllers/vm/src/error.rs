//! Controller-specific error types.

use reconcile_runtime::RuntimeError;
use kube::Error as KubeError;
use thiserror::Error;

/// Errors that can occur in the VM Controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// Object does not exist (HTTP 404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Concurrent modification or duplicate create (HTTP 409)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// VirtualMachine has no usable uid to derive its identity from
    #[error("VirtualMachine has no usable uid: {0}")]
    MissingUid(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    Watch(String),

    /// Informer, queue or worker pool failure
    #[error("Controller runtime error: {0}")]
    Runtime(#[from] RuntimeError),
}

impl ControllerError {
    /// Classifies a kube error, turning 404 and 409 into their own variants.
    pub fn from_kube(err: KubeError, what: &str) -> Self {
        match &err {
            KubeError::Api(resp) if resp.code == 404 => Self::NotFound(what.to_string()),
            KubeError::Api(resp) if resp.code == 409 => {
                Self::Conflict(format!("{}: {}", what, resp.message))
            }
            _ => Self::Kube(err),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}
