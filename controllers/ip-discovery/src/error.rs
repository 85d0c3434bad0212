//! Controller-specific error types.

use kube::Error as KubeError;
use reconcile_runtime::RuntimeError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur in the IP Discovery Controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// Concurrent modification or duplicate create (HTTP 409)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Host neighbour table could not be read
    #[error("Failed to read ARP table {}: {source}", path.display())]
    ArpRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Informer, queue or worker pool failure
    #[error("Controller runtime error: {0}")]
    Runtime(#[from] RuntimeError),
}

impl ControllerError {
    pub fn from_kube(err: KubeError, what: &str) -> Self {
        match &err {
            KubeError::Api(resp) if resp.code == 409 => {
                Self::Conflict(format!("{}: {}", what, resp.message))
            }
            _ => Self::Kube(err),
        }
    }
}
