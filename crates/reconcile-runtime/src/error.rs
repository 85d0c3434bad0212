//! Errors raised by the controller machinery itself.

use thiserror::Error;

/// Errors that can occur while running informers, queues and workers.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Object metadata carries no name
    #[error("Object has no name")]
    MissingName,

    /// Text is not a `namespace/name` or `name` key
    #[error("Invalid object key: {0}")]
    InvalidKey(String),

    /// Metric could not be built or registered
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// Probe server failed to bind or serve
    #[error("Probe server error: {0}")]
    Server(#[from] std::io::Error),

    /// A worker task panicked or was cancelled
    #[error("Worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
