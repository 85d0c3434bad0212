//! RancherVM Administrative API
//!
//! HTTP front end for creating, listing, acting on and deleting
//! VirtualMachines and Credentials, plus a read-only host listing. Every
//! request is a thin translation onto an [`ApiStore`]; the controllers do
//! the actual work.

pub mod config;
pub mod error;
pub mod handlers;
pub mod request;
pub mod store;
pub mod validation;

#[cfg(test)]
mod test_utils;

pub use config::ApiConfig;
pub use error::{ApiError, ServerError};
pub use handlers::{router, AppState};
pub use store::{ApiStore, KubeApiStore, StoreError};
