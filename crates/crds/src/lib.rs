//! RancherVM CRD Definitions
//!
//! Kubernetes Custom Resource Definitions shared by the RancherVM controllers
//! and the administrative API.

pub mod arp_table;
pub mod credential;
pub mod virtual_machine;

pub use arp_table::*;
pub use credential::*;
pub use virtual_machine::*;

/// API group of every RancherVM resource.
pub const GROUP: &str = "vm.rancher.com";
