//! Controller configuration, read once from the environment at startup.

use crate::error::ControllerError;
use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

/// Label values that mark objects owned by this controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnershipLabels {
    /// Value of the `app` label on every child object
    pub app: String,
    /// `role` of the VM workload pod
    pub vm_role: String,
    /// `role` of the console pod and service
    pub console_role: String,
}

impl Default for OwnershipLabels {
    fn default() -> Self {
        Self {
            app: "ranchervm".to_string(),
            vm_role: "vm".to_string(),
            console_role: "novnc".to_string(),
        }
    }
}

/// Settings for the VM controller.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Namespace to watch; all namespaces when `None`
    pub namespace: Option<String>,
    /// Concurrent reconcile workers
    pub workers: usize,
    /// Failed reconciles of one key are requeued this many times before it is dropped
    pub max_retries: u32,
    /// Host part of the console endpoint reported in VM status
    pub console_host: String,
    /// Host interface the guest network is bridged onto
    pub vm_interface: String,
    /// Listen address of the health and metrics server
    pub metrics_addr: SocketAddr,
    /// Labels that mark pods and services as owned by a VM
    pub labels: OwnershipLabels,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            namespace: None,
            workers: 5,
            max_retries: 5,
            console_host: "kvm.local".to_string(),
            vm_interface: "ens33".to_string(),
            metrics_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            labels: OwnershipLabels::default(),
        }
    }
}

impl ControllerConfig {
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ControllerError> {
        let defaults = Self::default();
        Ok(Self {
            namespace: lookup("WATCH_NAMESPACE").filter(|ns| !ns.is_empty()),
            workers: parse_or(&lookup, "WORKERS", defaults.workers)?,
            max_retries: parse_or(&lookup, "MAX_RETRIES", defaults.max_retries)?,
            console_host: lookup("CONSOLE_HOST").unwrap_or(defaults.console_host),
            vm_interface: lookup("VM_INTERFACE").unwrap_or(defaults.vm_interface),
            metrics_addr: parse_or(&lookup, "METRICS_ADDR", defaults.metrics_addr)?,
            labels: defaults.labels,
        })
    }
}

fn parse_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ControllerError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|e| ControllerError::InvalidConfig(format!("{key}={raw:?}: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ControllerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.namespace, None);
        assert_eq!(config.workers, 5);
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.console_host, "kvm.local");
        assert_eq!(config.vm_interface, "ens33");
        assert_eq!(config.metrics_addr.port(), 8080);
        assert_eq!(config.labels.app, "ranchervm");
    }

    #[test]
    fn test_overrides() {
        let config = ControllerConfig::from_lookup(lookup(&[
            ("WATCH_NAMESPACE", "vms"),
            ("WORKERS", "2"),
            ("CONSOLE_HOST", "node1.example.com"),
            ("METRICS_ADDR", "127.0.0.1:9000"),
        ]))
        .unwrap();
        assert_eq!(config.namespace.as_deref(), Some("vms"));
        assert_eq!(config.workers, 2);
        assert_eq!(config.console_host, "node1.example.com");
        assert_eq!(config.metrics_addr.port(), 9000);
    }

    #[test]
    fn test_invalid_number_is_rejected() {
        let err = ControllerConfig::from_lookup(lookup(&[("WORKERS", "many")])).unwrap_err();
        assert!(matches!(err, ControllerError::InvalidConfig(msg) if msg.contains("WORKERS")));
    }
}
