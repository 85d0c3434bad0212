//! API server configuration.

use crate::error::ServerError;
use std::env;
use std::net::SocketAddr;

/// Settings for the admin API server.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Address the HTTP server binds to
    pub listen_addr: SocketAddr,
    /// Namespace VirtualMachines are created in and listed from
    pub namespace: String,
}

impl ApiConfig {
    pub fn from_env() -> Result<Self, ServerError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ServerError> {
        let listen_addr = match lookup("LISTEN_ADDR") {
            None => SocketAddr::from(([0, 0, 0, 0], 9500)),
            Some(raw) => raw
                .parse()
                .map_err(|e| ServerError::InvalidConfig(format!("LISTEN_ADDR={raw:?}: {e}")))?,
        };
        Ok(Self {
            listen_addr,
            namespace: lookup("WATCH_NAMESPACE")
                .filter(|ns| !ns.is_empty())
                .unwrap_or_else(|| "default".to_string()),
        })
    }
}
