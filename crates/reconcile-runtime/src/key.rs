//! Reconciliation keys.

use crate::error::RuntimeError;
use kube::Resource;
use std::fmt;
use std::str::FromStr;

/// Identity of the object a reconciliation is about.
///
/// Rendered as `namespace/name`, or just `name` for cluster-scoped objects.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub namespace: Option<String>,
    pub name: String,
}

impl ObjectKey {
    /// Key of a namespaced object.
    pub fn namespaced(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            name: name.into(),
        }
    }

    /// Key of a cluster-scoped object.
    pub fn cluster(name: impl Into<String>) -> Self {
        Self {
            namespace: None,
            name: name.into(),
        }
    }

    /// Key of an object, taken from its metadata.
    pub fn for_object<K: Resource>(obj: &K) -> Result<Self, RuntimeError> {
        let meta = obj.meta();
        let name = meta.name.clone().ok_or(RuntimeError::MissingName)?;
        Ok(Self {
            namespace: meta.namespace.clone(),
            name,
        })
    }

    /// Parses `namespace/name` or `name`.
    pub fn parse(s: &str) -> Result<Self, RuntimeError> {
        let mut parts = s.split('/');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(name), None, None) if !name.is_empty() => Ok(Self::cluster(name)),
            (Some(ns), Some(name), None) if !ns.is_empty() && !name.is_empty() => {
                Ok(Self::namespaced(ns, name))
            }
            _ => Err(RuntimeError::InvalidKey(s.to_string())),
        }
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{}", ns, self.name),
            None => f.write_str(&self.name),
        }
    }
}

impl FromStr for ObjectKey {
    type Err = RuntimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
