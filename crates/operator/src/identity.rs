//! `ContainerIdentity`: stable across in-place resizes, invalidated on pod
//! recreation.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct ContainerIdentity {
    pub namespace: String,
    pub pod_name: String,
    pub container_name: String,
}

impl ContainerIdentity {
    pub fn new(
        namespace: impl Into<String>,
        pod_name: impl Into<String>,
        container_name: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            pod_name: pod_name.into(),
            container_name: container_name.into(),
        }
    }

    /// The workload key this container belongs to, used for per-workload
    /// rate limiting and reconcile serialization. Two containers in the
    /// same pod share a workload key.
    pub fn workload_key(&self) -> String {
        format!("{}/{}", self.namespace, self.pod_name)
    }
}

impl fmt::Display for ContainerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.namespace, self.pod_name, self.container_name)
    }
}
