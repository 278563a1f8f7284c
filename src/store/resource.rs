use std::collections::HashMap;

use serde::Deserialize;
use serde::Serialize;

/// Store-side envelope of a registered service.
///
/// The bridge copies `spec` verbatim in both directions and never
/// interprets it; only `meta` participates in bridge logic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceResource {
    pub meta: ResourceMeta,
    pub spec: ServiceSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceMeta {
    pub name: String,
    pub namespace: String,
    /// Store-assigned, strictly increasing per key. Used only for
    /// ordering and optimistic concurrency.
    pub resource_version: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceSpec {
    pub payload: String,
    pub labels: HashMap<String, String>,
}

impl ServiceResource {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, spec: ServiceSpec) -> Self {
        Self {
            meta: ResourceMeta {
                name: name.into(),
                namespace: namespace.into(),
                resource_version: 0,
            },
            spec,
        }
    }
}
