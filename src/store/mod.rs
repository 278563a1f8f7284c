//! Resource store interface boundary.
//!
//! The bridge never talks to a concrete store directly; everything goes
//! through [`ResourceStore`]. The trait mirrors the primitives a
//! Kubernetes-style custom-resource client exposes: namespaced point
//! reads, listing, create/update/delete, and a watch stream of change
//! events. Keys are `(namespace, name)`; `resource_version` is
//! store-assigned and strictly increasing per key.
//!
//! An empty namespace spans all namespaces for `list`/`watch`. The
//! mutating calls treat the namespace literally.

mod memory;
mod resource;

pub use memory::*;
pub use resource::*;


use futures::stream::BoxStream;

use crate::errors::StoreError;

/// A single change observed on the store's watch stream.
#[derive(Debug, Clone)]
pub struct ResourceEvent {
    pub kind: ResourceEventKind,
    pub resource: ServiceResource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceEventKind {
    Added,
    Modified,
    Deleted,
}

/// Watch streams deliver events for a given key in non-decreasing version
/// order. A stream that ends or errors cannot be resumed; callers
/// re-establish the watch and re-snapshot.
pub type ResourceWatchStream = BoxStream<'static, std::result::Result<ResourceEvent, StoreError>>;

#[cfg_attr(test, mockall::automock)]
#[tonic::async_trait]
pub trait ResourceStore: Send + Sync + 'static {
    /// Point read. `Ok(None)` when no entity is stored under the key.
    async fn get(
        &self,
        namespace: &str,
        name: &str,
    ) -> std::result::Result<Option<ServiceResource>, StoreError>;

    /// All entities in `namespace`, every namespace when it is empty.
    async fn list(
        &self,
        namespace: &str,
    ) -> std::result::Result<Vec<ServiceResource>, StoreError>;

    /// Persist a new entity. Fails with `AlreadyExists` when the key is
    /// taken; the store assigns the resource version.
    async fn create(
        &self,
        namespace: &str,
        resource: ServiceResource,
    ) -> std::result::Result<ServiceResource, StoreError>;

    /// Full replace of an existing entity. The incoming resource version
    /// must match the stored one (0 skips the check); the store assigns a
    /// fresh version on success.
    async fn update(
        &self,
        namespace: &str,
        resource: ServiceResource,
    ) -> std::result::Result<ServiceResource, StoreError>;

    /// Delete by key. Fails with `NotFound` when absent.
    async fn delete(&self, namespace: &str, name: &str) -> std::result::Result<(), StoreError>;

    /// Live change stream for `namespace` (empty = all namespaces),
    /// starting from the moment of the call.
    async fn watch(
        &self,
        namespace: &str,
    ) -> std::result::Result<ResourceWatchStream, StoreError>;
}
