//! In-memory [`ResourceStore`] implementation.
//!
//! Backs standalone deployments and the test suite. Reads go straight to
//! the concurrent object map; mutations serialize on a single lock so the
//! version counter and the broadcast change feed agree — watch events for
//! a key always leave in version order.

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing::trace;

use super::ResourceEvent;
use super::ResourceEventKind;
use super::ResourceStore;
use super::ResourceWatchStream;
use super::ServiceResource;
use crate::errors::StoreError;

/// Capacity of the change feed. A watcher that falls this far behind is
/// cut off with `WatchClosed` and must re-snapshot.
const EVENT_FEED_CAPACITY: usize = 1024;

pub struct MemoryStore {
    objects: DashMap<ObjectKey, ServiceResource>,
    version: AtomicU64,
    // serializes mutations so events enter the feed in version order
    write_lock: Mutex<()>,
    events: broadcast::Sender<ResourceEvent>,
}

type ObjectKey = (String, String);

impl MemoryStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_FEED_CAPACITY);
        Self {
            objects: DashMap::new(),
            version: AtomicU64::new(0),
            write_lock: Mutex::new(()),
            events,
        }
    }

    /// Number of live receivers on the change feed. Primarily for
    /// monitoring and tests.
    pub fn watcher_count(&self) -> usize {
        self.events.receiver_count()
    }

    fn next_version(&self) -> u64 {
        self.version.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn publish(&self, kind: ResourceEventKind, resource: ServiceResource) {
        trace!(
            name = %resource.meta.name,
            namespace = %resource.meta.namespace,
            version = resource.meta.resource_version,
            ?kind,
            "store event"
        );
        // no receivers is fine
        let _ = self.events.send(ResourceEvent { kind, resource });
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[tonic::async_trait]
impl ResourceStore for MemoryStore {
    async fn get(
        &self,
        namespace: &str,
        name: &str,
    ) -> std::result::Result<Option<ServiceResource>, StoreError> {
        let key = (namespace.to_string(), name.to_string());
        Ok(self.objects.get(&key).map(|entry| entry.value().clone()))
    }

    async fn list(
        &self,
        namespace: &str,
    ) -> std::result::Result<Vec<ServiceResource>, StoreError> {
        let mut resources: Vec<ServiceResource> = self
            .objects
            .iter()
            .filter(|entry| namespace.is_empty() || entry.meta.namespace == namespace)
            .map(|entry| entry.value().clone())
            .collect();
        resources.sort_by(|a, b| {
            (&a.meta.namespace, &a.meta.name).cmp(&(&b.meta.namespace, &b.meta.name))
        });
        Ok(resources)
    }

    async fn create(
        &self,
        namespace: &str,
        resource: ServiceResource,
    ) -> std::result::Result<ServiceResource, StoreError> {
        let _guard = self.write_lock.lock();
        let key = (namespace.to_string(), resource.meta.name.clone());
        if self.objects.contains_key(&key) {
            return Err(StoreError::AlreadyExists {
                namespace: namespace.to_string(),
                name: resource.meta.name,
            });
        }

        let mut stored = resource;
        stored.meta.namespace = namespace.to_string();
        stored.meta.resource_version = self.next_version();
        self.objects.insert(key, stored.clone());
        self.publish(ResourceEventKind::Added, stored.clone());
        Ok(stored)
    }

    async fn update(
        &self,
        namespace: &str,
        resource: ServiceResource,
    ) -> std::result::Result<ServiceResource, StoreError> {
        let _guard = self.write_lock.lock();
        let key = (namespace.to_string(), resource.meta.name.clone());
        let current_version = match self.objects.get(&key) {
            Some(entry) => entry.meta.resource_version,
            None => {
                return Err(StoreError::NotFound {
                    namespace: namespace.to_string(),
                    name: resource.meta.name,
                })
            }
        };

        // optimistic concurrency; a version of 0 opts out of the check
        if resource.meta.resource_version != 0 && resource.meta.resource_version != current_version
        {
            return Err(StoreError::Conflict {
                namespace: namespace.to_string(),
                name: resource.meta.name,
                expected: current_version,
                actual: resource.meta.resource_version,
            });
        }

        let mut stored = resource;
        stored.meta.namespace = namespace.to_string();
        stored.meta.resource_version = self.next_version();
        self.objects.insert(key, stored.clone());
        self.publish(ResourceEventKind::Modified, stored.clone());
        Ok(stored)
    }

    async fn delete(&self, namespace: &str, name: &str) -> std::result::Result<(), StoreError> {
        let _guard = self.write_lock.lock();
        let key = (namespace.to_string(), name.to_string());
        match self.objects.remove(&key) {
            Some((_, mut removed)) => {
                // the deletion itself gets a fresh version so it orders
                // after every prior state of the key
                removed.meta.resource_version = self.next_version();
                self.publish(ResourceEventKind::Deleted, removed);
                Ok(())
            }
            None => Err(StoreError::NotFound {
                namespace: namespace.to_string(),
                name: name.to_string(),
            }),
        }
    }

    async fn watch(
        &self,
        namespace: &str,
    ) -> std::result::Result<ResourceWatchStream, StoreError> {
        let namespace = namespace.to_string();
        let receiver = self.events.subscribe();
        let stream = BroadcastStream::new(receiver).filter_map(move |item| match item {
            Ok(event) => {
                if namespace.is_empty() || event.resource.meta.namespace == namespace {
                    Some(Ok(event))
                } else {
                    None
                }
            }
            Err(BroadcastStreamRecvError::Lagged(missed)) => Some(Err(StoreError::WatchClosed(
                format!("watch receiver lagged by {} events", missed),
            ))),
        });
        Ok(Box::pin(stream))
    }
}
