//! Single-writer fan-out from the store's watch stream to every live
//! subscription.
//!
//! One [`ChangePipeline`] per bridge instance. The subscription set is the
//! only state touched from multiple tasks; a single mutex guards it for
//! add/remove/iterate, never across delivery. Delivery itself is
//! [`Subscription::push`], which never blocks, so one slow consumer cannot
//! stall the read loop or its peers.

use std::collections::HashMap;
use std::sync::Arc;

use futures::StreamExt;
use parking_lot::Mutex;
use tracing::trace;

use super::ChangeEvent;
use super::Subscription;
use crate::errors::StoreError;
use crate::metrics;
use crate::proto::registry::EventKind;
use crate::store::ResourceEvent;
use crate::store::ResourceEventKind;
use crate::store::ResourceWatchStream;
use crate::utils::record_from_resource;

pub(crate) struct ChangePipeline {
    subscriptions: Mutex<HashMap<String, Arc<Subscription>>>,
}

impl ChangePipeline {
    pub(crate) fn new() -> Self {
        Self {
            subscriptions: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn subscribe(&self, subscription: Arc<Subscription>) {
        self.subscriptions
            .lock()
            .insert(subscription.id().to_string(), subscription);
    }

    pub(crate) fn unsubscribe(&self, id: &str) {
        self.subscriptions.lock().remove(id);
    }

    pub(crate) fn subscription_count(&self) -> usize {
        self.subscriptions.lock().len()
    }

    /// Push `event` to every subscription whose filter matches.
    pub(crate) fn broadcast(&self, event: &ChangeEvent) {
        let matched: Vec<Arc<Subscription>> = {
            let subscriptions = self.subscriptions.lock();
            subscriptions
                .values()
                .filter(|subscription| subscription.matches(&event.record))
                .cloned()
                .collect()
        };

        trace!(
            name = %event.record.name,
            version = event.record.resource_version,
            subscribers = matched.len(),
            "fan-out"
        );
        for subscription in &matched {
            subscription.push(event.clone());
        }
        metrics::EVENTS_FANNED_OUT_TOTAL.inc_by(matched.len() as u64);
    }

    /// Sequential read loop over one watch stream. Per-key event order is
    /// preserved end to end. A stream error, or the stream ending at all,
    /// is fatal here: resuming without a re-snapshot would let watchers
    /// silently miss updates, so recovery belongs to the bridge.
    pub(crate) async fn consume(&self, mut events: ResourceWatchStream) -> Result<(), StoreError> {
        while let Some(item) = events.next().await {
            let event = item?;
            self.broadcast(&change_from_resource_event(event));
        }
        Err(StoreError::WatchClosed("watch stream ended".to_string()))
    }
}

fn change_from_resource_event(event: ResourceEvent) -> ChangeEvent {
    let kind = match event.kind {
        ResourceEventKind::Added => EventKind::Added,
        ResourceEventKind::Modified => EventKind::Modified,
        ResourceEventKind::Deleted => EventKind::Deleted,
    };
    ChangeEvent {
        kind,
        record: record_from_resource(event.resource),
    }
}
