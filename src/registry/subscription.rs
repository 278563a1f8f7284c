//! Per-watch-call consumer state: query filter, coalescing buffer, and the
//! wake signal between the pipeline and the consumer-facing stream.
//!
//! The buffer keeps at most one undelivered event per key. A newer event
//! for a key overwrites an older undelivered one, so memory is bounded by
//! key-space size regardless of event rate, and the pipeline never waits
//! on a consumer. Superseded intermediate states are dropped on purpose;
//! the registry protocol promises the eventually-consistent current state,
//! not a complete history.

use std::collections::HashMap;
use std::collections::VecDeque;

use nanoid::nanoid;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use super::ChangeEvent;
use crate::proto::registry::ServiceRecord;

/// Query matching as a plain predicate, constructed once per Find call.
pub(crate) type RecordFilter = Box<dyn Fn(&ServiceRecord) -> bool + Send + Sync>;

pub(crate) struct Subscription {
    id: String,
    filter: RecordFilter,
    pending: Mutex<PendingEvents>,
    notify: Notify,
}

#[derive(Default)]
struct PendingEvents {
    /// Latest undelivered event per key.
    slots: HashMap<String, ChangeEvent>,
    /// Keys in first-arrival order; a key appears at most once.
    arrival_order: VecDeque<String>,
    /// Highest version accepted per key. Pushes below the floor are
    /// stale replays (snapshot/live races, re-snapshots) and are dropped
    /// so delivered state never goes backward.
    version_floor: HashMap<String, u64>,
}

impl Subscription {
    pub(crate) fn new(filter: RecordFilter) -> Self {
        Self {
            id: nanoid!(),
            filter,
            pending: Mutex::new(PendingEvents::default()),
            notify: Notify::new(),
        }
    }

    pub(crate) fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn matches(&self, record: &ServiceRecord) -> bool {
        (self.filter)(record)
    }

    /// Store `event` as the pending state for its key, overwriting any
    /// undelivered predecessor, and wake the consumer. Never blocks.
    pub(crate) fn push(&self, event: ChangeEvent) {
        {
            let mut pending = self.pending.lock();
            let key = event.record.name.clone();
            let version = event.record.resource_version;

            if let Some(&floor) = pending.version_floor.get(&key) {
                if version < floor {
                    return;
                }
            }
            pending.version_floor.insert(key.clone(), version);

            if pending.slots.insert(key.clone(), event).is_none() {
                pending.arrival_order.push_back(key);
            }
        }
        self.notify.notify_one();
    }

    /// Block until a key has pending data, or until `cancel` fires
    /// (`None`). Keys drain in first-arrival order.
    pub(crate) async fn next(&self, cancel: &CancellationToken) -> Option<ChangeEvent> {
        loop {
            if let Some(event) = self.pop() {
                return Some(event);
            }
            tokio::select! {
                _ = self.notify.notified() => {}
                _ = cancel.cancelled() => return None,
            }
        }
    }

    fn pop(&self) -> Option<ChangeEvent> {
        let mut pending = self.pending.lock();
        let key = pending.arrival_order.pop_front()?;
        pending.slots.remove(&key)
    }

    #[cfg(test)]
    pub(crate) fn pending_len(&self) -> usize {
        self.pending.lock().slots.len()
    }
}
