use std::time::Duration;

use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use super::*;
use crate::proto::registry::EventKind;
use crate::proto::registry::ServiceRecord;
use crate::test_utils::record_with_payload;

fn match_all() -> RecordFilter {
    Box::new(|_| true)
}

fn event(kind: EventKind, name: &str, payload: &str, version: u64) -> ChangeEvent {
    let mut record = record_with_payload(name, payload);
    record.resource_version = version;
    ChangeEvent { kind, record }
}

/// # Case: a pushed event is handed out by next
#[tokio::test]
async fn test_next_returns_pushed_event() {
    let subscription = Subscription::new(match_all());
    let cancel = CancellationToken::new();

    subscription.push(event(EventKind::Added, "svc-1", "IP", 1));

    let received = subscription.next(&cancel).await.unwrap();
    assert_eq!(received.record.name, "svc-1");
    assert_eq!(received.kind, EventKind::Added);
    assert_eq!(subscription.pending_len(), 0);
}

/// # Case: next blocks while nothing is pending
#[tokio::test]
async fn test_next_blocks_without_pending_data() {
    let subscription = Subscription::new(match_all());
    let cancel = CancellationToken::new();

    let result = timeout(Duration::from_millis(50), subscription.next(&cancel)).await;
    assert!(result.is_err());
}

/// # Case: two undelivered updates for one key coalesce to the latest
#[tokio::test]
async fn test_coalesces_undelivered_updates_per_key() {
    let subscription = Subscription::new(match_all());
    let cancel = CancellationToken::new();

    subscription.push(event(EventKind::Modified, "svc-1", "intermediate", 2));
    subscription.push(event(EventKind::Modified, "svc-1", "final", 3));
    assert_eq!(subscription.pending_len(), 1);

    let received = subscription.next(&cancel).await.unwrap();
    assert_eq!(received.record.payload, "final");
    assert_eq!(received.record.resource_version, 3);

    // the intermediate state is gone, not queued behind
    let result = timeout(Duration::from_millis(50), subscription.next(&cancel)).await;
    assert!(result.is_err());
}

/// # Case: a deletion replaces a pending add, no ghost add is delivered
#[tokio::test]
async fn test_delete_replaces_pending_add() {
    let subscription = Subscription::new(match_all());
    let cancel = CancellationToken::new();

    subscription.push(event(EventKind::Added, "svc-1", "", 1));
    subscription.push(event(EventKind::Deleted, "svc-1", "", 2));

    let received = subscription.next(&cancel).await.unwrap();
    assert_eq!(received.kind, EventKind::Deleted);
    assert_eq!(subscription.pending_len(), 0);
}

/// # Case: keys drain in first-arrival order, coalescing keeps the slot
#[tokio::test]
async fn test_keys_drain_in_first_arrival_order() {
    let subscription = Subscription::new(match_all());
    let cancel = CancellationToken::new();

    subscription.push(event(EventKind::Added, "svc-a", "", 1));
    subscription.push(event(EventKind::Added, "svc-b", "", 2));
    subscription.push(event(EventKind::Modified, "svc-a", "IP", 3));

    let first = subscription.next(&cancel).await.unwrap();
    assert_eq!(first.record.name, "svc-a");
    assert_eq!(first.record.resource_version, 3);

    let second = subscription.next(&cancel).await.unwrap();
    assert_eq!(second.record.name, "svc-b");
}

/// # Case: a push below the delivered version for its key is dropped
#[tokio::test]
async fn test_stale_push_is_dropped() {
    let subscription = Subscription::new(match_all());
    let cancel = CancellationToken::new();

    subscription.push(event(EventKind::Modified, "svc-1", "newer", 5));
    let received = subscription.next(&cancel).await.unwrap();
    assert_eq!(received.record.resource_version, 5);

    // stale replay, e.g. a snapshot raced by a live event
    subscription.push(event(EventKind::Modified, "svc-1", "older", 3));
    assert_eq!(subscription.pending_len(), 0);

    // an equal version replays (re-snapshot), a newer one flows
    subscription.push(event(EventKind::Modified, "svc-1", "newer", 5));
    assert_eq!(subscription.pending_len(), 1);
}

/// # Case: cancellation promptly unblocks a waiting next
#[tokio::test]
async fn test_cancellation_unblocks_next() {
    let subscription = std::sync::Arc::new(Subscription::new(match_all()));
    let cancel = CancellationToken::new();

    let waiter = {
        let subscription = subscription.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { subscription.next(&cancel).await })
    };

    cancel.cancel();
    let result = timeout(Duration::from_secs(1), waiter)
        .await
        .expect("next did not unblock on cancellation")
        .unwrap();
    assert!(result.is_none());
}

/// # Case: the filter decides what the pipeline may push
#[tokio::test]
async fn test_filter_matches() {
    let name = "svc-1".to_string();
    let subscription =
        Subscription::new(Box::new(move |record: &ServiceRecord| record.name == name));

    assert!(subscription.matches(&record_with_payload("svc-1", "")));
    assert!(!subscription.matches(&record_with_payload("svc-2", "")));
}
