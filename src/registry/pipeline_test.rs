use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use super::*;
use crate::errors::StoreError;
use crate::proto::registry::EventKind;
use crate::proto::registry::ServiceRecord;
use crate::store::ResourceEvent;
use crate::store::ResourceEventKind;
use crate::store::ServiceResource;
use crate::test_utils::spec_with_payload;

fn named_filter(name: &str) -> RecordFilter {
    let name = name.to_string();
    Box::new(move |record: &ServiceRecord| record.name == name)
}

fn added(name: &str, version: u64) -> ChangeEvent {
    ChangeEvent {
        kind: EventKind::Added,
        record: ServiceRecord {
            name: name.to_string(),
            resource_version: version,
            ..Default::default()
        },
    }
}

/// # Case: broadcast reaches exactly the subscriptions whose filter matches
#[tokio::test]
async fn test_broadcast_respects_filters() {
    let pipeline = ChangePipeline::new();
    let wants_a = Arc::new(Subscription::new(named_filter("svc-a")));
    let wants_all = Arc::new(Subscription::new(Box::new(|_| true)));
    pipeline.subscribe(wants_a.clone());
    pipeline.subscribe(wants_all.clone());

    pipeline.broadcast(&added("svc-a", 1));
    pipeline.broadcast(&added("svc-b", 2));

    assert_eq!(wants_a.pending_len(), 1);
    assert_eq!(wants_all.pending_len(), 2);
}

/// # Case: a removed subscription incurs no further work
#[tokio::test]
async fn test_unsubscribe_stops_delivery() {
    let pipeline = ChangePipeline::new();
    let subscription = Arc::new(Subscription::new(Box::new(|_| true)));
    pipeline.subscribe(subscription.clone());
    assert_eq!(pipeline.subscription_count(), 1);

    pipeline.unsubscribe(subscription.id());
    assert_eq!(pipeline.subscription_count(), 0);

    pipeline.broadcast(&added("svc-a", 1));
    assert_eq!(subscription.pending_len(), 0);
}

/// # Case: consume translates store events and fans them out in order
#[tokio::test]
async fn test_consume_translates_and_fans_out() {
    let pipeline = ChangePipeline::new();
    let subscription = Arc::new(Subscription::new(Box::new(|_| true)));
    pipeline.subscribe(subscription.clone());

    let mut resource = ServiceResource::new("ns-a", "svc-1", spec_with_payload("IP"));
    resource.meta.resource_version = 1;
    let events = futures::stream::iter(vec![
        Ok(ResourceEvent {
            kind: ResourceEventKind::Added,
            resource: resource.clone(),
        }),
        Ok(ResourceEvent {
            kind: ResourceEventKind::Deleted,
            resource: {
                resource.meta.resource_version = 2;
                resource
            },
        }),
    ])
    .boxed();

    // the stream ends, which is fatal to the read loop
    let result = pipeline.consume(events).await;
    assert!(matches!(result, Err(StoreError::WatchClosed(_))));

    let cancel = CancellationToken::new();
    let received = subscription.next(&cancel).await.unwrap();
    // both events arrived before the consumer read, so they coalesced
    assert_eq!(received.kind, EventKind::Deleted);
    assert_eq!(received.record.name, "svc-1");
    assert_eq!(received.record.resource_version, 2);
    assert_eq!(subscription.pending_len(), 0);
}

/// # Case: a store error on the stream surfaces as fatal
#[tokio::test]
async fn test_consume_surfaces_stream_error() {
    let pipeline = ChangePipeline::new();

    let events = futures::stream::iter(vec![Err(StoreError::Unavailable(
        "connection reset".to_string(),
    ))])
    .boxed();

    let result = timeout(Duration::from_secs(1), pipeline.consume(events))
        .await
        .expect("consume should return promptly");
    assert!(matches!(result, Err(StoreError::Unavailable(_))));
}
