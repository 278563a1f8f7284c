//! Registry bridge server: the three registry RPCs and the lifecycle of
//! the change pipeline and its subscriptions.
//!
//! # Control flow
//! A `Register` call becomes a store create/update; the store's own watch
//! mechanism emits the change; the bridge's watch loop feeds it through
//! the [`ChangePipeline`] to every matching subscription; each
//! subscription's relay task delivers it on that caller's `Find` stream.
//! One-shot `Find` calls bypass the pipeline entirely and are served from
//! a single `list`.
//!
//! # Watch recovery
//! A terminal watch error is fatal to the pipeline's read loop. The
//! bridge-level loop re-establishes the watch, then re-lists and replays
//! the listing as synthetic `Added` events to all live subscriptions, so
//! no watcher silently misses updates. Deletions that happened while the
//! watch was down are not tombstoned by the replay; per-key version floors
//! in the subscriptions keep the replay from regressing delivered state.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures::Stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tonic::Request;
use tonic::Response;
use tonic::Status;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::ChangeEvent;
use super::ChangePipeline;
use super::RecordFilter;
use super::Subscription;
use crate::errors::Error;
use crate::errors::StoreError;
use crate::metrics;
use crate::proto::registry::service_registry_server::ServiceRegistry;
use crate::proto::registry::EventKind;
use crate::proto::registry::FindResponse;
use crate::proto::registry::Query;
use crate::proto::registry::ServiceRecord;
use crate::proto::registry::UnregisterResponse;
use crate::store::ResourceStore;
use crate::utils::record_from_resource;
use crate::utils::resource_from_record;

/// Delay before the watch loop retries after a failed or terminated watch.
const WATCH_RETRY_DELAY: Duration = Duration::from_millis(200);

/// Buffered responses per watch stream between the relay task and tonic.
const FIND_STREAM_BUFFER: usize = 16;

pub struct RegistryBridge {
    namespace: String,
    store: Arc<dyn ResourceStore>,
    pipeline: Arc<ChangePipeline>,
    shutdown: CancellationToken,
}

impl RegistryBridge {
    /// Build a bridge over `store`, scoped to `namespace` (empty = all
    /// namespaces), and spawn its watch loop. Cancelling `shutdown` stops
    /// the loop and terminates every live watch stream.
    pub fn new(
        namespace: impl Into<String>,
        store: Arc<dyn ResourceStore>,
        shutdown: CancellationToken,
    ) -> Self {
        let namespace = namespace.into();
        let pipeline = Arc::new(ChangePipeline::new());

        tokio::spawn(run_watch_loop(
            namespace.clone(),
            store.clone(),
            pipeline.clone(),
            shutdown.clone(),
        ));

        Self {
            namespace,
            store,
            pipeline,
            shutdown,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Live watch subscriptions, for monitoring and tests.
    pub fn subscription_count(&self) -> usize {
        self.pipeline.subscription_count()
    }
}

#[tonic::async_trait]
impl ServiceRegistry for RegistryBridge {
    async fn register(
        &self,
        request: Request<ServiceRecord>,
    ) -> std::result::Result<Response<ServiceRecord>, Status> {
        let record = request.into_inner();
        if record.name.is_empty() {
            metrics::REGISTRATIONS_TOTAL.with_label_values(&["rejected"]).inc();
            return Err(Error::InvalidArgument("service record name must not be empty".to_string()).into());
        }

        let mut resource = resource_from_record(&record, &self.namespace);
        let result = match self.store.get(&self.namespace, &record.name).await {
            // Full replace of the stored entity; the store's version check
            // arbitrates concurrent registrations of the same name.
            Ok(Some(existing)) => {
                resource.meta.resource_version = existing.meta.resource_version;
                self.store.update(&self.namespace, resource).await
            }
            Ok(None) => self.store.create(&self.namespace, resource).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(stored) => {
                metrics::REGISTRATIONS_TOTAL.with_label_values(&["ok"]).inc();
                debug!(
                    name = %record.name,
                    version = stored.meta.resource_version,
                    "service registered"
                );
                Ok(Response::new(record_from_resource(stored)))
            }
            Err(e) => {
                metrics::REGISTRATIONS_TOTAL.with_label_values(&["error"]).inc();
                Err(e.into())
            }
        }
    }

    async fn unregister(
        &self,
        request: Request<ServiceRecord>,
    ) -> std::result::Result<Response<UnregisterResponse>, Status> {
        let record = request.into_inner();
        match self.store.delete(&self.namespace, &record.name).await {
            Ok(()) => {
                metrics::UNREGISTRATIONS_TOTAL.with_label_values(&["ok"]).inc();
                debug!(name = %record.name, "service unregistered");
                Ok(Response::new(UnregisterResponse {}))
            }
            // already absent; unregistration is idempotent
            Err(StoreError::NotFound { .. }) => {
                metrics::UNREGISTRATIONS_TOTAL.with_label_values(&["ok"]).inc();
                Ok(Response::new(UnregisterResponse {}))
            }
            Err(e) => {
                metrics::UNREGISTRATIONS_TOTAL.with_label_values(&["error"]).inc();
                Err(e.into())
            }
        }
    }

    type FindStream = Pin<Box<dyn Stream<Item = std::result::Result<FindResponse, Status>> + Send>>;

    async fn find(
        &self,
        request: Request<Query>,
    ) -> std::result::Result<Response<Self::FindStream>, Status> {
        let query = request.into_inner();
        let mode = if query.watch { "watch" } else { "one_shot" };
        metrics::FIND_TOTAL.with_label_values(&[mode]).inc();

        let filter = query_filter(&query);
        let resources = self.store.list(&self.namespace).await?;
        let snapshot: Vec<ServiceRecord> = resources
            .into_iter()
            .map(record_from_resource)
            .filter(|record| filter(record))
            .collect();

        if !query.watch {
            debug!(name = %query.name, matches = snapshot.len(), "serving one-shot find");
            let responses: Vec<std::result::Result<FindResponse, Status>> = snapshot
                .into_iter()
                .map(|record| {
                    Ok(FindResponse {
                        kind: EventKind::Added as i32,
                        service: Some(record),
                    })
                })
                .collect();
            return Ok(Response::new(
                Box::pin(futures::stream::iter(responses)) as Self::FindStream
            ));
        }

        // Snapshot first, then go live: the current listing enters the
        // subscription as synthetic Added events before any pipeline
        // delivery can reach it.
        let subscription = Arc::new(Subscription::new(filter));
        for record in snapshot {
            subscription.push(ChangeEvent {
                kind: EventKind::Added,
                record,
            });
        }
        self.pipeline.subscribe(subscription.clone());
        metrics::ACTIVE_SUBSCRIPTIONS.inc();
        debug!(subscription = subscription.id(), name = %query.name, "watch subscription opened");

        let (tx, rx) = mpsc::channel(FIND_STREAM_BUFFER);
        let pipeline = self.pipeline.clone();
        let cancel = self.shutdown.child_token();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    next = subscription.next(&cancel) => match next {
                        Some(event) => {
                            let response = FindResponse {
                                kind: event.kind as i32,
                                service: Some(event.record),
                            };
                            if tx.send(Ok(response)).await.is_err() {
                                break;
                            }
                        }
                        // bridge shutdown terminates the stream with an
                        // error, never a silent close
                        None => {
                            let _ = tx.try_send(Err(Status::unavailable(
                                "registry bridge is shutting down",
                            )));
                            break;
                        }
                    },
                    _ = tx.closed() => break,
                }
            }
            pipeline.unsubscribe(subscription.id());
            metrics::ACTIVE_SUBSCRIPTIONS.dec();
            debug!(subscription = subscription.id(), "watch subscription closed");
        });

        Ok(Response::new(
            Box::pin(ReceiverStream::new(rx)) as Self::FindStream
        ))
    }
}

/// Bridge-level watch loop: establish the watch, replay a fresh listing to
/// live subscriptions after a restart, then hand the stream to the
/// pipeline until it fails.
async fn run_watch_loop(
    namespace: String,
    store: Arc<dyn ResourceStore>,
    pipeline: Arc<ChangePipeline>,
    shutdown: CancellationToken,
) {
    let mut resnapshot = false;
    loop {
        let events = tokio::select! {
            result = store.watch(&namespace) => result,
            _ = shutdown.cancelled() => break,
        };
        let events = match events {
            Ok(events) => events,
            Err(e) => {
                warn!(error = %e, "failed to establish store watch");
                if pause(&shutdown, WATCH_RETRY_DELAY).await {
                    break;
                }
                continue;
            }
        };

        if resnapshot {
            metrics::WATCH_RESTARTS_TOTAL.inc();
            match store.list(&namespace).await {
                Ok(resources) => {
                    info!(
                        count = resources.len(),
                        "watch re-established, re-snapshotting live subscriptions"
                    );
                    for resource in resources {
                        pipeline.broadcast(&ChangeEvent {
                            kind: EventKind::Added,
                            record: record_from_resource(resource),
                        });
                    }
                }
                Err(e) => warn!(error = %e, "re-snapshot list failed"),
            }
        }
        resnapshot = true;

        tokio::select! {
            result = pipeline.consume(events) => {
                if let Err(e) = result {
                    warn!(error = %e, "watch stream terminated");
                }
            }
            _ = shutdown.cancelled() => break,
        }

        if pause(&shutdown, WATCH_RETRY_DELAY).await {
            break;
        }
    }
    debug!("change pipeline stopped");
}

/// Sleep for `delay`; true when `shutdown` fired instead.
async fn pause(shutdown: &CancellationToken, delay: Duration) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(delay) => false,
        _ = shutdown.cancelled() => true,
    }
}

fn query_filter(query: &Query) -> RecordFilter {
    if query.name.is_empty() {
        Box::new(|_| true)
    } else {
        let name = query.name.clone();
        Box::new(move |record: &ServiceRecord| record.name == name)
    }
}
