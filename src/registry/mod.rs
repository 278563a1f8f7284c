//! The registry-to-resource-store bridge.
//!
//! [`RegistryBridge`] implements the three registry RPCs. Registrations
//! and unregistrations become store mutations; queries are served from the
//! store's listing, and watch-mode queries additionally subscribe to the
//! [`ChangePipeline`], which fans the store's watch stream out to every
//! live [`Subscription`]. Each subscription coalesces undelivered events
//! per key, so a slow consumer only ever costs itself intermediate states,
//! never blocks the pipeline or its peers.

mod pipeline;
mod server;
mod subscription;

pub use server::*;

pub(crate) use pipeline::*;
pub(crate) use subscription::*;

#[cfg(test)]
mod pipeline_test;


#[cfg(test)]
mod subscription_test;

use crate::proto::registry::EventKind;
use crate::proto::registry::ServiceRecord;

/// One translated store change, on its way from the watch stream to the
/// subscriptions. Ephemeral; consumed by zero or more subscriptions and
/// discarded.
#[derive(Debug, Clone)]
pub(crate) struct ChangeEvent {
    pub(crate) kind: EventKind,
    pub(crate) record: ServiceRecord,
}
