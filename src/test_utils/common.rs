use crate::proto::registry::ServiceRecord;
use crate::store::ServiceSpec;
use tracing_subscriber::EnvFilter;

pub(crate) fn enable_logger() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub(crate) fn record(name: &str) -> ServiceRecord {
    ServiceRecord {
        name: name.to_string(),
        ..Default::default()
    }
}

pub(crate) fn record_with_payload(name: &str, payload: &str) -> ServiceRecord {
    ServiceRecord {
        name: name.to_string(),
        payload: payload.to_string(),
        ..Default::default()
    }
}

pub(crate) fn spec_with_payload(payload: &str) -> ServiceSpec {
    ServiceSpec {
        payload: payload.to_string(),
        ..Default::default()
    }
}
