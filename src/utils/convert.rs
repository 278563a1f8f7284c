//! Stateless mapping between the stored resource envelope and the wire
//! registry record. Same fields, different shape; nothing here interprets
//! payload or labels.

use crate::proto::registry::ServiceRecord;
use crate::store::ResourceMeta;
use crate::store::ServiceResource;
use crate::store::ServiceSpec;

pub fn record_from_resource(resource: ServiceResource) -> ServiceRecord {
    ServiceRecord {
        name: resource.meta.name,
        payload: resource.spec.payload,
        labels: resource.spec.labels,
        resource_version: resource.meta.resource_version,
    }
}

pub fn resource_from_record(record: &ServiceRecord, namespace: &str) -> ServiceResource {
    ServiceResource {
        meta: ResourceMeta {
            name: record.name.clone(),
            namespace: namespace.to_string(),
            resource_version: record.resource_version,
        },
        spec: ServiceSpec {
            payload: record.payload.clone(),
            labels: record.labels.clone(),
        },
    }
}
