use std::collections::HashMap;

use super::*;
use crate::proto::registry::ServiceRecord;
use crate::store::ServiceResource;
use crate::store::ServiceSpec;

#[test]
fn test_record_from_resource_carries_all_fields() {
    let mut labels = HashMap::new();
    labels.insert("tier".to_string(), "edge".to_string());

    let mut resource = ServiceResource::new(
        "ns-a",
        "svc-1",
        ServiceSpec {
            payload: "IP".to_string(),
            labels: labels.clone(),
        },
    );
    resource.meta.resource_version = 7;

    let record = record_from_resource(resource);
    assert_eq!(record.name, "svc-1");
    assert_eq!(record.payload, "IP");
    assert_eq!(record.labels, labels);
    assert_eq!(record.resource_version, 7);
}

#[test]
fn test_resource_from_record_scopes_to_namespace() {
    let record = ServiceRecord {
        name: "svc-1".to_string(),
        payload: String::new(),
        labels: HashMap::new(),
        resource_version: 0,
    };

    let resource = resource_from_record(&record, "ns-a");
    assert_eq!(resource.meta.namespace, "ns-a");
    assert_eq!(resource.meta.name, "svc-1");
    assert_eq!(resource.meta.resource_version, 0);
    assert!(resource.spec.payload.is_empty());
}
