//! ServiceLoadBalancerStatus Custom Resource Definition
//!
//! One object per load-balanced Service, owned by the controller. Its status
//! holds the flat set of cloud resource identifiers currently believed to
//! belong to that Service. The spec is empty.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Suffix appended to the Service name to build the mirror object name
pub const STATUS_MIRROR_SUFFIX: &str = "-status";

#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "networking.gke.io",
    version = "v1",
    kind = "ServiceLoadBalancerStatus",
    namespaced,
    status = "ServiceLoadBalancerStatusStatus",
    shortname = "svclbstatus",
    derive = "PartialEq",
    printcolumn = r#"{"name":"Resources","type":"string","jsonPath":".status.resourceIdentifiers"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
pub struct ServiceLoadBalancerStatusSpec {}

/// Observed cloud resources of a load-balanced Service
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceLoadBalancerStatusStatus {
    /// Identifiers (self links) of the cloud resources owned by the Service.
    /// Treated as an unordered set.
    #[serde(default)]
    pub resource_identifiers: Vec<String>,
}

/// Name of the status mirror object for a Service
pub fn status_mirror_name(service_name: &str) -> String {
    format!("{service_name}{STATUS_MIRROR_SUFFIX}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mirror_name() {
        assert_eq!(status_mirror_name("test-svc"), "test-svc-status");
    }

    #[test]
    fn test_status_serializes_camel_case() {
        let status = ServiceLoadBalancerStatusStatus {
            resource_identifiers: vec!["res-a".to_string()],
        };
        let value = serde_json::to_value(&status).unwrap();
        assert_eq!(value["resourceIdentifiers"][0], "res-a");
    }

    #[test]
    fn test_missing_resource_list_deserializes_empty() {
        let status: ServiceLoadBalancerStatusStatus = serde_json::from_str("{}").unwrap();
        assert!(status.resource_identifiers.is_empty());
    }
}
