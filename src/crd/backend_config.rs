//! BackendConfig Custom Resource Definition
//!
//! A shared configuration object that Services reference by name through the
//! `cloud.google.com/backend-config` annotation. Only the settings relevant
//! to L4 backend services are modelled.

use std::collections::BTreeMap;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Annotation naming the BackendConfig(s) used by a Service
pub const BACKEND_CONFIG_ANNOTATION: &str = "cloud.google.com/backend-config";

/// Legacy beta annotation, still honoured when the GA key is absent
pub const BETA_BACKEND_CONFIG_ANNOTATION: &str = "beta.cloud.google.com/backend-config";

#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "cloud.google.com",
    version = "v1",
    kind = "BackendConfig",
    namespaced,
    shortname = "bc",
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct BackendConfigSpec {
    /// Backend service timeout in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_sec: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_draining: Option<ConnectionDrainingConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LogConfig>,

    /// Session affinity type (CLIENT_IP, NONE, ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_affinity: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionDrainingConfig {
    pub draining_timeout_sec: i64,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LogConfig {
    #[serde(default)]
    pub enable: bool,

    /// Fraction of requests to log, 0.0 - 1.0
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<f64>,
}

/// Parsed value of the backend-config annotation
///
/// ```json
/// {"default": "cfg-a", "ports": {"80": "cfg-b", "http": "cfg-a"}}
/// ```
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct BackendConfigReferences {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,

    #[serde(default)]
    pub ports: BTreeMap<String, String>,
}

impl BackendConfigReferences {
    /// Parse the annotation value
    pub fn parse(value: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(value)
    }

    /// All referenced BackendConfig names, including duplicates
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.default
            .as_deref()
            .into_iter()
            .chain(self.ports.values().map(String::as_str))
    }

    pub fn references(&self, config_name: &str) -> bool {
        self.names().any(|name| name == config_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_default_and_ports() {
        let annotation = r#"{"default":"cfg-a","ports":{"80":"cfg-b","443":"cfg-a"}}"#;
        let refs = BackendConfigReferences::parse(annotation).unwrap();
        assert_eq!(refs.default.as_deref(), Some("cfg-a"));
        assert_eq!(refs.names().count(), 3);
        assert!(refs.references("cfg-b"));
        assert!(!refs.references("cfg-c"));
    }

    #[test]
    fn test_parse_ports_only() {
        let refs = BackendConfigReferences::parse(r#"{"ports":{"8080":"cfg-x"}}"#).unwrap();
        assert!(refs.default.is_none());
        assert!(refs.references("cfg-x"));
    }

    #[test]
    fn test_parse_invalid_json() {
        assert!(BackendConfigReferences::parse("cfg-a").is_err());
    }
}
