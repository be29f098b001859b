//! Reference queries over Service snapshots
//!
//! When a shared object changes (a BackendConfig, an L4 logging ConfigMap, an
//! Ingress), the controller needs the exact set of Services affected by the
//! change. These filters work on a caller-supplied snapshot: no I/O, no
//! mutation, output in input order, each Service at most once.

use std::collections::HashSet;

use k8s_openapi::api::core::v1::{ConfigMap, Service};
use k8s_openapi::api::networking::v1::{Ingress, IngressBackend};
use kube::ResourceExt;
use tracing::debug;

use crate::crd::{
    BackendConfig, BackendConfigReferences, ServiceIntentExt, BACKEND_CONFIG_ANNOTATION,
    BETA_BACKEND_CONFIG_ANNOTATION,
};

/// Keep the Services matching `pred`, deduplicated by `<namespace>/<name>`
fn filter_dedup<'a, F>(services: &'a [Service], mut pred: F) -> Vec<&'a Service>
where
    F: FnMut(&Service) -> bool,
{
    let mut seen = HashSet::new();
    services
        .iter()
        .filter(|&svc| pred(svc) && seen.insert(svc.intent_key()))
        .collect()
}

/// BackendConfig references declared on the Service, GA annotation first
pub fn backend_config_references(service: &Service) -> Option<BackendConfigReferences> {
    let annotations = service.annotations();
    let value = annotations
        .get(BACKEND_CONFIG_ANNOTATION)
        .or_else(|| annotations.get(BETA_BACKEND_CONFIG_ANNOTATION))?;

    match BackendConfigReferences::parse(value) {
        Ok(refs) => Some(refs),
        Err(e) => {
            debug!(
                "Ignoring malformed backend-config annotation on {}: {}",
                service.intent_key(),
                e
            );
            None
        }
    }
}

/// Whether any backend of the Service references the BackendConfig
pub fn service_references_backend_config(service: &Service, config: &BackendConfig) -> bool {
    if service.namespace() != config.namespace() {
        return false;
    }
    backend_config_references(service)
        .map(|refs| refs.references(&config.name_any()))
        .unwrap_or(false)
}

/// Services that reference the given BackendConfig
pub fn services_referencing_backend_config<'a>(
    services: &'a [Service],
    config: &BackendConfig,
) -> Vec<&'a Service> {
    filter_dedup(services, |s| service_references_backend_config(s, config))
}

/// Services whose L4 logging annotation names the ConfigMap
///
/// Cross-namespace references are never honoured. An absent ConfigMap
/// matches nothing.
pub fn services_referencing_logging_config_map<'a>(
    services: &'a [Service],
    config_map: Option<&ConfigMap>,
) -> Vec<&'a Service> {
    let Some(config_map) = config_map else {
        return Vec::new();
    };
    let name = config_map.name_any();
    let namespace = config_map.namespace();

    filter_dedup(services, |svc| {
        svc.logging_config_map() == Some(name.as_str()) && svc.namespace() == namespace
    })
}

/// Visit every Service backend of the Ingress until `visit` returns true
///
/// Returns whether traversal was stopped early.
pub fn traverse_ingress_backends<F>(ingress: &Ingress, mut visit: F) -> bool
where
    F: FnMut(&str) -> bool,
{
    let Some(spec) = ingress.spec.as_ref() else {
        return false;
    };

    let default_backend = spec.default_backend.iter();
    let rule_backends = spec
        .rules
        .iter()
        .flatten()
        .filter_map(|rule| rule.http.as_ref())
        .flat_map(|http| http.paths.iter().map(|path| &path.backend));

    default_backend
        .chain(rule_backends)
        .filter_map(|backend: &IngressBackend| backend.service.as_ref())
        .any(|svc| visit(&svc.name))
}

/// Whether the Ingress names the Service as a backend in its own namespace
pub fn ingress_references_service(ingress: &Ingress, service: &Service) -> bool {
    if ingress.namespace() != service.namespace() {
        return false;
    }
    let name = service.name_any();
    traverse_ingress_backends(ingress, |backend| backend == name)
}

/// Services referenced by the given Ingress
pub fn services_referenced_by_ingress<'a>(
    ingress: &Ingress,
    services: &'a [Service],
) -> Vec<&'a Service> {
    filter_dedup(services, |svc| ingress_references_service(ingress, svc))
}
