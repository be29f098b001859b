//! Status mirror reconciliation
//!
//! Keeps the `<service>-status` ServiceLoadBalancerStatus object in step with
//! the set of cloud resources a Service currently owns. One fetch, then at
//! most one create or status update; nothing is written when the stored set
//! already matches.

use std::collections::BTreeSet;

use k8s_openapi::api::core::v1::Service;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::{api::ObjectMeta, Resource, ResourceExt};
use tracing::{debug, info, instrument};

use super::client::StatusMirrorStore;
use crate::crd::{
    status_mirror_name, ServiceLoadBalancerStatus, ServiceLoadBalancerStatusSpec,
    ServiceLoadBalancerStatusStatus,
};
use crate::error::Result;

/// What [`ensure_status_mirror`] did
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MirrorOutcome {
    Created,
    Updated,
    Unchanged,
}

/// Controller owner reference pointing at the Service
///
/// Garbage collection removes the mirror once the Service is deleted.
pub fn service_owner_reference(service: &Service) -> OwnerReference {
    OwnerReference {
        api_version: Service::api_version(&()).to_string(),
        kind: Service::kind(&()).to_string(),
        name: service.name_any(),
        uid: service.metadata.uid.clone().unwrap_or_default(),
        controller: Some(true),
        block_owner_deletion: Some(true),
    }
}

/// Build the status mirror object for a Service
pub fn generate_status_mirror(
    service: &Service,
    resources: &[String],
) -> ServiceLoadBalancerStatus {
    ServiceLoadBalancerStatus {
        metadata: ObjectMeta {
            name: Some(status_mirror_name(&service.name_any())),
            namespace: service.namespace(),
            owner_references: Some(vec![service_owner_reference(service)]),
            ..Default::default()
        },
        spec: ServiceLoadBalancerStatusSpec::default(),
        status: Some(ServiceLoadBalancerStatusStatus {
            resource_identifiers: resources.to_vec(),
        }),
    }
}

/// Set equality over resource identifiers: order and duplicates are ignored
pub fn resources_equal(a: &[String], b: &[String]) -> bool {
    let a: BTreeSet<&str> = a.iter().map(String::as_str).collect();
    let b: BTreeSet<&str> = b.iter().map(String::as_str).collect();
    a == b
}

fn stored_resources(mirror: &ServiceLoadBalancerStatus) -> &[String] {
    mirror
        .status
        .as_ref()
        .map(|s| s.resource_identifiers.as_slice())
        .unwrap_or_default()
}

/// Ensure the status mirror of `service` lists exactly `resources`
///
/// A missing mirror is created. Any other fetch failure is returned without
/// writing anything. An update carries the fetched resourceVersion, so a
/// concurrent writer makes it fail with a conflict that the caller retries.
#[instrument(skip(store, service, resources), fields(service = %service.name_any(), namespace = service.namespace()))]
pub async fn ensure_status_mirror(
    store: &dyn StatusMirrorStore,
    service: &Service,
    resources: &[String],
) -> Result<MirrorOutcome> {
    let namespace = service.namespace().unwrap_or_else(|| "default".to_string());
    let name = status_mirror_name(&service.name_any());

    let existing = match store.get(&namespace, &name).await {
        Ok(existing) => existing,
        Err(e) if e.is_not_found() => {
            let mirror = generate_status_mirror(service, resources);
            store.create(&mirror).await?;
            info!(
                "Created ServiceLoadBalancerStatus {}/{} with {} resources",
                namespace,
                name,
                resources.len()
            );
            return Ok(MirrorOutcome::Created);
        }
        Err(e) => return Err(e),
    };

    if resources_equal(stored_resources(&existing), resources) {
        debug!(
            "ServiceLoadBalancerStatus {}/{} is up to date",
            namespace, name
        );
        return Ok(MirrorOutcome::Unchanged);
    }

    let mut updated = existing;
    updated.status = Some(ServiceLoadBalancerStatusStatus {
        resource_identifiers: resources.to_vec(),
    });
    store.replace_status(&updated).await?;

    info!(
        "Updated ServiceLoadBalancerStatus {}/{} to {} resources",
        namespace,
        name,
        resources.len()
    );
    Ok(MirrorOutcome::Updated)
}
