//! Read-only interception of mutating client calls
//!
//! Decorators over [`ServiceClient`], [`StatusMirrorStore`] and
//! [`CloudResourceProvider`] that log every mutating call and return a value
//! satisfying the caller's contract without changing anything. Reads pass
//! through. Used for dry-run and shadow evaluation of a full reconciliation
//! pass; the reconciler cannot tell it is running read-only.

use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Service;
use kube::{api::ListParams, ResourceExt};
use serde_json::Value;
use tracing::info;

use super::client::{ServiceClient, StatusMirrorStore};
use crate::cloud::{CloudError, CloudResource, CloudResourceKind, CloudResourceProvider};
use crate::crd::ServiceLoadBalancerStatus;
use crate::error::Result;

fn object_key<K: ResourceExt>(obj: &K) -> String {
    format!("{}/{}", obj.namespace().unwrap_or_default(), obj.name_any())
}

/// [`ServiceClient`] that blocks update, update-status and patch
pub struct ReadOnlyServiceClient {
    inner: Arc<dyn ServiceClient>,
}

impl ReadOnlyServiceClient {
    pub fn new(inner: Arc<dyn ServiceClient>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl ServiceClient for ReadOnlyServiceClient {
    async fn get(&self, namespace: &str, name: &str) -> Result<Service> {
        self.inner.get(namespace, name).await
    }

    async fn list(&self, params: &ListParams) -> Result<Vec<Service>> {
        self.inner.list(params).await
    }

    async fn update(&self, service: &Service) -> Result<Service> {
        info!(service = %object_key(service), "[READ-ONLY] Blocked Service update");
        Ok(service.clone())
    }

    async fn update_status(&self, service: &Service) -> Result<Service> {
        let conditions = service
            .status
            .as_ref()
            .and_then(|s| s.conditions.as_ref())
            .map(Vec::len)
            .unwrap_or(0);
        info!(
            service = %object_key(service),
            conditions,
            "[READ-ONLY] Blocked Service status update"
        );
        Ok(service.clone())
    }

    async fn patch(&self, namespace: &str, name: &str, patch: &Value) -> Result<Service> {
        info!(
            service = %format!("{namespace}/{name}"),
            patch = %patch,
            "[READ-ONLY] Blocked Service patch"
        );
        // Callers use the returned object, so hand back the live one
        self.inner.get(namespace, name).await
    }
}

/// [`StatusMirrorStore`] that blocks create and status replacement
pub struct ReadOnlyStatusMirrorStore {
    inner: Arc<dyn StatusMirrorStore>,
}

impl ReadOnlyStatusMirrorStore {
    pub fn new(inner: Arc<dyn StatusMirrorStore>) -> Self {
        Self { inner }
    }
}

fn mirror_resources(mirror: &ServiceLoadBalancerStatus) -> usize {
    mirror
        .status
        .as_ref()
        .map(|s| s.resource_identifiers.len())
        .unwrap_or(0)
}

#[async_trait]
impl StatusMirrorStore for ReadOnlyStatusMirrorStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<ServiceLoadBalancerStatus> {
        self.inner.get(namespace, name).await
    }

    async fn create(
        &self,
        mirror: &ServiceLoadBalancerStatus,
    ) -> Result<ServiceLoadBalancerStatus> {
        info!(
            mirror = %object_key(mirror),
            resources = mirror_resources(mirror),
            "[READ-ONLY] Blocked ServiceLoadBalancerStatus create"
        );
        Ok(mirror.clone())
    }

    async fn replace_status(
        &self,
        mirror: &ServiceLoadBalancerStatus,
    ) -> Result<ServiceLoadBalancerStatus> {
        info!(
            mirror = %object_key(mirror),
            resources = mirror_resources(mirror),
            "[READ-ONLY] Blocked ServiceLoadBalancerStatus status update"
        );
        Ok(mirror.clone())
    }
}

/// [`CloudResourceProvider`] that blocks create, update and delete
pub struct ReadOnlyCloudProvider {
    inner: Arc<dyn CloudResourceProvider>,
}

impl ReadOnlyCloudProvider {
    pub fn new(inner: Arc<dyn CloudResourceProvider>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl CloudResourceProvider for ReadOnlyCloudProvider {
    async fn get(&self, resource: &CloudResource) -> Result<CloudResource, CloudError> {
        self.inner.get(resource).await
    }

    async fn list(&self, kind: CloudResourceKind) -> Result<Vec<CloudResource>, CloudError> {
        self.inner.list(kind).await
    }

    async fn create(&self, resource: &CloudResource) -> Result<String, CloudError> {
        info!(
            kind = %resource.kind,
            name = %resource.name,
            "[READ-ONLY] Blocked cloud resource create"
        );
        Ok(resource.self_link())
    }

    async fn update(&self, resource: &CloudResource) -> Result<String, CloudError> {
        info!(
            kind = %resource.kind,
            name = %resource.name,
            "[READ-ONLY] Blocked cloud resource update"
        );
        Ok(resource.self_link())
    }

    async fn delete(&self, resource: &CloudResource) -> Result<(), CloudError> {
        info!(
            kind = %resource.kind,
            name = %resource.name,
            region = ?resource.region,
            "[READ-ONLY] Blocked cloud resource delete"
        );
        Ok(())
    }
}
