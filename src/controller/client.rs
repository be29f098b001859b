//! Platform client seams
//!
//! Reconciliation code reaches the Kubernetes API only through these traits,
//! so that tests can substitute mocks and read-only mode can wrap any
//! implementation without the reconciler noticing.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Service;
use kube::{
    api::{Api, ListParams, Patch, PatchParams, PostParams},
    Client, ResourceExt,
};
use serde_json::Value;
use tracing::debug;

#[cfg(test)]
use mockall::automock;

use crate::crd::ServiceLoadBalancerStatus;
use crate::error::{Error, Result};

/// Field manager used for patches issued by this controller
pub const FIELD_MANAGER: &str = "l4lb-status-controller";

/// Operations on Service Intents
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ServiceClient: Send + Sync {
    /// Fetch a Service by namespace and name
    async fn get(&self, namespace: &str, name: &str) -> Result<Service>;

    /// List Services across all namespaces matching the given selectors
    async fn list(&self, params: &ListParams) -> Result<Vec<Service>>;

    /// Replace the Service object (metadata and spec)
    async fn update(&self, service: &Service) -> Result<Service>;

    /// Replace the status subresource of the Service
    async fn update_status(&self, service: &Service) -> Result<Service>;

    /// Apply a JSON merge patch to the Service
    async fn patch(&self, namespace: &str, name: &str, patch: &Value) -> Result<Service>;
}

/// Operations on ServiceLoadBalancerStatus objects
#[cfg_attr(test, automock)]
#[async_trait]
pub trait StatusMirrorStore: Send + Sync {
    /// Fetch a status mirror; a missing object is reported as a 404 error
    async fn get(&self, namespace: &str, name: &str) -> Result<ServiceLoadBalancerStatus>;

    async fn create(&self, mirror: &ServiceLoadBalancerStatus) -> Result<ServiceLoadBalancerStatus>;

    /// Replace only the status subresource. The mirror's resourceVersion is
    /// sent along, so a concurrent write surfaces as a 409 conflict.
    async fn replace_status(
        &self,
        mirror: &ServiceLoadBalancerStatus,
    ) -> Result<ServiceLoadBalancerStatus>;
}

fn namespace_of<K: ResourceExt>(obj: &K) -> String {
    obj.namespace().unwrap_or_else(|| "default".to_string())
}

/// Kubernetes-backed [`ServiceClient`]
#[derive(Clone)]
pub struct KubeServiceClient {
    client: Client,
}

impl KubeServiceClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, namespace: &str) -> Api<Service> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl ServiceClient for KubeServiceClient {
    async fn get(&self, namespace: &str, name: &str) -> Result<Service> {
        Ok(self.api(namespace).get(name).await?)
    }

    async fn list(&self, params: &ListParams) -> Result<Vec<Service>> {
        let api: Api<Service> = Api::all(self.client.clone());
        Ok(api.list(params).await?.items)
    }

    async fn update(&self, service: &Service) -> Result<Service> {
        let name = service.name_any();
        debug!("Replacing Service {}/{}", namespace_of(service), name);
        Ok(self
            .api(&namespace_of(service))
            .replace(&name, &PostParams::default(), service)
            .await?)
    }

    async fn update_status(&self, service: &Service) -> Result<Service> {
        let name = service.name_any();
        debug!(
            "Replacing status of Service {}/{}",
            namespace_of(service),
            name
        );
        let data = serde_json::to_vec(service)?;
        Ok(self
            .api(&namespace_of(service))
            .replace_status(&name, &PostParams::default(), data)
            .await?)
    }

    async fn patch(&self, namespace: &str, name: &str, patch: &Value) -> Result<Service> {
        Ok(self
            .api(namespace)
            .patch(
                name,
                &PatchParams::apply(FIELD_MANAGER),
                &Patch::Merge(patch),
            )
            .await?)
    }
}

/// Kubernetes-backed [`StatusMirrorStore`]
#[derive(Clone)]
pub struct KubeStatusMirrorStore {
    client: Client,
}

impl KubeStatusMirrorStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, namespace: &str) -> Api<ServiceLoadBalancerStatus> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl StatusMirrorStore for KubeStatusMirrorStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<ServiceLoadBalancerStatus> {
        Ok(self.api(namespace).get(name).await?)
    }

    async fn create(
        &self,
        mirror: &ServiceLoadBalancerStatus,
    ) -> Result<ServiceLoadBalancerStatus> {
        Ok(self
            .api(&namespace_of(mirror))
            .create(&PostParams::default(), mirror)
            .await?)
    }

    async fn replace_status(
        &self,
        mirror: &ServiceLoadBalancerStatus,
    ) -> Result<ServiceLoadBalancerStatus> {
        let name = mirror.name_any();
        let data = serde_json::to_vec(mirror).map_err(Error::SerializationError)?;
        Ok(self
            .api(&namespace_of(mirror))
            .replace_status(&name, &PostParams::default(), data)
            .await?)
    }
}
