//! Cloud resource provider seam
//!
//! The low-level cloud API client lives outside this crate. Everything here
//! talks to it through [`CloudResourceProvider`], a narrow set of
//! get/list/create/update/delete verbs keyed by resource kind and name.

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;

#[cfg(test)]
use mockall::automock;

/// Kinds of cloud networking resources backing an L4 load balancer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CloudResourceKind {
    ForwardingRule,
    BackendService,
    HealthCheck,
    Firewall,
    NetworkEndpointGroup,
}

impl CloudResourceKind {
    pub const ALL: [CloudResourceKind; 5] = [
        CloudResourceKind::ForwardingRule,
        CloudResourceKind::BackendService,
        CloudResourceKind::HealthCheck,
        CloudResourceKind::Firewall,
        CloudResourceKind::NetworkEndpointGroup,
    ];

    /// URL collection segment for this kind
    pub fn collection(&self) -> &'static str {
        match self {
            CloudResourceKind::ForwardingRule => "forwardingRules",
            CloudResourceKind::BackendService => "backendServices",
            CloudResourceKind::HealthCheck => "healthChecks",
            CloudResourceKind::Firewall => "firewalls",
            CloudResourceKind::NetworkEndpointGroup => "networkEndpointGroups",
        }
    }

    fn from_collection(collection: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.collection() == collection)
    }
}

impl fmt::Display for CloudResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.collection())
    }
}

/// A cloud resource as seen by the status layer
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CloudResource {
    pub kind: CloudResourceKind,
    pub name: String,
    pub project: String,
    /// `None` for global resources (firewalls, global health checks)
    pub region: Option<String>,
    pub description: Option<String>,
}

impl CloudResource {
    pub fn new(
        kind: CloudResourceKind,
        project: impl Into<String>,
        region: Option<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            name: name.into(),
            project: project.into(),
            region,
            description: None,
        }
    }

    /// Stable identifier used in conditions and the status mirror
    pub fn self_link(&self) -> String {
        match &self.region {
            Some(region) => format!(
                "projects/{}/regions/{}/{}/{}",
                self.project,
                region,
                self.kind.collection(),
                self.name
            ),
            None => format!(
                "projects/{}/global/{}/{}",
                self.project,
                self.kind.collection(),
                self.name
            ),
        }
    }

    /// Parse an identifier produced by [`CloudResource::self_link`]
    ///
    /// Accepts full `https://.../compute/v1/projects/...` URLs as well.
    pub fn from_self_link(link: &str) -> Option<Self> {
        let path = link.find("projects/").map(|idx| &link[idx..])?;
        let parts: Vec<&str> = path.split('/').collect();

        match parts.as_slice() {
            ["projects", project, "regions", region, collection, name] => Some(Self::new(
                CloudResourceKind::from_collection(collection)?,
                *project,
                Some(region.to_string()),
                *name,
            )),
            ["projects", project, "global", collection, name] => Some(Self::new(
                CloudResourceKind::from_collection(collection)?,
                *project,
                None,
                *name,
            )),
            _ => None,
        }
    }
}

/// Typed failures from the cloud resource provider
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CloudError {
    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("server error ({code}): {message}")]
    Server { code: u16, message: String },
}

impl CloudError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, CloudError::Conflict(_) | CloudError::Server { .. })
    }
}

/// Narrow verbs of the cloud resource provider
///
/// Implementations wrap a concrete cloud transport. Resources are addressed
/// by their full location (kind, project, region, name), never by name
/// alone. Successful create and update calls return the stable identifier of
/// the resource.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CloudResourceProvider: Send + Sync {
    /// Fetch the current state of a resource
    async fn get(&self, resource: &CloudResource) -> Result<CloudResource, CloudError>;

    /// List resources of a kind
    async fn list(&self, kind: CloudResourceKind) -> Result<Vec<CloudResource>, CloudError>;

    /// Create a resource and return its identifier
    async fn create(&self, resource: &CloudResource) -> Result<String, CloudError>;

    /// Update a resource in place and return its identifier
    async fn update(&self, resource: &CloudResource) -> Result<String, CloudError>;

    /// Delete a resource
    async fn delete(&self, resource: &CloudResource) -> Result<(), CloudError>;
}

/// Provider backed by an in-process inventory keyed by self link
///
/// Used when no cloud transport is wired in: the CLI seeds it with the
/// identifiers it is told about, and integration tests use it as a fake.
#[derive(Default)]
pub struct InMemoryCloudProvider {
    resources: Mutex<BTreeMap<String, CloudResource>>,
}

impl InMemoryCloudProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an inventory from identifiers; unparseable ones are skipped
    pub fn from_self_links<'a>(links: impl IntoIterator<Item = &'a str>) -> Self {
        let resources = links
            .into_iter()
            .filter_map(CloudResource::from_self_link)
            .map(|r| (r.self_link(), r))
            .collect();
        Self {
            resources: Mutex::new(resources),
        }
    }

    pub async fn len(&self) -> usize {
        self.resources.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.resources.lock().await.is_empty()
    }
}

#[async_trait]
impl CloudResourceProvider for InMemoryCloudProvider {
    async fn get(&self, resource: &CloudResource) -> Result<CloudResource, CloudError> {
        let link = resource.self_link();
        self.resources
            .lock()
            .await
            .get(&link)
            .cloned()
            .ok_or(CloudError::NotFound(link))
    }

    async fn list(&self, kind: CloudResourceKind) -> Result<Vec<CloudResource>, CloudError> {
        Ok(self
            .resources
            .lock()
            .await
            .values()
            .filter(|r| r.kind == kind)
            .cloned()
            .collect())
    }

    async fn create(&self, resource: &CloudResource) -> Result<String, CloudError> {
        let link = resource.self_link();
        let mut resources = self.resources.lock().await;
        if resources.contains_key(&link) {
            return Err(CloudError::Conflict(link));
        }
        resources.insert(link.clone(), resource.clone());
        Ok(link)
    }

    async fn update(&self, resource: &CloudResource) -> Result<String, CloudError> {
        let link = resource.self_link();
        match self.resources.lock().await.get_mut(&link) {
            Some(existing) => {
                *existing = resource.clone();
                Ok(link)
            }
            None => Err(CloudError::NotFound(link)),
        }
    }

    async fn delete(&self, resource: &CloudResource) -> Result<(), CloudError> {
        let link = resource.self_link();
        self.resources
            .lock()
            .await
            .remove(&link)
            .map(|_| ())
            .ok_or(CloudError::NotFound(link))
    }
}
