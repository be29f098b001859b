//! Shared state for status reconciliation

use std::sync::Arc;

use tracing::info;

use super::client::{ServiceClient, StatusMirrorStore};
use super::finalizers::{ILB_FINALIZER_V2, NETLB_FINALIZER_V2};
use super::readonly::{ReadOnlyCloudProvider, ReadOnlyServiceClient, ReadOnlyStatusMirrorStore};
use crate::cloud::CloudResourceProvider;

/// Operator-level settings
#[derive(Clone, Debug)]
pub struct ControllerConfig {
    /// Log and skip every mutating call (dry-run / shadow mode)
    pub read_only: bool,

    /// Finalizers whose unexpected removal triggers ownership re-verification
    pub watched_finalizers: Vec<String>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            read_only: false,
            watched_finalizers: vec![ILB_FINALIZER_V2.to_string(), NETLB_FINALIZER_V2.to_string()],
        }
    }
}

/// Collaborators of a reconciliation pass
///
/// In read-only mode the collaborators are wrapped in the read-only
/// decorators at construction time; reconciliation code is unaware of it.
#[derive(Clone)]
pub struct ControllerContext {
    pub services: Arc<dyn ServiceClient>,
    pub mirrors: Arc<dyn StatusMirrorStore>,
    pub cloud: Arc<dyn CloudResourceProvider>,
    pub config: ControllerConfig,
}

impl ControllerContext {
    pub fn new(
        services: Arc<dyn ServiceClient>,
        mirrors: Arc<dyn StatusMirrorStore>,
        cloud: Arc<dyn CloudResourceProvider>,
        config: ControllerConfig,
    ) -> Self {
        if !config.read_only {
            return Self {
                services,
                mirrors,
                cloud,
                config,
            };
        }

        info!("Read-only mode enabled: mutating calls will be logged and skipped");
        Self {
            services: Arc::new(ReadOnlyServiceClient::new(services)),
            mirrors: Arc::new(ReadOnlyStatusMirrorStore::new(mirrors)),
            cloud: Arc::new(ReadOnlyCloudProvider::new(cloud)),
            config,
        }
    }

    pub fn is_read_only(&self) -> bool {
        self.config.read_only
    }
}
