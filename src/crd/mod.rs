//! Resource types for the L4 load balancer status layer
//!
//! Service Intents are core `v1/Service` objects read through
//! [`ServiceIntentExt`]. The status mirror and the shared backend
//! configuration are custom resources.

pub mod backend_config;
pub mod intent;
pub mod status_mirror;

pub use backend_config::{
    BackendConfig, BackendConfigReferences, BackendConfigSpec, BACKEND_CONFIG_ANNOTATION,
    BETA_BACKEND_CONFIG_ANNOTATION,
};
pub use intent::{IpFamily, LbProtocol, ServiceIntentExt, L4_LOGGING_CONFIG_MAP_ANNOTATION};
pub use status_mirror::{
    status_mirror_name, ServiceLoadBalancerStatus, ServiceLoadBalancerStatusSpec,
    ServiceLoadBalancerStatusStatus,
};
