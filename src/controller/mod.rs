//! Controller module for L4 load balancer status reconciliation
//! This module contains the condition model, finalizer race detection,
//! reference queries, the status mirror and the read-only interception layer.

pub mod client;
pub mod conditions;
mod context;
pub mod finalizers;
mod l4_status;
pub mod readonly;
pub mod references;
pub mod status_mirror;

pub use client::{
    KubeServiceClient, KubeStatusMirrorStore, ServiceClient, StatusMirrorStore, FIELD_MANAGER,
};
pub use conditions::{
    condition_type_for, condition_type_for_annotation, plan_conditions, ConditionReason,
    ConditionSet, ConditionType, ResourceKind,
};
pub use context::{ControllerConfig, ControllerContext};
pub use finalizers::{
    check_finalizer_race, ILB_FINALIZER_V2, LEGACY_ILB_FINALIZER, NETLB_FINALIZER_V2,
};
pub use l4_status::{
    desired_conditions, handle_service_update, reconcile_status, reverify_owned_resources,
    Allocation, OwnershipReport, StatusOutcome, SyncResult,
};
pub use readonly::{ReadOnlyCloudProvider, ReadOnlyServiceClient, ReadOnlyStatusMirrorStore};
pub use references::{
    services_referenced_by_ingress, services_referencing_backend_config,
    services_referencing_logging_config_map,
};
pub use status_mirror::{ensure_status_mirror, MirrorOutcome};
