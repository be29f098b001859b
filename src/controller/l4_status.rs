//! Status reconciliation for a single load-balanced Service
//!
//! Takes the outcome of a cloud sync (which slots were allocated, which
//! failed, which resources the Service now owns) and publishes it:
//! conditions on the Service status, then the status mirror.
//!
//! Recording an allocation failure as a condition is a successful pass. An
//! `Err` from this module means the status itself could not be published.

use std::collections::BTreeSet;

use k8s_openapi::api::core::v1::{Service, ServiceStatus};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Condition;
use kube::ResourceExt;
use tracing::{debug, info, instrument, warn};

use super::conditions::{
    allocated_condition, allocation_failed_condition, plan_conditions, ConditionReason,
    ConditionSet, ConditionType, CONDITION_STATUS_TRUE,
};
use super::context::ControllerContext;
use super::finalizers::{check_finalizer_race, ensure_finalizer};
use super::status_mirror::{ensure_status_mirror, MirrorOutcome};
use crate::cloud::{CloudError, CloudResource};
use crate::crd::{status_mirror_name, ServiceIntentExt};
use crate::error::Result;

/// Outcome of allocating one cloud resource slot
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Allocation {
    /// The resource exists; carries its name or URL
    Allocated(String),
    /// Allocation failed; carries the error message
    Failed(String),
}

/// What a cloud sync produced for one Service
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SyncResult {
    pub allocations: Vec<(ConditionType, Allocation)>,
    /// Identifiers of every cloud resource the Service owns after the sync
    pub owned_resources: Vec<String>,
}

impl SyncResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful allocation; the identifier joins the owned set
    pub fn allocated(
        mut self,
        condition_type: ConditionType,
        resource: impl Into<String>,
    ) -> Self {
        let resource = resource.into();
        self.owned_resources.push(resource.clone());
        self.allocations
            .push((condition_type, Allocation::Allocated(resource)));
        self
    }

    pub fn failed(mut self, condition_type: ConditionType, message: impl Into<String>) -> Self {
        self.allocations
            .push((condition_type, Allocation::Failed(message.into())));
        self
    }

    /// Add an owned resource that has no condition slot (e.g. an NEG)
    pub fn owns(mut self, resource: impl Into<String>) -> Self {
        self.owned_resources.push(resource.into());
        self
    }
}

/// What [`reconcile_status`] did
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusOutcome {
    pub conditions_written: bool,
    /// Condition types that transitioned to Removed in this pass
    pub removed: Vec<ConditionType>,
    pub mirror: MirrorOutcome,
}

fn service_conditions(service: &Service) -> Vec<Condition> {
    service
        .status
        .as_ref()
        .and_then(|s| s.conditions.clone())
        .unwrap_or_default()
}

/// Compute the new condition list for the Service
///
/// Returns the list, the types flipped to Removed, and whether anything
/// differs from what is stored.
pub fn desired_conditions(
    service: &Service,
    sync: &SyncResult,
) -> (Vec<Condition>, Vec<ConditionType>, bool) {
    let stored = service_conditions(service);
    let stored_len = stored.len();
    let mut set = ConditionSet::from_conditions(stored);
    let mut changed = set.len() != stored_len;

    let mut desired: BTreeSet<ConditionType> =
        plan_conditions(service.lb_protocol(), &service.ip_families());
    for (condition_type, allocation) in &sync.allocations {
        desired.insert(*condition_type);
        let condition = match allocation {
            Allocation::Allocated(resource) => allocated_condition(*condition_type, resource),
            Allocation::Failed(message) => allocation_failed_condition(*condition_type, message),
        };
        changed |= set.set(condition);
    }

    let removed = set.mark_unplanned_removed(&desired);
    changed |= !removed.is_empty();

    (set.into_conditions(), removed, changed)
}

/// Publish the outcome of a cloud sync for one Service
#[instrument(skip(ctx, service, sync), fields(name = %service.name_any(), namespace = service.namespace()))]
pub async fn reconcile_status(
    ctx: &ControllerContext,
    service: &Service,
    sync: &SyncResult,
) -> Result<StatusOutcome> {
    let (conditions, removed, changed) = desired_conditions(service, sync);

    for condition_type in &removed {
        info!(
            "Condition {} of Service {} no longer planned, marked Removed",
            condition_type,
            service.intent_key()
        );
    }

    if changed {
        let mut updated = service.clone();
        let status = updated.status.get_or_insert_with(ServiceStatus::default);
        status.conditions = Some(conditions);
        ctx.services.update_status(&updated).await?;
        debug!("Wrote conditions for Service {}", service.intent_key());
    } else {
        debug!("Conditions of Service {} unchanged", service.intent_key());
    }

    let mirror = ensure_status_mirror(ctx.mirrors.as_ref(), service, &sync.owned_resources).await?;

    Ok(StatusOutcome {
        conditions_written: changed,
        removed,
        mirror,
    })
}

/// Result of checking mirrored resources against the cloud
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OwnershipReport {
    /// Resources that still exist (or could not be parsed and are kept)
    pub present: Vec<String>,
    /// Resources the cloud reports as not found
    pub missing: Vec<String>,
}

/// Identifiers recorded by the Service's Allocated conditions
///
/// Failed and Removed slots carry no identifier. Types outside the condition
/// vocabulary are skipped.
fn allocated_identifiers(service: &Service) -> Vec<String> {
    let mut identifiers: Vec<String> = service_conditions(service)
        .into_iter()
        .filter(|c| c.status == CONDITION_STATUS_TRUE)
        .filter(|c| c.reason == ConditionReason::Allocated.as_str())
        .filter(|c| c.type_.parse::<ConditionType>().is_ok())
        .map(|c| c.message)
        .filter(|message| !message.is_empty())
        .collect();
    let mut seen = BTreeSet::new();
    identifiers.retain(|id| seen.insert(id.clone()));
    identifiers
}

/// Re-verify the resources the Service owns
///
/// The status mirror is the source of truth. Without one (never written, or
/// deleted out of band) the identifiers on the Service's Allocated
/// conditions are used instead. Identifiers that cannot be resolved to a
/// cloud resource are kept as present: losing track of a resource is worse
/// than a stale entry.
#[instrument(skip(ctx, service), fields(name = %service.name_any(), namespace = service.namespace()))]
pub async fn reverify_owned_resources(
    ctx: &ControllerContext,
    service: &Service,
) -> Result<OwnershipReport> {
    let namespace = service.namespace().unwrap_or_else(|| "default".to_string());
    let mirror_name = status_mirror_name(&service.name_any());
    let identifiers = match ctx.mirrors.get(&namespace, &mirror_name).await {
        Ok(mirror) => mirror
            .status
            .map(|s| s.resource_identifiers)
            .unwrap_or_default(),
        Err(e) if e.is_not_found() => {
            debug!(
                "No status mirror for Service {}, using Allocated conditions",
                service.intent_key()
            );
            allocated_identifiers(service)
        }
        Err(e) => return Err(e),
    };

    let mut report = OwnershipReport::default();
    for identifier in identifiers {
        let Some(resource) = CloudResource::from_self_link(&identifier) else {
            report.present.push(identifier);
            continue;
        };
        match ctx.cloud.get(&resource).await {
            Ok(_) => report.present.push(identifier),
            Err(CloudError::NotFound(_)) => {
                debug!("Cloud resource {} no longer exists", identifier);
                report.missing.push(identifier)
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(report)
}

/// React to a Service update observed by a watch
///
/// When a watched finalizer was stripped from a live Service, re-verify the
/// owned cloud resources and, if any still exist, put the finalizer back so
/// their cleanup stays guaranteed. Returns the report when a race was seen.
#[instrument(skip(ctx, old, new), fields(name = %new.name_any(), namespace = new.namespace()))]
pub async fn handle_service_update(
    ctx: &ControllerContext,
    old: &Service,
    new: &Service,
) -> Result<Option<OwnershipReport>> {
    let watched: Vec<&str> = ctx
        .config
        .watched_finalizers
        .iter()
        .map(String::as_str)
        .collect();
    let removed = check_finalizer_race(old, new, &watched);
    if removed.is_empty() {
        return Ok(None);
    }

    let report = reverify_owned_resources(ctx, new).await?;
    if report.present.is_empty() {
        info!(
            "No cloud resources left for Service {}, finalizer not restored",
            new.intent_key()
        );
        return Ok(Some(report));
    }

    warn!(
        "Service {} still owns {} cloud resources, restoring finalizers {:?}",
        new.intent_key(),
        report.present.len(),
        removed
    );
    let mut current = new.clone();
    for finalizer in removed {
        current = ensure_finalizer(ctx.services.as_ref(), &current, finalizer).await?;
    }

    Ok(Some(report))
}
