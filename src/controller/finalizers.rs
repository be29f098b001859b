//! Finalizer handling for load-balanced Services
//!
//! A finalizer on a Service marks that cloud resources were allocated for it
//! and must be cleaned up before the Service can go away. If someone other
//! than the controller strips the finalizer while the Service is still live,
//! the controller may have lost track of those resources.

use k8s_openapi::api::core::v1::Service;
use kube::ResourceExt;
use serde_json::json;
use tracing::{info, warn};

use super::client::ServiceClient;
use crate::crd::ServiceIntentExt;
use crate::error::Result;

/// Finalizer of the legacy internal load balancer controller
pub const LEGACY_ILB_FINALIZER: &str = "gke.networking.io/l4-ilb-v1";

/// Finalizer of the internal (ILB) L4 controller
pub const ILB_FINALIZER_V2: &str = "gke.networking.io/l4-ilb-v2";

/// Finalizer of the external (NetLB) L4 controller
pub const NETLB_FINALIZER_V2: &str = "gke.networking.io/l4-netlb-v2";

/// Check if the Service carries the given finalizer
pub fn has_finalizer(service: &Service, finalizer: &str) -> bool {
    service.finalizers().iter().any(|f| f == finalizer)
}

/// Check if deletion of the Service has been requested
pub fn is_being_deleted(service: &Service) -> bool {
    service.metadata.deletion_timestamp.is_some()
}

/// Decide whether `finalizer` disappeared in a way the controller did not
/// foresee
///
/// Removal is expected when the new object carries a deletion timestamp:
/// clearing the finalizer is exactly what unblocks deletion. Removal from a
/// live object means an external actor edited it.
pub fn finalizer_was_removed_unexpectedly(old: &Service, new: &Service, finalizer: &str) -> bool {
    if !has_finalizer(old, finalizer) {
        return false;
    }
    if has_finalizer(new, finalizer) {
        return false;
    }
    !is_being_deleted(new)
}

/// Watched finalizers that were removed unexpectedly between two versions
///
/// Every returned finalizer means owned cloud resources must be re-verified
/// rather than assumed gone.
pub fn check_finalizer_race<'a>(
    old: &Service,
    new: &Service,
    watched: &[&'a str],
) -> Vec<&'a str> {
    let removed: Vec<&str> = watched
        .iter()
        .copied()
        .filter(|f| finalizer_was_removed_unexpectedly(old, new, f))
        .collect();

    for finalizer in &removed {
        warn!(
            service = %new.intent_key(),
            finalizer,
            "Finalizer removed from live Service; owned cloud resources need re-verification"
        );
    }
    removed
}

/// Add the finalizer to the Service if not present
pub async fn ensure_finalizer(
    client: &dyn ServiceClient,
    service: &Service,
    finalizer: &str,
) -> Result<Service> {
    if has_finalizer(service, finalizer) {
        return Ok(service.clone());
    }

    let mut finalizers: Vec<String> = service.finalizers().to_vec();
    finalizers.push(finalizer.to_string());

    let patch = json!({
        "metadata": {
            "finalizers": finalizers
        }
    });
    let namespace = service.namespace().unwrap_or_else(|| "default".to_string());
    let updated = client.patch(&namespace, &service.name_any(), &patch).await?;

    info!(
        "Added finalizer {} to Service {}",
        finalizer,
        service.intent_key()
    );
    Ok(updated)
}

/// Remove the finalizer once cleanup of cloud resources is complete
pub async fn remove_finalizer(
    client: &dyn ServiceClient,
    service: &Service,
    finalizer: &str,
) -> Result<Service> {
    if !has_finalizer(service, finalizer) {
        return Ok(service.clone());
    }

    let finalizers: Vec<String> = service
        .finalizers()
        .iter()
        .filter(|f| f.as_str() != finalizer)
        .cloned()
        .collect();

    let patch = json!({
        "metadata": {
            "finalizers": finalizers
        }
    });
    let namespace = service.namespace().unwrap_or_else(|| "default".to_string());
    let updated = client.patch(&namespace, &service.name_any(), &patch).await?;

    info!(
        "Removed finalizer {} from Service {}",
        finalizer,
        service.intent_key()
    );
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::client::MockServiceClient;
    use chrono::TimeZone;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
    use kube::api::ObjectMeta;

    fn service(finalizers: Option<Vec<&str>>, deleting: bool) -> Service {
        Service {
            metadata: ObjectMeta {
                name: Some("svc".to_string()),
                namespace: Some("default".to_string()),
                finalizers: finalizers.map(|f| f.into_iter().map(str::to_string).collect()),
                deletion_timestamp: deleting
                    .then(|| Time(chrono::Utc.with_ymd_and_hms(2024, 12, 30, 0, 0, 0).unwrap())),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_clean_service() {
        assert!(!finalizer_was_removed_unexpectedly(
            &service(None, false),
            &service(None, false),
            "random"
        ));
    }

    #[test]
    fn test_empty_finalizers() {
        assert!(!finalizer_was_removed_unexpectedly(
            &service(Some(vec![]), false),
            &service(Some(vec![]), false),
            "random"
        ));
    }

    #[test]
    fn test_changed_finalizer() {
        let old = service(Some(vec![LEGACY_ILB_FINALIZER, "random"]), false);
        let new = service(
            Some(vec!["random", "gke.networking.io/l4-ilb-v1-fake"]),
            false,
        );
        assert!(finalizer_was_removed_unexpectedly(
            &old,
            &new,
            LEGACY_ILB_FINALIZER
        ));
    }

    #[test]
    fn test_removed_finalizer() {
        let old = service(Some(vec![LEGACY_ILB_FINALIZER, "random"]), false);
        let new = service(Some(vec!["random"]), false);
        assert!(finalizer_was_removed_unexpectedly(
            &old,
            &new,
            LEGACY_ILB_FINALIZER
        ));
    }

    #[test]
    fn test_added_finalizer() {
        let old = service(Some(vec!["random"]), false);
        let new = service(Some(vec!["random", ILB_FINALIZER_V2]), false);
        assert!(!finalizer_was_removed_unexpectedly(
            &old,
            &new,
            ILB_FINALIZER_V2
        ));
    }

    #[test]
    fn test_reordered_finalizers_unchanged() {
        let old = service(Some(vec![NETLB_FINALIZER_V2, "random"]), false);
        let new = service(Some(vec!["random", NETLB_FINALIZER_V2]), false);
        assert!(!finalizer_was_removed_unexpectedly(
            &old,
            &new,
            NETLB_FINALIZER_V2
        ));
    }

    #[test]
    fn test_wrong_finalizer_name() {
        let old = service(Some(vec![NETLB_FINALIZER_V2, "random"]), false);
        let new = service(Some(vec!["random"]), false);
        assert!(!finalizer_was_removed_unexpectedly(
            &old,
            &new,
            ILB_FINALIZER_V2
        ));
    }

    #[test]
    fn test_removed_while_deleting() {
        let old = service(Some(vec![NETLB_FINALIZER_V2, "random"]), false);
        let new = service(Some(vec![ILB_FINALIZER_V2]), true);
        assert!(!finalizer_was_removed_unexpectedly(
            &old,
            &new,
            NETLB_FINALIZER_V2
        ));
    }

    #[test]
    fn test_check_finalizer_race_reports_only_unexpected() {
        let old = service(Some(vec![ILB_FINALIZER_V2, NETLB_FINALIZER_V2]), false);
        let new = service(Some(vec![NETLB_FINALIZER_V2]), false);
        let removed = check_finalizer_race(&old, &new, &[ILB_FINALIZER_V2, NETLB_FINALIZER_V2]);
        assert_eq!(removed, vec![ILB_FINALIZER_V2]);
    }

    #[tokio::test]
    async fn test_ensure_finalizer_patches_when_missing() {
        let svc = service(Some(vec!["random"]), false);
        let mut client = MockServiceClient::new();
        client
            .expect_patch()
            .withf(|ns, name, patch| {
                ns == "default"
                    && name == "svc"
                    && patch["metadata"]["finalizers"] == json!(["random", ILB_FINALIZER_V2])
            })
            .times(1)
            .returning(|_, _, _| Ok(service(Some(vec!["random", ILB_FINALIZER_V2]), false)));

        let updated = ensure_finalizer(&client, &svc, ILB_FINALIZER_V2)
            .await
            .unwrap();
        assert!(has_finalizer(&updated, ILB_FINALIZER_V2));
    }

    #[tokio::test]
    async fn test_ensure_finalizer_noop_when_present() {
        let svc = service(Some(vec![ILB_FINALIZER_V2]), false);
        let mut client = MockServiceClient::new();
        client.expect_patch().times(0);

        ensure_finalizer(&client, &svc, ILB_FINALIZER_V2)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_remove_finalizer_keeps_others() {
        let svc = service(Some(vec![NETLB_FINALIZER_V2, "random"]), true);
        let mut client = MockServiceClient::new();
        client
            .expect_patch()
            .withf(|_, _, patch| patch["metadata"]["finalizers"] == json!(["random"]))
            .times(1)
            .returning(|_, _, _| Ok(service(Some(vec!["random"]), true)));

        let updated = remove_finalizer(&client, &svc, NETLB_FINALIZER_V2)
            .await
            .unwrap();
        assert!(!has_finalizer(&updated, NETLB_FINALIZER_V2));
    }
}
