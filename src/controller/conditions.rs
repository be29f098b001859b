//! Condition management for load-balanced Services
//!
//! Every cloud resource slot of an L4 load balancer (backend service, health
//! check, firewall rules, forwarding rules per protocol and IP family) has a
//! well-known condition type. A condition records that the resource was
//! allocated, that allocation failed, or that the resource was removed.
//!
//! Condition type strings are consumed by dashboards and alerting, so the
//! values below are a stable vocabulary: renaming one is a breaking change.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

use chrono::Utc;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{Condition, Time};

use crate::crd::{IpFamily, LbProtocol};

/// Standard condition statuses
pub const CONDITION_STATUS_TRUE: &str = "True";
pub const CONDITION_STATUS_FALSE: &str = "False";

/// Message carried by Removed conditions
pub const CONDITION_REMOVED_MESSAGE: &str = "Resource was removed";

/// Service annotations recording the name of each allocated cloud resource
pub mod resource_annotation {
    pub const BACKEND_SERVICE: &str = "service.kubernetes.io/backend-service";
    pub const TCP_FORWARDING_RULE: &str = "service.kubernetes.io/tcp-forwarding-rule";
    pub const UDP_FORWARDING_RULE: &str = "service.kubernetes.io/udp-forwarding-rule";
    pub const L3_FORWARDING_RULE: &str = "service.kubernetes.io/l3-forwarding-rule";
    pub const TCP_IPV6_FORWARDING_RULE: &str = "service.kubernetes.io/tcp-forwarding-rule-ipv6";
    pub const UDP_IPV6_FORWARDING_RULE: &str = "service.kubernetes.io/udp-forwarding-rule-ipv6";
    pub const L3_IPV6_FORWARDING_RULE: &str = "service.kubernetes.io/l3-forwarding-rule-ipv6";
    pub const FORWARDING_RULE: &str = "service.kubernetes.io/forwarding-rule";
    pub const IPV6_FORWARDING_RULE: &str = "service.kubernetes.io/forwarding-rule-ipv6";
    pub const HEALTH_CHECK: &str = "service.kubernetes.io/healthcheck";
    pub const FIREWALL_RULE: &str = "service.kubernetes.io/firewall-rule";
    pub const IPV6_FIREWALL_RULE: &str = "service.kubernetes.io/firewall-rule-ipv6";
    pub const FIREWALL_FOR_HEALTH_CHECK: &str = "service.kubernetes.io/firewall-rule-for-hc";
    pub const FIREWALL_FOR_HEALTH_CHECK_IPV6: &str =
        "service.kubernetes.io/firewall-rule-for-hc-ipv6";
}

/// Cloud resource slots that carry a condition
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    BackendService,
    ForwardingRule,
    HealthCheck,
    Firewall,
    FirewallForHealthCheck,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 5] = [
        ResourceKind::BackendService,
        ResourceKind::ForwardingRule,
        ResourceKind::HealthCheck,
        ResourceKind::Firewall,
        ResourceKind::FirewallForHealthCheck,
    ];
}

/// The closed vocabulary of L4 load balancer condition types
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConditionType {
    BackendService,
    TcpForwardingRule,
    UdpForwardingRule,
    L3ForwardingRule,
    TcpIpv6ForwardingRule,
    UdpIpv6ForwardingRule,
    L3Ipv6ForwardingRule,
    /// Protocol-less forwarding rule slot, used for error reporting
    ForwardingRule,
    /// Protocol-less IPv6 forwarding rule slot, used for error reporting
    Ipv6ForwardingRule,
    HealthCheck,
    FirewallRule,
    Ipv6FirewallRule,
    FirewallHealthCheck,
    FirewallHealthCheckIpv6,
}

impl ConditionType {
    pub const ALL: [ConditionType; 14] = [
        ConditionType::BackendService,
        ConditionType::TcpForwardingRule,
        ConditionType::UdpForwardingRule,
        ConditionType::L3ForwardingRule,
        ConditionType::TcpIpv6ForwardingRule,
        ConditionType::UdpIpv6ForwardingRule,
        ConditionType::L3Ipv6ForwardingRule,
        ConditionType::ForwardingRule,
        ConditionType::Ipv6ForwardingRule,
        ConditionType::HealthCheck,
        ConditionType::FirewallRule,
        ConditionType::Ipv6FirewallRule,
        ConditionType::FirewallHealthCheck,
        ConditionType::FirewallHealthCheckIpv6,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionType::BackendService => "ServiceLoadBalancerBackendService",
            ConditionType::TcpForwardingRule => "ServiceLoadBalancerTCPForwardingRule",
            ConditionType::UdpForwardingRule => "ServiceLoadBalancerUDPForwardingRule",
            ConditionType::L3ForwardingRule => "ServiceLoadBalancerL3ForwardingRule",
            ConditionType::TcpIpv6ForwardingRule => "ServiceLoadBalancerTCPIPv6ForwardingRule",
            ConditionType::UdpIpv6ForwardingRule => "ServiceLoadBalancerUDPIPv6ForwardingRule",
            ConditionType::L3Ipv6ForwardingRule => "ServiceLoadBalancerL3IPv6ForwardingRule",
            ConditionType::ForwardingRule => "ServiceLoadBalancerForwardingRule",
            ConditionType::Ipv6ForwardingRule => "ServiceLoadBalancerIPv6ForwardingRule",
            ConditionType::HealthCheck => "ServiceLoadBalancerHealthCheck",
            ConditionType::FirewallRule => "ServiceLoadBalancerFirewallRule",
            ConditionType::Ipv6FirewallRule => "ServiceLoadBalancerIPv6FirewallRule",
            ConditionType::FirewallHealthCheck => "ServiceLoadBalancerFirewallRuleForHealthCheck",
            ConditionType::FirewallHealthCheckIpv6 => {
                "ServiceLoadBalancerFirewallRuleForHealthCheckIPv6"
            }
        }
    }
}

impl fmt::Display for ConditionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConditionType {
    type Err = String;

    /// Unknown strings are not part of this vocabulary (foreign conditions)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ConditionType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unmapped condition type: {s}"))
    }
}

/// Machine-readable condition reasons
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConditionReason {
    Allocated,
    AllocationFailed,
    Removed,
}

impl ConditionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionReason::Allocated => "GCEResourceAllocated",
            ConditionReason::AllocationFailed => "GCEResourceAllocationFailed",
            ConditionReason::Removed => "GCEResourceRemoved",
        }
    }
}

/// Map a resource slot, protocol and IP family to its condition type
///
/// Backend service and health check are shared by both families and all
/// protocols. Firewall slots vary by family only. Forwarding rules vary by
/// protocol and family.
pub fn condition_type_for(
    kind: ResourceKind,
    protocol: LbProtocol,
    family: IpFamily,
) -> ConditionType {
    match (kind, family) {
        (ResourceKind::BackendService, _) => ConditionType::BackendService,
        (ResourceKind::HealthCheck, _) => ConditionType::HealthCheck,
        (ResourceKind::Firewall, IpFamily::IPv4) => ConditionType::FirewallRule,
        (ResourceKind::Firewall, IpFamily::IPv6) => ConditionType::Ipv6FirewallRule,
        (ResourceKind::FirewallForHealthCheck, IpFamily::IPv4) => {
            ConditionType::FirewallHealthCheck
        }
        (ResourceKind::FirewallForHealthCheck, IpFamily::IPv6) => {
            ConditionType::FirewallHealthCheckIpv6
        }
        (ResourceKind::ForwardingRule, IpFamily::IPv4) => match protocol {
            LbProtocol::Tcp => ConditionType::TcpForwardingRule,
            LbProtocol::Udp => ConditionType::UdpForwardingRule,
            LbProtocol::L3 => ConditionType::L3ForwardingRule,
        },
        (ResourceKind::ForwardingRule, IpFamily::IPv6) => match protocol {
            LbProtocol::Tcp => ConditionType::TcpIpv6ForwardingRule,
            LbProtocol::Udp => ConditionType::UdpIpv6ForwardingRule,
            LbProtocol::L3 => ConditionType::L3Ipv6ForwardingRule,
        },
    }
}

/// Map a resource annotation key to its condition type
///
/// Returns `None` for keys outside the vocabulary.
pub fn condition_type_for_annotation(annotation_key: &str) -> Option<ConditionType> {
    use resource_annotation as ann;

    let condition_type = match annotation_key {
        ann::BACKEND_SERVICE => ConditionType::BackendService,
        ann::TCP_FORWARDING_RULE => ConditionType::TcpForwardingRule,
        ann::UDP_FORWARDING_RULE => ConditionType::UdpForwardingRule,
        ann::L3_FORWARDING_RULE => ConditionType::L3ForwardingRule,
        ann::TCP_IPV6_FORWARDING_RULE => ConditionType::TcpIpv6ForwardingRule,
        ann::UDP_IPV6_FORWARDING_RULE => ConditionType::UdpIpv6ForwardingRule,
        ann::L3_IPV6_FORWARDING_RULE => ConditionType::L3Ipv6ForwardingRule,
        ann::FORWARDING_RULE => ConditionType::ForwardingRule,
        ann::IPV6_FORWARDING_RULE => ConditionType::Ipv6ForwardingRule,
        ann::HEALTH_CHECK => ConditionType::HealthCheck,
        ann::FIREWALL_RULE => ConditionType::FirewallRule,
        ann::IPV6_FIREWALL_RULE => ConditionType::Ipv6FirewallRule,
        ann::FIREWALL_FOR_HEALTH_CHECK => ConditionType::FirewallHealthCheck,
        ann::FIREWALL_FOR_HEALTH_CHECK_IPV6 => ConditionType::FirewallHealthCheckIpv6,
        _ => return None,
    };
    Some(condition_type)
}

fn new_condition(
    condition_type: ConditionType,
    status: &str,
    reason: ConditionReason,
    message: &str,
) -> Condition {
    Condition {
        type_: condition_type.as_str().to_string(),
        status: status.to_string(),
        last_transition_time: Time(Utc::now()),
        reason: reason.as_str().to_string(),
        message: message.to_string(),
        observed_generation: None,
    }
}

/// Create a condition recording a successfully allocated resource
pub fn allocated_condition(condition_type: ConditionType, resource_name: &str) -> Condition {
    new_condition(
        condition_type,
        CONDITION_STATUS_TRUE,
        ConditionReason::Allocated,
        resource_name,
    )
}

/// Create a condition recording a failed allocation
pub fn allocation_failed_condition(
    condition_type: ConditionType,
    error_message: &str,
) -> Condition {
    new_condition(
        condition_type,
        CONDITION_STATUS_FALSE,
        ConditionReason::AllocationFailed,
        error_message,
    )
}

/// Create a condition recording a deliberately deleted resource
pub fn removed_condition(condition_type: ConditionType) -> Condition {
    new_condition(
        condition_type,
        CONDITION_STATUS_FALSE,
        ConditionReason::Removed,
        CONDITION_REMOVED_MESSAGE,
    )
}

/// Create a failed condition for the slot named by a resource annotation
pub fn allocation_failed_condition_for_annotation(
    annotation_key: &str,
    error_message: &str,
) -> Option<Condition> {
    condition_type_for_annotation(annotation_key)
        .map(|t| allocation_failed_condition(t, error_message))
}

pub fn is_removed(condition: &Condition) -> bool {
    condition.status == CONDITION_STATUS_FALSE
        && condition.reason == ConditionReason::Removed.as_str()
}

/// Condition types required by a single IP family
pub fn family_condition_types(protocol: LbProtocol, family: IpFamily) -> [ConditionType; 5] {
    [
        ResourceKind::BackendService,
        ResourceKind::HealthCheck,
        ResourceKind::Firewall,
        ResourceKind::FirewallForHealthCheck,
        ResourceKind::ForwardingRule,
    ]
    .map(|kind| condition_type_for(kind, protocol, family))
}

/// The desired condition set for the current request shape
///
/// Any vocabulary condition present on a Service but absent from this plan
/// must be flipped to Removed. An empty family list is planned as IPv4.
pub fn plan_conditions(protocol: LbProtocol, families: &[IpFamily]) -> BTreeSet<ConditionType> {
    let families: &[IpFamily] = if families.is_empty() {
        &[IpFamily::IPv4]
    } else {
        families
    };

    families
        .iter()
        .flat_map(|family| family_condition_types(protocol, *family))
        .collect()
}

/// Conditions of a Service indexed by type
///
/// Preserves the order of the underlying list and guarantees at most one
/// entry per type. Materialize with [`ConditionSet::into_conditions`].
#[derive(Clone, Debug, Default)]
pub struct ConditionSet {
    conditions: Vec<Condition>,
    index: HashMap<String, usize>,
}

impl ConditionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a stored list; a later duplicate replaces an earlier one
    pub fn from_conditions(conditions: impl IntoIterator<Item = Condition>) -> Self {
        let mut set = Self::new();
        for condition in conditions {
            match set.index.get(&condition.type_) {
                Some(&pos) => set.conditions[pos] = condition,
                None => {
                    set.index
                        .insert(condition.type_.clone(), set.conditions.len());
                    set.conditions.push(condition);
                }
            }
        }
        set
    }

    pub fn get(&self, type_: &str) -> Option<&Condition> {
        self.index.get(type_).map(|&pos| &self.conditions[pos])
    }

    pub fn is_true(&self, type_: &str) -> bool {
        self.get(type_)
            .map(|c| c.status == CONDITION_STATUS_TRUE)
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Condition> {
        self.conditions.iter()
    }

    /// Insert or replace the condition of the same type
    ///
    /// The previous transition time is kept when the status does not change.
    /// Returns true when status, reason or message changed.
    pub fn set(&mut self, condition: Condition) -> bool {
        match self.index.get(&condition.type_) {
            Some(&pos) => {
                let existing = &mut self.conditions[pos];
                let status_changed = existing.status != condition.status;
                let changed = status_changed
                    || existing.reason != condition.reason
                    || existing.message != condition.message;

                existing.status = condition.status;
                existing.reason = condition.reason;
                existing.message = condition.message;
                existing.observed_generation = condition.observed_generation;
                if status_changed {
                    existing.last_transition_time = condition.last_transition_time;
                }
                changed
            }
            None => {
                self.index
                    .insert(condition.type_.clone(), self.conditions.len());
                self.conditions.push(condition);
                true
            }
        }
    }

    /// Flip vocabulary conditions outside `plan` to Removed
    ///
    /// Conditions of foreign types are left untouched. Returns the types that
    /// transitioned.
    pub fn mark_unplanned_removed(&mut self, plan: &BTreeSet<ConditionType>) -> Vec<ConditionType> {
        let stale: Vec<ConditionType> = self
            .conditions
            .iter()
            .filter(|c| !is_removed(c))
            .filter_map(|c| c.type_.parse::<ConditionType>().ok())
            .filter(|t| !plan.contains(t))
            .collect();

        for condition_type in &stale {
            self.set(removed_condition(*condition_type));
        }
        stale
    }

    pub fn into_conditions(self) -> Vec<Condition> {
        self.conditions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn condition_at(
        type_: ConditionType,
        status: &str,
        reason: ConditionReason,
        message: &str,
    ) -> Condition {
        Condition {
            type_: type_.as_str().to_string(),
            status: status.to_string(),
            last_transition_time: Time(
                chrono::DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z")
                    .unwrap()
                    .with_timezone(&Utc),
            ),
            reason: reason.as_str().to_string(),
            message: message.to_string(),
            observed_generation: None,
        }
    }

    #[test]
    fn test_condition_type_for_is_total() {
        for kind in ResourceKind::ALL {
            for protocol in LbProtocol::ALL {
                for family in IpFamily::ALL {
                    let t = condition_type_for(kind, protocol, family);
                    assert!(t.as_str().starts_with("ServiceLoadBalancer"));
                }
            }
        }
    }

    #[test]
    fn test_forwarding_rule_variants_are_distinct() {
        let mut seen = HashSet::new();
        for protocol in LbProtocol::ALL {
            for family in IpFamily::ALL {
                let t = condition_type_for(ResourceKind::ForwardingRule, protocol, family);
                assert!(seen.insert(t), "duplicate forwarding rule type {t}");
            }
        }
        assert_eq!(seen.len(), 6);
    }

    #[test]
    fn test_varying_dimensions_map_injectively() {
        // Each kind only varies along the dimensions it depends on; within
        // those, distinct inputs must never collide, and kinds never share a type.
        let mut owners: HashMap<ConditionType, ResourceKind> = HashMap::new();
        for kind in ResourceKind::ALL {
            for protocol in LbProtocol::ALL {
                for family in IpFamily::ALL {
                    let t = condition_type_for(kind, protocol, family);
                    if let Some(owner) = owners.insert(t, kind) {
                        assert_eq!(owner, kind, "{t} shared between kinds");
                    }
                }
            }
        }
        assert_ne!(
            condition_type_for(ResourceKind::Firewall, LbProtocol::Tcp, IpFamily::IPv4),
            condition_type_for(ResourceKind::Firewall, LbProtocol::Tcp, IpFamily::IPv6)
        );
        let hc_firewall = ResourceKind::FirewallForHealthCheck;
        assert_ne!(
            condition_type_for(hc_firewall, LbProtocol::Udp, IpFamily::IPv4),
            condition_type_for(hc_firewall, LbProtocol::Udp, IpFamily::IPv6)
        );
    }

    #[test]
    fn test_vocabulary_strings_are_unique_and_round_trip() {
        let strings: HashSet<&str> = ConditionType::ALL.iter().map(|t| t.as_str()).collect();
        assert_eq!(strings.len(), ConditionType::ALL.len());
        for t in ConditionType::ALL {
            assert_eq!(t.as_str().parse::<ConditionType>().unwrap(), t);
        }
        assert!("Ready".parse::<ConditionType>().is_err());
    }

    #[test]
    fn test_vocabulary_strings_are_stable() {
        assert_eq!(
            ConditionType::TcpIpv6ForwardingRule.as_str(),
            "ServiceLoadBalancerTCPIPv6ForwardingRule"
        );
        assert_eq!(
            ConditionType::FirewallHealthCheckIpv6.as_str(),
            "ServiceLoadBalancerFirewallRuleForHealthCheckIPv6"
        );
    }

    #[test]
    fn test_annotation_mapping() {
        assert_eq!(
            condition_type_for_annotation(resource_annotation::UDP_IPV6_FORWARDING_RULE),
            Some(ConditionType::UdpIpv6ForwardingRule)
        );
        assert_eq!(
            condition_type_for_annotation(resource_annotation::FIREWALL_FOR_HEALTH_CHECK),
            Some(ConditionType::FirewallHealthCheck)
        );
        assert_eq!(
            condition_type_for_annotation("service.kubernetes.io/unknown"),
            None
        );
        assert!(allocation_failed_condition_for_annotation("bogus", "err").is_none());
    }

    #[test]
    fn test_builders() {
        let ok = allocated_condition(ConditionType::BackendService, "k8s2-bs-abc");
        assert_eq!(ok.status, CONDITION_STATUS_TRUE);
        assert_eq!(ok.reason, "GCEResourceAllocated");
        assert_eq!(ok.message, "k8s2-bs-abc");

        let failed = allocation_failed_condition(ConditionType::HealthCheck, "quota exceeded");
        assert_eq!(failed.status, CONDITION_STATUS_FALSE);
        assert_eq!(failed.reason, "GCEResourceAllocationFailed");
        assert_eq!(failed.message, "quota exceeded");
        assert!(!is_removed(&failed));

        let removed = removed_condition(ConditionType::L3Ipv6ForwardingRule);
        assert_eq!(removed.status, CONDITION_STATUS_FALSE);
        assert_eq!(removed.message, CONDITION_REMOVED_MESSAGE);
        assert!(is_removed(&removed));
    }

    #[test]
    fn test_plan_ipv4_has_no_ipv6_types() {
        for protocol in LbProtocol::ALL {
            let plan = plan_conditions(protocol, &[IpFamily::IPv4]);
            assert_eq!(plan.len(), 5);
            assert!(plan.iter().all(|t| !t.as_str().contains("IPv6")));
        }
    }

    #[test]
    fn test_plan_ipv6_only() {
        let plan = plan_conditions(LbProtocol::Udp, &[IpFamily::IPv6]);
        assert_eq!(
            plan,
            BTreeSet::from([
                ConditionType::BackendService,
                ConditionType::HealthCheck,
                ConditionType::Ipv6FirewallRule,
                ConditionType::FirewallHealthCheckIpv6,
                ConditionType::UdpIpv6ForwardingRule,
            ])
        );
    }

    #[test]
    fn test_plan_dual_stack_is_union_without_duplicates() {
        let v4 = plan_conditions(LbProtocol::Tcp, &[IpFamily::IPv4]);
        let v6 = plan_conditions(LbProtocol::Tcp, &[IpFamily::IPv6]);
        let dual = plan_conditions(LbProtocol::Tcp, &[IpFamily::IPv4, IpFamily::IPv6]);

        let union: BTreeSet<_> = v4.union(&v6).copied().collect();
        assert_eq!(dual, union);
        // 2 shared + 2x (fw, fw-hc, fr)
        assert_eq!(dual.len(), 8);
    }

    #[test]
    fn test_plan_empty_families_defaults_to_ipv4() {
        assert_eq!(
            plan_conditions(LbProtocol::L3, &[]),
            plan_conditions(LbProtocol::L3, &[IpFamily::IPv4])
        );
    }

    #[test]
    fn test_set_adds_new() {
        let mut set = ConditionSet::new();
        assert!(set.set(allocated_condition(ConditionType::BackendService, "bs-1")));
        assert_eq!(set.len(), 1);
        assert!(set.is_true(ConditionType::BackendService.as_str()));
    }

    #[test]
    fn test_set_replaces_never_appends() {
        let mut set = ConditionSet::from_conditions(vec![condition_at(
            ConditionType::HealthCheck,
            CONDITION_STATUS_FALSE,
            ConditionReason::AllocationFailed,
            "timeout",
        )]);
        let old_time = set
            .get(ConditionType::HealthCheck.as_str())
            .unwrap()
            .last_transition_time
            .clone();

        assert!(set.set(allocated_condition(ConditionType::HealthCheck, "hc-1")));
        assert_eq!(set.len(), 1);
        let hc = set.get(ConditionType::HealthCheck.as_str()).unwrap();
        assert_eq!(hc.message, "hc-1");
        assert_ne!(hc.last_transition_time, old_time);
    }

    #[test]
    fn test_set_keeps_transition_time_when_status_unchanged() {
        let mut set = ConditionSet::from_conditions(vec![condition_at(
            ConditionType::BackendService,
            CONDITION_STATUS_TRUE,
            ConditionReason::Allocated,
            "bs-1",
        )]);
        let old_time = set
            .get(ConditionType::BackendService.as_str())
            .unwrap()
            .last_transition_time
            .clone();

        assert!(!set.set(allocated_condition(ConditionType::BackendService, "bs-1")));
        assert_eq!(
            set.get(ConditionType::BackendService.as_str())
                .unwrap()
                .last_transition_time,
            old_time
        );
    }

    #[test]
    fn test_from_conditions_collapses_duplicates() {
        let set = ConditionSet::from_conditions(vec![
            allocation_failed_condition(ConditionType::FirewallRule, "first"),
            allocated_condition(ConditionType::BackendService, "bs"),
            allocated_condition(ConditionType::FirewallRule, "second"),
        ]);
        assert_eq!(set.len(), 2);
        let fw = set.get(ConditionType::FirewallRule.as_str()).unwrap();
        assert_eq!(fw.message, "second");
        let types: Vec<String> = set.into_conditions().into_iter().map(|c| c.type_).collect();
        assert_eq!(
            types,
            vec![
                ConditionType::FirewallRule.as_str().to_string(),
                ConditionType::BackendService.as_str().to_string()
            ]
        );
    }

    #[test]
    fn test_downgrade_marks_ipv6_conditions_removed() {
        let dual_plan = plan_conditions(LbProtocol::Tcp, &[IpFamily::IPv4, IpFamily::IPv6]);
        let mut set = ConditionSet::new();
        for t in &dual_plan {
            set.set(allocated_condition(*t, "res"));
        }
        let foreign = Condition {
            type_: "Ready".to_string(),
            ..allocated_condition(ConditionType::BackendService, "x")
        };
        set.set(foreign);

        let v4_plan = plan_conditions(LbProtocol::Tcp, &[IpFamily::IPv4]);
        let flipped: BTreeSet<_> = set.mark_unplanned_removed(&v4_plan).into_iter().collect();
        assert_eq!(
            flipped,
            BTreeSet::from([
                ConditionType::Ipv6FirewallRule,
                ConditionType::FirewallHealthCheckIpv6,
                ConditionType::TcpIpv6ForwardingRule,
            ])
        );
        let fr6 = set
            .get(ConditionType::TcpIpv6ForwardingRule.as_str())
            .unwrap();
        assert!(is_removed(fr6));
        assert!(set.is_true("Ready"));
        assert_eq!(set.len(), 9);

        // Already removed conditions are not flipped again
        assert!(set.mark_unplanned_removed(&v4_plan).is_empty());
    }
}
