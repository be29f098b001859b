//! Service Intent view over core `v1/Service` objects
//!
//! A load-balanced Service is read as an intent: a protocol, one or two IP
//! families, a finalizer set and a deletion marker.

use std::fmt;
use std::str::FromStr;

use k8s_openapi::api::core::v1::Service;
use kube::ResourceExt;

/// Annotation naming the ConfigMap holding L4 logging settings
pub const L4_LOGGING_CONFIG_MAP_ANNOTATION: &str = "networking.gke.io/l4-logging-config-map";

/// Load balancer protocol derived from the Service ports
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LbProtocol {
    Tcp,
    Udp,
    /// Mixed or non TCP/UDP protocols, served by an L3 forwarding rule
    L3,
}

impl LbProtocol {
    pub const ALL: [LbProtocol; 3] = [LbProtocol::Tcp, LbProtocol::Udp, LbProtocol::L3];

    pub fn as_str(&self) -> &'static str {
        match self {
            LbProtocol::Tcp => "TCP",
            LbProtocol::Udp => "UDP",
            LbProtocol::L3 => "L3",
        }
    }
}

impl fmt::Display for LbProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LbProtocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "TCP" => Ok(LbProtocol::Tcp),
            "UDP" => Ok(LbProtocol::Udp),
            "L3" => Ok(LbProtocol::L3),
            other => Err(format!("unknown load balancer protocol: {other}")),
        }
    }
}

/// IP address family
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IpFamily {
    IPv4,
    IPv6,
}

impl IpFamily {
    pub const ALL: [IpFamily; 2] = [IpFamily::IPv4, IpFamily::IPv6];

    pub fn as_str(&self) -> &'static str {
        match self {
            IpFamily::IPv4 => "IPv4",
            IpFamily::IPv6 => "IPv6",
        }
    }
}

impl fmt::Display for IpFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IpFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "IPv4" => Ok(IpFamily::IPv4),
            "IPv6" => Ok(IpFamily::IPv6),
            other => Err(format!("unknown IP family: {other}")),
        }
    }
}

/// Intent accessors on a Service
pub trait ServiceIntentExt {
    /// `<namespace>/<name>` identity used for deduplication
    fn intent_key(&self) -> String;

    /// Protocol the load balancer must serve
    fn lb_protocol(&self) -> LbProtocol;

    /// Requested IP families, sorted, IPv4 when none are declared
    fn ip_families(&self) -> Vec<IpFamily>;

    fn is_dual_stack(&self) -> bool {
        self.ip_families().len() == 2
    }

    /// Name of the L4 logging ConfigMap, if annotated
    fn logging_config_map(&self) -> Option<&str>;
}

impl ServiceIntentExt for Service {
    fn intent_key(&self) -> String {
        format!(
            "{}/{}",
            self.namespace().unwrap_or_default(),
            self.name_any()
        )
    }

    fn lb_protocol(&self) -> LbProtocol {
        let ports = self
            .spec
            .as_ref()
            .and_then(|s| s.ports.as_deref())
            .unwrap_or_default();

        let mut protocols = ports.iter().map(|p| p.protocol.as_deref().unwrap_or("TCP"));

        let Some(first) = protocols.next() else {
            return LbProtocol::L3;
        };
        if !protocols.all(|p| p == first) {
            return LbProtocol::L3;
        }

        match first {
            "TCP" => LbProtocol::Tcp,
            "UDP" => LbProtocol::Udp,
            _ => LbProtocol::L3,
        }
    }

    fn ip_families(&self) -> Vec<IpFamily> {
        let mut families: Vec<IpFamily> = self
            .spec
            .as_ref()
            .and_then(|s| s.ip_families.as_ref())
            .map(|fams| fams.iter().filter_map(|f| f.parse().ok()).collect())
            .unwrap_or_default();

        families.sort();
        families.dedup();
        if families.is_empty() {
            families.push(IpFamily::IPv4);
        }
        families
    }

    fn logging_config_map(&self) -> Option<&str> {
        self.annotations()
            .get(L4_LOGGING_CONFIG_MAP_ANNOTATION)
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{ServicePort, ServiceSpec};
    use kube::api::ObjectMeta;

    fn service_with_ports(protocols: &[Option<&str>], families: Option<Vec<&str>>) -> Service {
        Service {
            metadata: ObjectMeta {
                name: Some("svc".to_string()),
                namespace: Some("ns".to_string()),
                ..Default::default()
            },
            spec: Some(ServiceSpec {
                ports: Some(
                    protocols
                        .iter()
                        .enumerate()
                        .map(|(i, p)| ServicePort {
                            port: 80 + i as i32,
                            protocol: p.map(str::to_string),
                            ..Default::default()
                        })
                        .collect(),
                ),
                ip_families: families.map(|f| f.into_iter().map(str::to_string).collect()),
                ..Default::default()
            }),
            status: None,
        }
    }

    #[test]
    fn test_protocol_defaults_to_tcp() {
        let svc = service_with_ports(&[None, Some("TCP")], None);
        assert_eq!(svc.lb_protocol(), LbProtocol::Tcp);
    }

    #[test]
    fn test_protocol_udp() {
        let svc = service_with_ports(&[Some("UDP")], None);
        assert_eq!(svc.lb_protocol(), LbProtocol::Udp);
    }

    #[test]
    fn test_mixed_protocol_is_l3() {
        let svc = service_with_ports(&[Some("TCP"), Some("UDP")], None);
        assert_eq!(svc.lb_protocol(), LbProtocol::L3);

        let sctp = service_with_ports(&[Some("SCTP")], None);
        assert_eq!(sctp.lb_protocol(), LbProtocol::L3);
    }

    #[test]
    fn test_ip_families_default_ipv4() {
        let svc = service_with_ports(&[None], None);
        assert_eq!(svc.ip_families(), vec![IpFamily::IPv4]);
        assert!(!svc.is_dual_stack());
    }

    #[test]
    fn test_ip_families_dual_stack_sorted() {
        let svc = service_with_ports(&[None], Some(vec!["IPv6", "IPv4"]));
        assert_eq!(svc.ip_families(), vec![IpFamily::IPv4, IpFamily::IPv6]);
        assert!(svc.is_dual_stack());
    }

    #[test]
    fn test_intent_key() {
        let svc = service_with_ports(&[None], None);
        assert_eq!(svc.intent_key(), "ns/svc");
    }
}
