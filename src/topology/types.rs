//! Topology type definitions.
//!
//! A `Topology` is an undirected multigraph: devices are nodes and every
//! inferred `Link` joins one interface on each of two different devices.
//! Two devices may be joined by several links (one per shared subnet), while
//! graph queries work on the collapsed device adjacency.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::net::Ipv4Addr;

use ipnetwork::Ipv4Network;
use serde::{Deserialize, Serialize};

use crate::model::DeviceKind;

/// Why a link was inferred
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LinkEvidence {
    /// Both interfaces are addressed in the same subnet
    SharedSubnet { network: Ipv4Network },
    /// A `neighbor <ip> remote-as` statement names the remote interface
    BgpNeighbor { address: Ipv4Addr },
    /// A static route uses the remote interface as next hop
    StaticRouteNextHop { address: Ipv4Addr },
    /// An interface description names the remote device
    Description { text: String },
}

impl LinkEvidence {
    pub fn is_shared_subnet(&self) -> bool {
        matches!(self, LinkEvidence::SharedSubnet { .. })
    }
}

impl fmt::Display for LinkEvidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkEvidence::SharedSubnet { network } => write!(f, "subnet {}", network),
            LinkEvidence::BgpNeighbor { address } => write!(f, "bgp neighbor {}", address),
            LinkEvidence::StaticRouteNextHop { address } => write!(f, "static next-hop {}", address),
            LinkEvidence::Description { text } => write!(f, "description \"{}\"", text),
        }
    }
}

/// One side of a link
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkEndpoint {
    pub device: String,
    /// Unknown when the link comes from a description hint on the far side
    pub interface: Option<String>,
    pub address: Option<Ipv4Addr>,
    pub mtu: u32,
    pub bandwidth_kbps: u64,
}

/// An undirected link; `a.device` sorts before `b.device`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub a: LinkEndpoint,
    pub b: LinkEndpoint,
    pub evidence: Vec<LinkEvidence>,
    /// Slower of the two endpoints
    pub bandwidth_kbps: u64,
    /// `1 / bandwidth`, lower is preferred
    pub cost: f64,
}

impl Link {
    /// Build a link, putting endpoints in canonical order
    pub fn new(x: LinkEndpoint, y: LinkEndpoint, evidence: LinkEvidence) -> Self {
        let (a, b) = if x.device <= y.device { (x, y) } else { (y, x) };
        let bandwidth_kbps = a.bandwidth_kbps.min(b.bandwidth_kbps).max(1);
        Self {
            a,
            b,
            evidence: vec![evidence],
            bandwidth_kbps,
            cost: 1.0 / bandwidth_kbps as f64,
        }
    }

    pub fn id(&self) -> String {
        format!("{}-{}", self.a.device, self.b.device)
    }

    pub fn devices(&self) -> (&str, &str) {
        (&self.a.device, &self.b.device)
    }

    pub fn touches(&self, device: &str) -> bool {
        self.a.device == device || self.b.device == device
    }

    pub fn joins(&self, x: &str, y: &str) -> bool {
        (self.a.device == x && self.b.device == y) || (self.a.device == y && self.b.device == x)
    }

    /// The endpoint on `device`, if the link touches it
    pub fn endpoint(&self, device: &str) -> Option<&LinkEndpoint> {
        if self.a.device == device {
            Some(&self.a)
        } else if self.b.device == device {
            Some(&self.b)
        } else {
            None
        }
    }

    pub fn other_end(&self, device: &str) -> Option<&LinkEndpoint> {
        if self.a.device == device {
            Some(&self.b)
        } else if self.b.device == device {
            Some(&self.a)
        } else {
            None
        }
    }

    /// The shared subnet, for subnet-derived links
    pub fn subnet(&self) -> Option<Ipv4Network> {
        self.evidence.iter().find_map(|e| match e {
            LinkEvidence::SharedSubnet { network } => Some(*network),
            _ => None,
        })
    }

    pub fn is_inferred_from_subnet(&self) -> bool {
        self.evidence.iter().any(LinkEvidence::is_shared_subnet)
    }

    pub fn add_evidence(&mut self, evidence: LinkEvidence) {
        if !self.evidence.contains(&evidence) {
            self.evidence.push(evidence);
        }
    }
}

/// A device as seen by the topology
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceNode {
    pub hostname: String,
    pub kind: DeviceKind,
    pub tier: Tier,
}

/// Hierarchy tier derived from degree centrality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Core,
    Distribution,
    Access,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Core => write!(f, "core"),
            Tier::Distribution => write!(f, "distribution"),
            Tier::Access => write!(f, "access"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Hierarchy {
    pub core: Vec<String>,
    pub distribution: Vec<String>,
    pub access: Vec<String>,
}

impl Hierarchy {
    pub fn tier_of(&self, device: &str) -> Option<Tier> {
        if self.core.iter().any(|d| d == device) {
            Some(Tier::Core)
        } else if self.distribution.iter().any(|d| d == device) {
            Some(Tier::Distribution)
        } else if self.access.iter().any(|d| d == device) {
            Some(Tier::Access)
        } else {
            None
        }
    }

    pub fn is_core(&self, device: &str) -> bool {
        self.core.iter().any(|d| d == device)
    }
}

/// Devices plus inferred links
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Topology {
    pub nodes: BTreeMap<String, DeviceNode>,
    pub links: Vec<Link>,
    pub hierarchy: Hierarchy,
    /// Collapsed device adjacency, rebuilt from `links`
    #[serde(skip)]
    pub(crate) adjacency: BTreeMap<String, BTreeSet<String>>,
}

impl Topology {
    /// Assemble a topology and index its adjacency
    pub fn new(nodes: BTreeMap<String, DeviceNode>, links: Vec<Link>) -> Self {
        let mut topology = Self {
            nodes,
            links,
            hierarchy: Hierarchy::default(),
            adjacency: BTreeMap::new(),
        };
        topology.reindex();
        topology
    }

    /// Rebuild the adjacency index from the link list
    pub fn reindex(&mut self) {
        let mut adjacency: BTreeMap<String, BTreeSet<String>> = self
            .nodes
            .keys()
            .map(|name| (name.clone(), BTreeSet::new()))
            .collect();
        for link in &self.links {
            let (a, b) = link.devices();
            adjacency.entry(a.to_string()).or_default().insert(b.to_string());
            adjacency.entry(b.to_string()).or_default().insert(a.to_string());
        }
        self.adjacency = adjacency;
    }

    pub fn kind_of(&self, device: &str) -> DeviceKind {
        self.nodes
            .get(device)
            .map_or(DeviceKind::Unknown, |n| n.kind)
    }

    /// All links joining two devices
    pub fn links_between<'a>(&'a self, x: &'a str, y: &'a str) -> impl Iterator<Item = &'a Link> + 'a {
        self.links.iter().filter(move |l| l.joins(x, y))
    }

    pub fn links_of<'a>(&'a self, device: &'a str) -> impl Iterator<Item = &'a Link> + 'a {
        self.links.iter().filter(move |l| l.touches(device))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(device: &str, iface: &str, bw: u64) -> LinkEndpoint {
        LinkEndpoint {
            device: device.to_string(),
            interface: Some(iface.to_string()),
            address: None,
            mtu: 1500,
            bandwidth_kbps: bw,
        }
    }

    #[test]
    fn test_link_canonical_order_and_bandwidth() {
        let link = Link::new(
            endpoint("SW1", "Fa0/1", 100_000),
            endpoint("R1", "Gi0/1", 1_000_000),
            LinkEvidence::SharedSubnet {
                network: "192.168.1.0/24".parse().unwrap(),
            },
        );
        assert_eq!(link.devices(), ("R1", "SW1"));
        assert_eq!(link.bandwidth_kbps, 100_000);
        assert!((link.cost - 1e-5).abs() < 1e-12);
        assert_eq!(link.other_end("R1").unwrap().device, "SW1");
        assert_eq!(link.subnet().unwrap().to_string(), "192.168.1.0/24");
        assert_eq!(link.id(), "R1-SW1");
    }

    #[test]
    fn test_add_evidence_deduplicates() {
        let mut link = Link::new(
            endpoint("R1", "Gi0/0", 1000),
            endpoint("R2", "Gi0/0", 1000),
            LinkEvidence::BgpNeighbor {
                address: "10.0.0.2".parse().unwrap(),
            },
        );
        link.add_evidence(LinkEvidence::BgpNeighbor {
            address: "10.0.0.2".parse().unwrap(),
        });
        assert_eq!(link.evidence.len(), 1);
        assert!(!link.is_inferred_from_subnet());
    }

    #[test]
    fn test_hierarchy_tier_lookup() {
        let hierarchy = Hierarchy {
            core: vec!["R1".to_string()],
            distribution: vec!["SW1".to_string()],
            access: vec!["PC1".to_string()],
        };
        assert_eq!(hierarchy.tier_of("R1"), Some(Tier::Core));
        assert_eq!(hierarchy.tier_of("PC1"), Some(Tier::Access));
        assert_eq!(hierarchy.tier_of("nope"), None);
    }
}
