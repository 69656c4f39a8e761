//! Device records produced by the config ingestor.
//!
//! A `Device` owns its interfaces by value, so every `Interface` belongs to
//! exactly one device for its whole lifetime. Devices are keyed by hostname
//! inside an `Inventory`.

use std::collections::BTreeMap;
use std::fmt;
use std::net::Ipv4Addr;

use ipnetwork::Ipv4Network;
use serde::{Deserialize, Serialize};

/// Default interface MTU when no `mtu` statement is present
pub const DEFAULT_MTU: u32 = 1500;

/// Broad role of a device, used by link inference and validation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    Router,
    Switch,
    Host,
    Server,
    Unknown,
}

impl DeviceKind {
    /// End systems never forward traffic for others
    pub fn is_end_host(&self) -> bool {
        matches!(self, DeviceKind::Host | DeviceKind::Server)
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeviceKind::Router => "router",
            DeviceKind::Switch => "switch",
            DeviceKind::Host => "host",
            DeviceKind::Server => "server",
            DeviceKind::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Administrative state of an interface (`shutdown` / `no shutdown`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminState {
    Up,
    Down,
}

/// One `interface` block of a device configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interface {
    pub name: String,
    /// Host address with its prefix, e.g. `10.0.12.1/30`
    pub address: Option<Ipv4Network>,
    pub description: Option<String>,
    pub bandwidth_kbps: Option<u64>,
    pub mtu: u32,
    pub access_vlan: Option<u16>,
    pub admin_state: AdminState,
}

impl Interface {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: None,
            description: None,
            bandwidth_kbps: None,
            mtu: DEFAULT_MTU,
            access_vlan: None,
            admin_state: AdminState::Up,
        }
    }

    pub fn ip(&self) -> Option<Ipv4Addr> {
        self.address.map(|a| a.ip())
    }

    pub fn is_up(&self) -> bool {
        self.admin_state == AdminState::Up
    }
}

/// A routing process configured on a device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "protocol", rename_all = "snake_case")]
pub enum RoutingProtocol {
    Ospf {
        process_id: u32,
        networks: Vec<OspfNetwork>,
    },
    Bgp {
        as_number: u32,
        neighbors: Vec<BgpNeighbor>,
    },
    Eigrp {
        as_number: u32,
    },
    Rip,
}

impl RoutingProtocol {
    pub fn name(&self) -> &'static str {
        match self {
            RoutingProtocol::Ospf { .. } => "ospf",
            RoutingProtocol::Bgp { .. } => "bgp",
            RoutingProtocol::Eigrp { .. } => "eigrp",
            RoutingProtocol::Rip => "rip",
        }
    }
}

/// `network <addr> <wildcard> area <area>` under `router ospf`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OspfNetwork {
    pub network: Ipv4Network,
    pub area: String,
}

/// `neighbor <ip> remote-as <asn>` under `router bgp`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BgpNeighbor {
    pub address: Ipv4Addr,
    pub remote_as: u32,
}

/// `ip route <prefix> <mask> <next-hop>`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticRoute {
    pub destination: Ipv4Network,
    pub next_hop: Ipv4Addr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vlan {
    pub id: u16,
    pub name: Option<String>,
}

/// A parsed device configuration dump
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub hostname: String,
    /// Folder, file or archive entry name the dump came from
    pub source_name: String,
    pub kind: DeviceKind,
    pub interfaces: Vec<Interface>,
    pub routing_protocols: Vec<RoutingProtocol>,
    pub static_routes: Vec<StaticRoute>,
    pub vlans: BTreeMap<u16, Vlan>,
    #[serde(skip)]
    pub raw_config: String,
}

impl Device {
    pub fn interface(&self, name: &str) -> Option<&Interface> {
        self.interfaces.iter().find(|i| i.name == name)
    }

    /// Interfaces that carry an IPv4 address
    pub fn addressed_interfaces(&self) -> impl Iterator<Item = &Interface> {
        self.interfaces.iter().filter(|i| i.address.is_some())
    }

    /// Find the local interface owning `ip`
    pub fn interface_with_ip(&self, ip: Ipv4Addr) -> Option<&Interface> {
        self.interfaces.iter().find(|i| i.ip() == Some(ip))
    }

    /// Find the local interface whose subnet contains `ip`
    pub fn interface_facing(&self, ip: Ipv4Addr) -> Option<&Interface> {
        self.interfaces
            .iter()
            .find(|i| i.address.map_or(false, |a| a.contains(ip)))
    }

    pub fn runs_protocol(&self, name: &str) -> bool {
        self.routing_protocols.iter().any(|p| p.name() == name)
    }

    /// Neighbor addresses named explicitly by BGP sessions or static routes
    pub fn neighbor_hints(&self) -> Vec<Ipv4Addr> {
        let mut hints: Vec<Ipv4Addr> = self
            .routing_protocols
            .iter()
            .filter_map(|p| match p {
                RoutingProtocol::Bgp { neighbors, .. } => Some(neighbors.iter().map(|n| n.address)),
                _ => None,
            })
            .flatten()
            .chain(self.static_routes.iter().map(|r| r.next_hop))
            .collect();
        hints.sort();
        hints.dedup();
        hints
    }
}

/// All devices of one analysis run, keyed by hostname
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Inventory {
    pub devices: BTreeMap<String, Device>,
    /// Non-fatal problems noticed while ingesting
    pub warnings: Vec<String>,
}

impl Inventory {
    pub fn get(&self, hostname: &str) -> Option<&Device> {
        self.devices.get(hostname)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Every (device, interface) pair with an address
    pub fn addressed_interfaces(&self) -> impl Iterator<Item = (&Device, &Interface)> {
        self.devices
            .values()
            .flat_map(|d| d.addressed_interfaces().map(move |i| (d, i)))
    }

    /// Look up which device/interface owns an address
    pub fn owner_of(&self, ip: Ipv4Addr) -> Option<(&Device, &Interface)> {
        self.addressed_interfaces().find(|(_, i)| i.ip() == Some(ip))
    }
}
