//! Cisco IOS-style configuration parser.
//!
//! The parser is line oriented. Top-level commands (`hostname`, `interface`,
//! `router`, `vlan`, `ip route`) open or update a section; indented lines
//! belong to the open section. Dumps that lost their indentation still parse:
//! an unindented line that is a known sub-command of the open section stays
//! in that section.

use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::sync::LazyLock;

use ipnetwork::Ipv4Network;
use log::{debug, warn};
use regex::Regex;

use crate::model::{
    AdminState, BgpNeighbor, Device, DeviceKind, Interface, OspfNetwork, RoutingProtocol,
    StaticRoute, Vlan,
};
use crate::utils::ip_utils::{interface_address, mask_to_prefix, wildcard_to_prefix};

/// Compiled regex patterns for configuration parsing
pub struct ConfigPatterns {
    /// Match: "hostname R1"
    pub hostname: Regex,
    /// Match: "interface GigabitEthernet0/0"
    pub interface: Regex,
    /// Match: "ip address 10.0.0.1 255.255.255.0" (not "secondary")
    pub ip_address: Regex,
    /// Match: "description Uplink to SW1"
    pub description: Regex,
    /// Match: "bandwidth 1000000"
    pub bandwidth: Regex,
    /// Match: "mtu 9000"
    pub mtu: Regex,
    /// Match: "switchport access vlan 10"
    pub access_vlan: Regex,
    /// Match: "router ospf 1", "router bgp 65001", "router eigrp 10", "router rip"
    pub router: Regex,
    /// Match: "network 10.0.0.0 0.0.0.255 area 0"
    pub ospf_network: Regex,
    /// Match: "neighbor 10.0.0.2 remote-as 65002"
    pub bgp_neighbor: Regex,
    /// Match: "ip route 0.0.0.0 0.0.0.0 10.0.0.1"
    pub static_route: Regex,
    /// Match: "vlan 10" or "vlan 10 name USERS"
    pub vlan: Regex,
    /// Match: "name USERS"
    pub vlan_name: Regex,
    /// Match device name prefixes like "R1", "Router-2"
    pub router_name: Regex,
}

impl ConfigPatterns {
    pub fn new() -> Self {
        Self {
            hostname: Regex::new(r"^hostname\s+(\S+)").expect("Invalid hostname regex"),
            interface: Regex::new(r"^interface\s+(\S+)").expect("Invalid interface regex"),
            ip_address: Regex::new(r"^ip address\s+(\S+)\s+(\S+)\s*$")
                .expect("Invalid ip_address regex"),
            description: Regex::new(r"^description\s+(.+)$").expect("Invalid description regex"),
            bandwidth: Regex::new(r"^bandwidth\s+(\d+)").expect("Invalid bandwidth regex"),
            mtu: Regex::new(r"^mtu\s+(\d+)").expect("Invalid mtu regex"),
            access_vlan: Regex::new(r"^switchport access vlan\s+(\d+)")
                .expect("Invalid access_vlan regex"),
            router: Regex::new(r"^router\s+(ospf|bgp|eigrp|rip)(?:\s+(\d+))?")
                .expect("Invalid router regex"),
            ospf_network: Regex::new(r"^network\s+(\S+)\s+(\S+)\s+area\s+(\S+)")
                .expect("Invalid ospf_network regex"),
            bgp_neighbor: Regex::new(r"^neighbor\s+(\S+)\s+remote-as\s+(\d+)")
                .expect("Invalid bgp_neighbor regex"),
            static_route: Regex::new(r"^ip route\s+(\S+)\s+(\S+)\s+(\d+\.\d+\.\d+\.\d+)")
                .expect("Invalid static_route regex"),
            vlan: Regex::new(r"^vlan\s+(\d+)(?:\s+name\s+(\S+))?\s*$").expect("Invalid vlan regex"),
            vlan_name: Regex::new(r"^name\s+(\S+)").expect("Invalid vlan_name regex"),
            router_name: Regex::new(r"(?i)^(r\d+|router)").expect("Invalid router_name regex"),
        }
    }
}

impl Default for ConfigPatterns {
    fn default() -> Self {
        Self::new()
    }
}

/// Global patterns instance
pub static PATTERNS: LazyLock<ConfigPatterns> = LazyLock::new(ConfigPatterns::new);

/// Section currently receiving sub-commands
#[derive(Debug, Clone, Copy)]
enum Section {
    None,
    Interface(usize),
    Routing(usize),
    Vlan(u16),
}

impl Section {
    /// Whether an unindented line still belongs to this section
    fn accepts(&self, line: &str) -> bool {
        const INTERFACE_COMMANDS: &[&str] = &[
            "ip address",
            "description",
            "bandwidth",
            "mtu",
            "switchport",
            "shutdown",
            "no shutdown",
            "duplex",
            "speed",
        ];
        match self {
            Section::None => false,
            Section::Interface(_) => INTERFACE_COMMANDS.iter().any(|c| line.starts_with(c)),
            Section::Routing(_) => {
                line.starts_with("network ")
                    || line.starts_with("neighbor ")
                    || line.starts_with("router-id ")
            }
            Section::Vlan(_) => line.starts_with("name "),
        }
    }
}

/// Parse one configuration dump into a device record
pub fn parse_device(source_name: &str, text: &str) -> Device {
    let mut hostname: Option<String> = None;
    let mut interfaces: Vec<Interface> = Vec::new();
    let mut routing_protocols: Vec<RoutingProtocol> = Vec::new();
    let mut static_routes: Vec<StaticRoute> = Vec::new();
    let mut vlans: BTreeMap<u16, Vlan> = BTreeMap::new();

    let mut section = Section::None;

    for raw_line in text.lines() {
        let line = raw_line.trim_end();
        let trimmed = line.trim_start();
        if trimmed.is_empty() {
            continue;
        }
        let indented = trimmed.len() != line.len();

        if !indented && (trimmed.starts_with('!') || trimmed == "end") {
            section = Section::None;
            continue;
        }

        if indented || section.accepts(trimmed) {
            match section {
                Section::Interface(idx) => parse_interface_line(&mut interfaces[idx], trimmed),
                Section::Routing(idx) => parse_routing_line(&mut routing_protocols[idx], trimmed),
                Section::Vlan(id) => {
                    if let Some(caps) = PATTERNS.vlan_name.captures(trimmed) {
                        if let Some(vlan) = vlans.get_mut(&id) {
                            vlan.name = Some(caps[1].to_string());
                        }
                    }
                }
                Section::None => {}
            }
            continue;
        }

        section = Section::None;

        if let Some(caps) = PATTERNS.hostname.captures(trimmed) {
            hostname = Some(caps[1].to_string());
        } else if let Some(caps) = PATTERNS.interface.captures(trimmed) {
            let name = caps[1].to_string();
            // A repeated block extends the earlier one
            let idx = match interfaces.iter().position(|i| i.name == name) {
                Some(idx) => idx,
                None => {
                    interfaces.push(Interface::new(name));
                    interfaces.len() - 1
                }
            };
            section = Section::Interface(idx);
        } else if let Some(caps) = PATTERNS.router.captures(trimmed) {
            let id: Option<u32> = caps.get(2).and_then(|m| m.as_str().parse().ok());
            let protocol = match &caps[1] {
                "ospf" => RoutingProtocol::Ospf {
                    process_id: id.unwrap_or(1),
                    networks: Vec::new(),
                },
                "bgp" => RoutingProtocol::Bgp {
                    as_number: id.unwrap_or(0),
                    neighbors: Vec::new(),
                },
                "eigrp" => RoutingProtocol::Eigrp {
                    as_number: id.unwrap_or(0),
                },
                _ => RoutingProtocol::Rip,
            };
            routing_protocols.push(protocol);
            section = Section::Routing(routing_protocols.len() - 1);
        } else if let Some(caps) = PATTERNS.static_route.captures(trimmed) {
            match parse_static_route(&caps[1], &caps[2], &caps[3]) {
                Some(route) => static_routes.push(route),
                None => warn!("{}: ignoring malformed static route '{}'", source_name, trimmed),
            }
        } else if let Some(caps) = PATTERNS.vlan.captures(trimmed) {
            if let Ok(id) = caps[1].parse::<u16>() {
                let name = caps.get(2).map(|m| m.as_str().to_string());
                let vlan = vlans.entry(id).or_insert(Vlan { id, name: None });
                if name.is_some() {
                    vlan.name = name;
                }
                section = Section::Vlan(id);
            }
        }
    }

    let hostname = hostname.unwrap_or_else(|| source_name.to_string());
    let kind = classify_device(&hostname, source_name, &routing_protocols, &static_routes, &interfaces, &vlans);

    debug!(
        "Parsed {} ({}): {} interfaces, {} routing processes, {} VLANs",
        hostname,
        kind,
        interfaces.len(),
        routing_protocols.len(),
        vlans.len()
    );

    Device {
        hostname,
        source_name: source_name.to_string(),
        kind,
        interfaces,
        routing_protocols,
        static_routes,
        vlans,
        raw_config: text.to_string(),
    }
}

fn parse_interface_line(iface: &mut Interface, line: &str) {
    if line == "shutdown" {
        iface.admin_state = AdminState::Down;
    } else if line == "no shutdown" {
        iface.admin_state = AdminState::Up;
    } else if let Some(caps) = PATTERNS.ip_address.captures(line) {
        match interface_address(&caps[1], &caps[2]) {
            Some(address) => iface.address = Some(address),
            None => warn!(
                "Interface {}: ignoring invalid address '{} {}'",
                iface.name,
                &caps[1],
                &caps[2]
            ),
        }
    } else if let Some(caps) = PATTERNS.description.captures(line) {
        iface.description = Some(caps[1].trim().to_string());
    } else if let Some(caps) = PATTERNS.bandwidth.captures(line) {
        iface.bandwidth_kbps = caps[1].parse().ok();
    } else if let Some(caps) = PATTERNS.mtu.captures(line) {
        if let Ok(mtu) = caps[1].parse() {
            iface.mtu = mtu;
        }
    } else if let Some(caps) = PATTERNS.access_vlan.captures(line) {
        iface.access_vlan = caps[1].parse().ok();
    }
}

fn parse_routing_line(protocol: &mut RoutingProtocol, line: &str) {
    match protocol {
        RoutingProtocol::Ospf { networks, .. } => {
            if let Some(caps) = PATTERNS.ospf_network.captures(line) {
                let network = caps[1]
                    .parse::<Ipv4Addr>()
                    .ok()
                    .zip(wildcard_to_prefix(&caps[2]))
                    .and_then(|(addr, prefix)| Ipv4Network::new(addr, prefix).ok());
                match network {
                    Some(network) => networks.push(OspfNetwork {
                        network,
                        area: caps[3].to_string(),
                    }),
                    None => warn!("Ignoring malformed OSPF network statement '{}'", line),
                }
            }
        }
        RoutingProtocol::Bgp { neighbors, .. } => {
            if let Some(caps) = PATTERNS.bgp_neighbor.captures(line) {
                match (caps[1].parse::<Ipv4Addr>(), caps[2].parse::<u32>()) {
                    (Ok(address), Ok(remote_as)) => neighbors.push(BgpNeighbor { address, remote_as }),
                    _ => warn!("Ignoring malformed BGP neighbor statement '{}'", line),
                }
            }
        }
        RoutingProtocol::Eigrp { .. } | RoutingProtocol::Rip => {}
    }
}

fn parse_static_route(prefix: &str, mask: &str, next_hop: &str) -> Option<StaticRoute> {
    let destination = Ipv4Network::new(prefix.parse::<Ipv4Addr>().ok()?, mask_to_prefix(mask)?).ok()?;
    Some(StaticRoute {
        destination,
        next_hop: next_hop.parse().ok()?,
    })
}

/// Classify a device by naming convention, then by configuration content
pub fn classify_device(
    hostname: &str,
    source_name: &str,
    routing_protocols: &[RoutingProtocol],
    static_routes: &[StaticRoute],
    interfaces: &[Interface],
    vlans: &BTreeMap<u16, Vlan>,
) -> DeviceKind {
    for name in [hostname, source_name] {
        if let Some(kind) = kind_from_name(name) {
            return kind;
        }
    }

    if !routing_protocols.is_empty() || !static_routes.is_empty() {
        DeviceKind::Router
    } else if !vlans.is_empty() || interfaces.iter().any(|i| i.access_vlan.is_some()) {
        DeviceKind::Switch
    } else {
        DeviceKind::Unknown
    }
}

fn kind_from_name(name: &str) -> Option<DeviceKind> {
    let lower = name.to_ascii_lowercase();
    if lower.starts_with("sw") || lower.starts_with("switch") {
        Some(DeviceKind::Switch)
    } else if lower.starts_with("pc") || lower.starts_with("laptop") {
        Some(DeviceKind::Host)
    } else if lower.starts_with("server") || lower.starts_with("srv") {
        Some(DeviceKind::Server)
    } else if PATTERNS.router_name.is_match(name) {
        Some(DeviceKind::Router)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROUTER_DUMP: &str = "\
!
hostname R1
!
interface GigabitEthernet0/0
 description Link to R2
 ip address 10.0.12.1 255.255.255.252
 bandwidth 1000000
 mtu 9000
!
interface GigabitEthernet0/1
 ip address 192.168.1.1 255.255.255.0
 no shutdown
!
interface GigabitEthernet0/2
 ip address 172.16.0.1 255.255.0.255
 shutdown
!
router ospf 10
 network 10.0.12.0 0.0.0.3 area 0
 network 192.168.1.0 0.0.0.255 area 0
!
router bgp 65001
 neighbor 10.0.12.2 remote-as 65002
!
ip route 0.0.0.0 0.0.0.0 10.0.12.2
end
";

    #[test]
    fn test_parse_router_dump() {
        let device = parse_device("R1", ROUTER_DUMP);
        assert_eq!(device.hostname, "R1");
        assert_eq!(device.kind, DeviceKind::Router);
        assert_eq!(device.interfaces.len(), 3);

        let gi0 = device.interface("GigabitEthernet0/0").unwrap();
        assert_eq!(gi0.address.unwrap().to_string(), "10.0.12.1/30");
        assert_eq!(gi0.bandwidth_kbps, Some(1_000_000));
        assert_eq!(gi0.mtu, 9000);
        assert_eq!(gi0.description.as_deref(), Some("Link to R2"));

        let gi1 = device.interface("GigabitEthernet0/1").unwrap();
        assert_eq!(gi1.mtu, 1500);
        assert!(gi1.is_up());

        // Non-contiguous mask is dropped, shutdown is kept
        let gi2 = device.interface("GigabitEthernet0/2").unwrap();
        assert!(gi2.address.is_none());
        assert_eq!(gi2.admin_state, AdminState::Down);
    }

    #[test]
    fn test_parse_routing_statements() {
        let device = parse_device("R1", ROUTER_DUMP);
        assert_eq!(device.routing_protocols.len(), 2);

        match &device.routing_protocols[0] {
            RoutingProtocol::Ospf { process_id, networks } => {
                assert_eq!(*process_id, 10);
                assert_eq!(networks.len(), 2);
                assert_eq!(networks[0].network.to_string(), "10.0.12.0/30");
                assert_eq!(networks[0].area, "0");
            }
            other => panic!("expected OSPF, got {:?}", other),
        }
        match &device.routing_protocols[1] {
            RoutingProtocol::Bgp { as_number, neighbors } => {
                assert_eq!(*as_number, 65001);
                assert_eq!(neighbors[0].address.to_string(), "10.0.12.2");
                assert_eq!(neighbors[0].remote_as, 65002);
            }
            other => panic!("expected BGP, got {:?}", other),
        }

        assert_eq!(device.static_routes.len(), 1);
        assert_eq!(device.static_routes[0].destination.to_string(), "0.0.0.0/0");
    }

    #[test]
    fn test_parse_switch_vlans() {
        let dump = "\
hostname ACCESS-A
vlan 10
 name USERS
vlan 20 name VOICE
vlan 30
interface FastEthernet0/1
 switchport mode access
 switchport access vlan 10
";
        let device = parse_device("access-a", dump);
        assert_eq!(device.kind, DeviceKind::Switch);
        assert_eq!(device.vlans.len(), 3);
        assert_eq!(device.vlans[&10].name.as_deref(), Some("USERS"));
        assert_eq!(device.vlans[&20].name.as_deref(), Some("VOICE"));
        assert_eq!(device.vlans[&30].name, None);
        assert_eq!(device.interfaces[0].access_vlan, Some(10));
    }

    #[test]
    fn test_unindented_dump() {
        let dump = "\
hostname R7
interface Serial0/0
ip address 10.1.1.1 255.255.255.0
shutdown
interface Serial0/1
ip address 10.2.2.1 255.255.255.0
";
        let device = parse_device("R7", dump);
        assert_eq!(device.interfaces.len(), 2);
        assert!(!device.interfaces[0].is_up());
        assert_eq!(device.interfaces[1].ip().unwrap().to_string(), "10.2.2.1");
    }

    #[test]
    fn test_hostname_falls_back_to_source_name() {
        let device = parse_device("PC3", "interface eth0\n ip address 192.168.1.30 255.255.255.0\n");
        assert_eq!(device.hostname, "PC3");
        assert_eq!(device.kind, DeviceKind::Host);
    }

    #[test]
    fn test_secondary_and_dhcp_addresses_ignored() {
        let dump = "\
interface Vlan1
 ip address dhcp
interface Vlan2
 ip address 10.9.9.1 255.255.255.0
 ip address 10.9.8.1 255.255.255.0 secondary
";
        let device = parse_device("edge", dump);
        assert!(device.interfaces[0].address.is_none());
        assert_eq!(device.interfaces[1].ip().unwrap().to_string(), "10.9.9.1");
    }

    #[test]
    fn test_classify_by_content() {
        let device = parse_device("edge", "router rip\n network 10.0.0.0\n");
        assert_eq!(device.kind, DeviceKind::Router);
        assert!(matches!(device.routing_protocols[0], RoutingProtocol::Rip));

        let device = parse_device("box", "interface eth0\n");
        assert_eq!(device.kind, DeviceKind::Unknown);
        assert_eq!(kind_from_name("Router-Core"), Some(DeviceKind::Router));
        assert_eq!(kind_from_name("srv-db"), Some(DeviceKind::Server));
    }
}
