//! Link inference.
//!
//! Links are inferred in three passes:
//! 1. interfaces sharing a subnet
//! 2. explicit neighbor statements (BGP neighbors, static route next hops)
//! 3. interface descriptions naming another device
//!
//! Later passes only add links the earlier passes did not already find.

use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use ipnetwork::Ipv4Network;
use log::{debug, info};
use regex::Regex;

use crate::model::{Device, DeviceKind, Interface, Inventory, RoutingProtocol, DEFAULT_MTU};
use crate::settings::TopologySettings;
use crate::utils::ip_utils::subnet_of;

use super::hierarchy::compute_hierarchy;
use super::types::{DeviceNode, Link, LinkEndpoint, LinkEvidence, Tier, Topology};

/// Build the topology for an inventory
pub fn build_topology(inventory: &Inventory, settings: &TopologySettings) -> Topology {
    info!("Building network topology...");

    let nodes: BTreeMap<String, DeviceNode> = inventory
        .devices
        .values()
        .map(|d| {
            (
                d.hostname.clone(),
                DeviceNode {
                    hostname: d.hostname.clone(),
                    kind: d.kind,
                    tier: Tier::Access,
                },
            )
        })
        .collect();

    let mut links: Vec<Link> = Vec::new();
    add_subnet_links(inventory, settings, &mut links);
    add_neighbor_statement_links(inventory, settings, &mut links);
    if settings.use_description_hints {
        add_description_links(inventory, settings, &mut links);
    }

    links.sort_by(|x, y| {
        (&x.a.device, &x.b.device, &x.a.interface, &x.b.interface)
            .cmp(&(&y.a.device, &y.b.device, &y.a.interface, &y.b.interface))
    });

    let mut topology = Topology::new(nodes, links);
    topology.hierarchy = compute_hierarchy(&topology, settings);
    let tiers: Vec<(String, Tier)> = topology
        .nodes
        .keys()
        .filter_map(|name| topology.hierarchy.tier_of(name).map(|t| (name.clone(), t)))
        .collect();
    for (name, tier) in tiers {
        if let Some(node) = topology.nodes.get_mut(&name) {
            node.tier = tier;
        }
    }

    info!(
        "Topology built: {} nodes, {} links",
        topology.nodes.len(),
        topology.links.len()
    );
    topology
}

fn endpoint(device: &Device, iface: Option<&Interface>, settings: &TopologySettings) -> LinkEndpoint {
    LinkEndpoint {
        device: device.hostname.clone(),
        interface: iface.map(|i| i.name.clone()),
        address: iface.and_then(|i| i.ip()),
        mtu: iface.map_or(DEFAULT_MTU, |i| i.mtu),
        bandwidth_kbps: iface
            .and_then(|i| i.bandwidth_kbps)
            .unwrap_or(settings.default_bandwidth_kbps),
    }
}

/// Devices that attach to the network like end hosts. Unclassified devices
/// are not assumed to be infrastructure.
fn is_leaf(kind: DeviceKind) -> bool {
    kind.is_end_host() || kind == DeviceKind::Unknown
}

/// Whether two devices on one segment should be linked
fn kinds_compatible(x: DeviceKind, y: DeviceKind, segment_has_switch: bool) -> bool {
    match (is_leaf(x), is_leaf(y)) {
        (true, true) => false,
        (true, false) if segment_has_switch => y == DeviceKind::Switch,
        (false, true) if segment_has_switch => x == DeviceKind::Switch,
        _ => true,
    }
}

fn add_subnet_links(inventory: &Inventory, settings: &TopologySettings, links: &mut Vec<Link>) {
    let mut segments: BTreeMap<Ipv4Network, Vec<(&Device, &Interface)>> = BTreeMap::new();

    for (device, iface) in inventory.addressed_interfaces() {
        if !iface.is_up() && !settings.include_shutdown_interfaces {
            debug!("Skipping shutdown interface {} {}", device.hostname, iface.name);
            continue;
        }
        if let Some(address) = iface.address {
            segments.entry(subnet_of(&address)).or_default().push((device, iface));
        }
    }

    for (network, members) in &segments {
        let has_switch = members.iter().any(|(d, _)| d.kind == DeviceKind::Switch);

        for (i, (dx, ix)) in members.iter().enumerate() {
            for (dy, iy) in &members[i + 1..] {
                if dx.hostname == dy.hostname {
                    continue;
                }
                if !kinds_compatible(dx.kind, dy.kind, has_switch) {
                    debug!(
                        "Not linking {} ({}) and {} ({}) on {}",
                        dx.hostname, dx.kind, dy.hostname, dy.kind, network
                    );
                    continue;
                }
                // At most one link per device pair and subnet
                let exists = links
                    .iter()
                    .any(|l| l.joins(&dx.hostname, &dy.hostname) && l.subnet() == Some(*network));
                if exists {
                    continue;
                }

                debug!(
                    "Connected {} {} to {} {} via {}",
                    dx.hostname, ix.name, dy.hostname, iy.name, network
                );
                links.push(Link::new(
                    endpoint(dx, Some(ix), settings),
                    endpoint(dy, Some(iy), settings),
                    LinkEvidence::SharedSubnet { network: *network },
                ));
            }
        }
    }
}

fn add_neighbor_statement_links(
    inventory: &Inventory,
    settings: &TopologySettings,
    links: &mut Vec<Link>,
) {
    for device in inventory.devices.values() {
        let bgp = device.routing_protocols.iter().flat_map(|p| match p {
            RoutingProtocol::Bgp { neighbors, .. } => neighbors
                .iter()
                .map(|n| LinkEvidence::BgpNeighbor { address: n.address })
                .collect::<Vec<_>>(),
            _ => Vec::new(),
        });
        let statics = device
            .static_routes
            .iter()
            .map(|r| LinkEvidence::StaticRouteNextHop { address: r.next_hop });

        for evidence in bgp.chain(statics).collect::<Vec<_>>() {
            let address = match &evidence {
                LinkEvidence::BgpNeighbor { address }
                | LinkEvidence::StaticRouteNextHop { address } => *address,
                _ => continue,
            };
            link_to_address(inventory, settings, device, address, evidence, links);
        }
    }
}

fn link_to_address(
    inventory: &Inventory,
    settings: &TopologySettings,
    device: &Device,
    address: Ipv4Addr,
    evidence: LinkEvidence,
    links: &mut Vec<Link>,
) {
    let Some((remote, remote_iface)) = inventory.owner_of(address) else {
        debug!("{}: neighbor {} is outside the inventory", device.hostname, address);
        return;
    };
    if remote.hostname == device.hostname {
        return;
    }

    let local_iface = device.interface_facing(address);
    let down = !remote_iface.is_up() || local_iface.is_some_and(|i| !i.is_up());
    if down && !settings.include_shutdown_interfaces {
        debug!(
            "{}: neighbor {} is on a shutdown interface, skipping",
            device.hostname, address
        );
        return;
    }
    let local_name = local_iface.map(|i| i.name.as_str());

    let existing = links.iter_mut().find(|l| {
        l.joins(&device.hostname, &remote.hostname)
            && l.endpoint(&remote.hostname)
                .map_or(false, |e| e.interface.as_deref() == Some(remote_iface.name.as_str()))
            && (local_name.is_none()
                || l.endpoint(&device.hostname)
                    .map_or(false, |e| e.interface.as_deref() == local_name))
    });

    match existing {
        Some(link) => link.add_evidence(evidence),
        None => {
            debug!(
                "Connected {} to {} {} via {}",
                device.hostname, remote.hostname, remote_iface.name, evidence
            );
            links.push(Link::new(
                endpoint(device, local_iface, settings),
                endpoint(remote, Some(remote_iface), settings),
                evidence,
            ));
        }
    }
}

fn add_description_links(inventory: &Inventory, settings: &TopologySettings, links: &mut Vec<Link>) {
    let matchers: Vec<(&Device, Regex)> = inventory
        .devices
        .values()
        .filter_map(|d| {
            Regex::new(&format!(r"(?i)\b{}\b", regex::escape(&d.hostname)))
                .ok()
                .map(|re| (d, re))
        })
        .collect();

    for device in inventory.devices.values() {
        for iface in &device.interfaces {
            let Some(text) = iface.description.as_deref() else {
                continue;
            };
            if !iface.is_up() && !settings.include_shutdown_interfaces {
                continue;
            }
            for (remote, re) in &matchers {
                if remote.hostname == device.hostname || !re.is_match(text) {
                    continue;
                }
                if links.iter().any(|l| l.joins(&device.hostname, &remote.hostname)) {
                    continue;
                }
                debug!(
                    "Connected {} {} to {} from description",
                    device.hostname, iface.name, remote.hostname
                );
                links.push(Link::new(
                    endpoint(device, Some(iface), settings),
                    endpoint(remote, None, settings),
                    LinkEvidence::Description {
                        text: text.to_string(),
                    },
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::parse_device;

    fn inventory(dumps: &[(&str, &str)]) -> Inventory {
        let mut inv = Inventory::default();
        for (name, text) in dumps {
            let device = parse_device(name, text);
            inv.devices.insert(device.hostname.clone(), device);
        }
        inv
    }

    #[test]
    fn test_point_to_point_subnet_link() {
        let inv = inventory(&[
            ("R1", "interface Gi0/0\n ip address 10.0.12.1 255.255.255.252\n bandwidth 1000\n"),
            ("R2", "interface Gi0/0\n ip address 10.0.12.2 255.255.255.252\n mtu 9000\n"),
        ]);
        let topo = build_topology(&inv, &TopologySettings::default());

        assert_eq!(topo.links.len(), 1);
        let link = &topo.links[0];
        assert_eq!(link.devices(), ("R1", "R2"));
        assert_eq!(link.bandwidth_kbps, 1000);
        assert_eq!(link.a.mtu, 1500);
        assert_eq!(link.b.mtu, 9000);
        assert_eq!(link.subnet().unwrap().to_string(), "10.0.12.0/30");
    }

    #[test]
    fn test_shutdown_interfaces_excluded_by_default() {
        let dumps = [
            ("R1", "interface Gi0/0\n ip address 10.0.12.1 255.255.255.252\n shutdown\n"),
            ("R2", "interface Gi0/0\n ip address 10.0.12.2 255.255.255.252\n"),
        ];
        let inv = inventory(&dumps);
        assert!(build_topology(&inv, &TopologySettings::default()).links.is_empty());

        let settings = TopologySettings {
            include_shutdown_interfaces: true,
            ..TopologySettings::default()
        };
        assert_eq!(build_topology(&inv, &settings).links.len(), 1);
    }

    #[test]
    fn test_end_hosts_attach_to_switch_only() {
        let inv = inventory(&[
            ("R1", "interface Gi0/1\n ip address 192.168.1.1 255.255.255.0\n"),
            ("SW1", "interface Vlan1\n ip address 192.168.1.2 255.255.255.0\n"),
            ("PC1", "interface eth0\n ip address 192.168.1.10 255.255.255.0\n"),
            ("PC2", "interface eth0\n ip address 192.168.1.11 255.255.255.0\n"),
        ]);
        let topo = build_topology(&inv, &TopologySettings::default());

        let pairs: Vec<(&str, &str)> = topo.links.iter().map(|l| l.devices()).collect();
        assert_eq!(pairs, vec![("PC1", "SW1"), ("PC2", "SW1"), ("R1", "SW1")]);
    }

    #[test]
    fn test_end_host_links_to_router_without_switch() {
        let inv = inventory(&[
            ("R1", "interface Gi0/1\n ip address 192.168.5.1 255.255.255.0\n"),
            ("PC1", "interface eth0\n ip address 192.168.5.10 255.255.255.0\n"),
        ]);
        let topo = build_topology(&inv, &TopologySettings::default());
        assert_eq!(topo.links.len(), 1);
    }

    #[test]
    fn test_bgp_neighbor_merges_with_subnet_link() {
        let inv = inventory(&[
            (
                "R1",
                "interface Gi0/0\n ip address 10.0.12.1 255.255.255.252\nrouter bgp 65001\n neighbor 10.0.12.2 remote-as 65002\n",
            ),
            ("R2", "interface Gi0/0\n ip address 10.0.12.2 255.255.255.252\n"),
        ]);
        let topo = build_topology(&inv, &TopologySettings::default());
        assert_eq!(topo.links.len(), 1);
        assert_eq!(topo.links[0].evidence.len(), 2);
    }

    #[test]
    fn test_bgp_multihop_neighbor_creates_link() {
        let inv = inventory(&[
            (
                "R1",
                "interface Lo0\n ip address 1.1.1.1 255.255.255.255\nrouter bgp 65001\n neighbor 2.2.2.2 remote-as 65002\n",
            ),
            ("R2", "interface Lo0\n ip address 2.2.2.2 255.255.255.255\n"),
        ]);
        let topo = build_topology(&inv, &TopologySettings::default());
        assert_eq!(topo.links.len(), 1);
        let link = &topo.links[0];
        assert!(link.a.interface.is_none());
        assert_eq!(link.b.interface.as_deref(), Some("Lo0"));
        assert!(matches!(link.evidence[0], LinkEvidence::BgpNeighbor { .. }));
    }

    #[test]
    fn test_description_hint_link() {
        let inv = inventory(&[
            ("R1", "interface Serial0/0\n description WAN to R9\n"),
            ("R9", "interface Serial0/0\n"),
            ("R10", "interface Serial0/0\n"),
        ]);
        let topo = build_topology(&inv, &TopologySettings::default());
        assert_eq!(topo.links.len(), 1);
        assert_eq!(topo.links[0].devices(), ("R1", "R9"));

        let settings = TopologySettings {
            use_description_hints: false,
            ..TopologySettings::default()
        };
        assert!(build_topology(&inv, &settings).links.is_empty());
    }

    #[test]
    fn test_parallel_subnets_give_parallel_links() {
        let inv = inventory(&[
            (
                "R1",
                "interface Gi0/0\n ip address 10.0.1.1 255.255.255.252\ninterface Gi0/1\n ip address 10.0.2.1 255.255.255.252\n",
            ),
            (
                "R2",
                "interface Gi0/0\n ip address 10.0.1.2 255.255.255.252\ninterface Gi0/1\n ip address 10.0.2.2 255.255.255.252\n",
            ),
        ]);
        let topo = build_topology(&inv, &TopologySettings::default());
        assert_eq!(topo.links.len(), 2);
        assert_eq!(topo.links_between("R1", "R2").count(), 2);
    }

    #[test]
    fn test_static_route_next_hop_creates_link() {
        let inv = inventory(&[
            ("R1", "interface Gi0/0\n ip address 10.0.12.1 255.255.255.252\n"),
            (
                "R2",
                "interface Gi0/0\n ip address 10.0.12.6 255.255.255.252\nip route 0.0.0.0 0.0.0.0 10.0.12.1\n",
            ),
        ]);
        let topo = build_topology(&inv, &TopologySettings::default());

        assert_eq!(topo.links.len(), 1);
        let link = &topo.links[0];
        assert_eq!(link.devices(), ("R1", "R2"));
        assert_eq!(link.a.interface.as_deref(), Some("Gi0/0"));
        assert!(link.b.interface.is_none());
        assert!(matches!(
            link.evidence[0],
            LinkEvidence::StaticRouteNextHop { address } if address == Ipv4Addr::new(10, 0, 12, 1)
        ));
    }

    #[test]
    fn test_neighbor_statement_to_shutdown_interface_ignored() {
        let dumps = [
            ("R1", "interface Gi0/0\n ip address 10.0.12.1 255.255.255.252\n shutdown\n"),
            (
                "R2",
                "interface Gi0/0\n ip address 10.0.12.2 255.255.255.252\nip route 0.0.0.0 0.0.0.0 10.0.12.1\n",
            ),
        ];
        let inv = inventory(&dumps);
        assert!(build_topology(&inv, &TopologySettings::default()).links.is_empty());

        let settings = TopologySettings {
            include_shutdown_interfaces: true,
            ..TopologySettings::default()
        };
        let topo = build_topology(&inv, &settings);
        assert_eq!(topo.links.len(), 1);
        assert_eq!(topo.links[0].evidence.len(), 2);
    }

    #[test]
    fn test_neighbor_statement_from_shutdown_local_interface_ignored() {
        let inv = inventory(&[
            ("R1", "interface Gi0/0\n ip address 10.0.12.1 255.255.255.252\n"),
            (
                "R2",
                "interface Gi0/0\n ip address 10.0.12.2 255.255.255.252\n shutdown\nrouter bgp 65002\n neighbor 10.0.12.1 remote-as 65001\n",
            ),
        ]);
        assert!(build_topology(&inv, &TopologySettings::default()).links.is_empty());
    }

    #[test]
    fn test_unknown_devices_treated_as_end_hosts() {
        let dumps = [
            ("R1", "interface Gi0/0\n ip address 10.5.0.1 255.255.255.0\n"),
            ("edge", "interface eth0\n ip address 10.5.0.20 255.255.255.0\n"),
            ("box", "interface eth0\n ip address 10.5.0.30 255.255.255.0\n"),
        ];
        let inv = inventory(&dumps);
        assert_eq!(inv.get("box").unwrap().kind, DeviceKind::Unknown);
        let topo = build_topology(&inv, &TopologySettings::default());
        let pairs: Vec<(&str, &str)> = topo.links.iter().map(|l| l.devices()).collect();
        assert_eq!(pairs, vec![("R1", "box"), ("R1", "edge")]);

        let mut with_switch = dumps.to_vec();
        with_switch.push(("SW1", "interface Vlan5\n ip address 10.5.0.2 255.255.255.0\n"));
        let topo = build_topology(&inventory(&with_switch), &TopologySettings::default());
        let pairs: Vec<(&str, &str)> = topo.links.iter().map(|l| l.devices()).collect();
        assert_eq!(pairs, vec![("R1", "SW1"), ("SW1", "box"), ("SW1", "edge")]);
    }

    #[test]
    fn test_description_hint_is_case_insensitive() {
        let inv = inventory(&[
            ("CORE-R1", "interface Gi0/3\n description Uplink to dist-sw2 port 24\n"),
            ("DIST-SW2", "interface Gi0/24\n"),
            ("DIST-SW3", "interface Gi0/24\n"),
        ]);
        let topo = build_topology(&inv, &TopologySettings::default());

        assert_eq!(topo.links.len(), 1);
        let link = &topo.links[0];
        assert_eq!(link.devices(), ("CORE-R1", "DIST-SW2"));
        assert!(matches!(link.evidence[0], LinkEvidence::Description { .. }));
    }
}
