//! Configuration validation checks.
//!
//! Each check appends findings to either the issue list (configuration
//! errors) or the warning list (risks and optimisation hints).

use std::collections::{BTreeMap, BTreeSet};
use std::net::Ipv4Addr;

use log::{debug, info};

use crate::model::{DeviceKind, Inventory};
use crate::settings::Settings;
use crate::topology::Topology;
use crate::utils::ip_utils::is_conventional_gateway;

use super::types::{Finding, FindingKind, Severity, ValidationReport};

/// Collects findings while the checks run
#[derive(Default)]
struct Checks {
    issues: Vec<Finding>,
    warnings: Vec<Finding>,
}

impl Checks {
    fn issue(
        &mut self,
        kind: FindingKind,
        severity: Severity,
        description: String,
        affected: Vec<String>,
        recommendation: String,
    ) {
        self.issues.push(Finding {
            kind,
            severity,
            description,
            affected_devices: affected,
            recommendation,
        });
    }

    fn warn(
        &mut self,
        kind: FindingKind,
        severity: Severity,
        description: String,
        affected: Vec<String>,
        recommendation: String,
    ) {
        self.warnings.push(Finding {
            kind,
            severity,
            description,
            affected_devices: affected,
            recommendation,
        });
    }
}

/// Run every validation check against an inventory and its topology.
pub fn validate(inventory: &Inventory, topology: &Topology, settings: &Settings) -> ValidationReport {
    info!("Starting configuration validation...");

    let mut checks = Checks::default();
    check_duplicate_ips(inventory, &mut checks);
    check_vlan_consistency(inventory, &mut checks);
    check_mtu_mismatches(topology, &mut checks);
    check_subnet_masks(inventory, &mut checks);
    check_missing_components(inventory, &mut checks);
    check_gateways(inventory, &mut checks);
    check_loops(topology, settings.validation.max_reported_loops, &mut checks);
    check_isolated(topology, &mut checks);
    suggest_protocol_optimization(inventory, settings, &mut checks);
    suggest_node_aggregation(topology, &mut checks);

    let report = ValidationReport {
        total_issues: checks.issues.len(),
        total_warnings: checks.warnings.len(),
        issues: checks.issues,
        warnings: checks.warnings,
    };
    info!(
        "Validation complete: {} issues, {} warnings found",
        report.total_issues, report.total_warnings
    );
    report
}

fn check_duplicate_ips(inventory: &Inventory, checks: &mut Checks) {
    let mut seen: BTreeMap<(Ipv4Addr, Option<u16>), Vec<String>> = BTreeMap::new();
    for (device, iface) in inventory.addressed_interfaces() {
        if let Some(ip) = iface.ip() {
            seen.entry((ip, iface.access_vlan))
                .or_default()
                .push(format!("{}:{}", device.hostname, iface.name));
        }
    }

    for ((ip, vlan), owners) in seen {
        if owners.len() < 2 {
            continue;
        }
        let vlan = vlan.map_or_else(|| "default".to_string(), |v| v.to_string());
        let devices: BTreeSet<String> = owners
            .iter()
            .filter_map(|o| o.split(':').next())
            .map(str::to_string)
            .collect();
        checks.issue(
            FindingKind::DuplicateIp,
            Severity::High,
            format!("Duplicate IP {} in VLAN {} on {}", ip, vlan, owners.join(", ")),
            devices.into_iter().collect(),
            "Assign unique IP addresses to each interface".to_string(),
        );
    }
}

fn check_vlan_consistency(inventory: &Inventory, checks: &mut Checks) {
    let mut names: BTreeMap<u16, BTreeMap<String, Vec<String>>> = BTreeMap::new();
    for device in inventory.devices.values() {
        for vlan in device.vlans.values() {
            if let Some(name) = &vlan.name {
                names
                    .entry(vlan.id)
                    .or_default()
                    .entry(name.clone())
                    .or_default()
                    .push(device.hostname.clone());
            }
        }
    }

    for (id, variants) in names {
        if variants.len() < 2 {
            continue;
        }
        let listed: Vec<String> = variants.keys().cloned().collect();
        let devices: BTreeSet<String> = variants.into_values().flatten().collect();
        checks.issue(
            FindingKind::VlanInconsistency,
            Severity::Medium,
            format!("VLAN {} has inconsistent names: {:?}", id, listed),
            devices.into_iter().collect(),
            format!("Use consistent name for VLAN {}", id),
        );
    }
}

fn check_mtu_mismatches(topology: &Topology, checks: &mut Checks) {
    for link in &topology.links {
        if link.a.mtu == link.b.mtu {
            continue;
        }
        checks.warn(
            FindingKind::MtuMismatch,
            Severity::Medium,
            format!(
                "MTU mismatch between {} ({}) and {} ({})",
                link.a.device, link.a.mtu, link.b.device, link.b.mtu
            ),
            vec![link.a.device.clone(), link.b.device.clone()],
            format!(
                "Set consistent MTU value (recommend {})",
                link.a.mtu.max(link.b.mtu)
            ),
        );
    }
}

/// Interfaces that see each other as on-link but disagree on the prefix
fn check_subnet_masks(inventory: &Inventory, checks: &mut Checks) {
    let addressed: Vec<_> = inventory
        .addressed_interfaces()
        .filter_map(|(d, i)| i.address.map(|a| (d, i, a)))
        .collect();

    for (n, (dx, ix, ax)) in addressed.iter().enumerate() {
        for (dy, iy, ay) in &addressed[n + 1..] {
            if dx.hostname == dy.hostname || ax.prefix() == ay.prefix() {
                continue;
            }
            if !(ax.contains(ay.ip()) && ay.contains(ax.ip())) {
                continue;
            }
            checks.warn(
                FindingKind::SubnetMaskMismatch,
                Severity::Medium,
                format!(
                    "Subnet mask mismatch: {} {} uses {} but {} {} uses {}",
                    dx.hostname, ix.name, ax, dy.hostname, iy.name, ay
                ),
                vec![dx.hostname.clone(), dy.hostname.clone()],
                format!(
                    "Use the same prefix length on both sides (/{} or /{})",
                    ax.prefix(),
                    ay.prefix()
                ),
            );
        }
    }
}

fn check_missing_components(inventory: &Inventory, checks: &mut Checks) {
    if inventory.is_empty() {
        return;
    }
    let has = |kind: DeviceKind| inventory.devices.values().any(|d| d.kind == kind);

    if !has(DeviceKind::Router) {
        checks.warn(
            FindingKind::MissingComponent,
            Severity::Medium,
            "No routers found in configuration".to_string(),
            Vec::new(),
            "Ensure router configurations are included".to_string(),
        );
    }
    if !has(DeviceKind::Switch) {
        checks.warn(
            FindingKind::MissingComponent,
            Severity::Low,
            "No switches found in configuration".to_string(),
            Vec::new(),
            "Consider adding switch configurations for complete topology".to_string(),
        );
    }
}

fn check_gateways(inventory: &Inventory, checks: &mut Checks) {
    for device in inventory.devices.values() {
        if device.kind != DeviceKind::Router {
            continue;
        }
        let has_gateway = device
            .addressed_interfaces()
            .filter_map(|i| i.ip())
            .any(is_conventional_gateway);
        if !has_gateway {
            checks.warn(
                FindingKind::GatewayConfig,
                Severity::Low,
                format!(
                    "Router {} may not have gateway interface configured",
                    device.hostname
                ),
                vec![device.hostname.clone()],
                "Verify gateway configuration on router interfaces".to_string(),
            );
        }
    }
}

fn check_loops(topology: &Topology, max_reported: usize, checks: &mut Checks) {
    let cycles = topology.cycle_basis();
    if cycles.len() > max_reported {
        debug!(
            "{} cycles found, reporting the first {}",
            cycles.len(),
            max_reported
        );
    }
    for cycle in cycles.into_iter().take(max_reported) {
        let mut walk = cycle.clone();
        if let Some(first) = cycle.first() {
            walk.push(first.clone());
        }
        checks.warn(
            FindingKind::NetworkLoop,
            Severity::Medium,
            format!("Potential network loop detected: {}", walk.join(" -> ")),
            cycle,
            "Implement STP or remove redundant connections".to_string(),
        );
    }
}

fn check_isolated(topology: &Topology, checks: &mut Checks) {
    for name in topology.nodes.keys() {
        if topology.degree(name) == 0 {
            checks.warn(
                FindingKind::IsolatedDevice,
                Severity::Low,
                format!("Device {} has no inferred links", name),
                vec![name.clone()],
                "Check interface addressing and descriptions on this device".to_string(),
            );
        }
    }
}

fn suggest_protocol_optimization(inventory: &Inventory, settings: &Settings, checks: &mut Checks) {
    let total = inventory.len();
    let bgp_devices = inventory
        .devices
        .values()
        .filter(|d| d.runs_protocol("bgp"))
        .count();

    if total > settings.validation.large_network_devices && bgp_devices == 0 {
        checks.warn(
            FindingKind::ProtocolOptimization,
            Severity::Low,
            "Large network detected without BGP".to_string(),
            Vec::new(),
            "Consider implementing BGP for better scalability".to_string(),
        );
    }
    if total > 0 && total <= settings.validation.small_network_devices && bgp_devices > 0 {
        checks.warn(
            FindingKind::ProtocolOptimization,
            Severity::Low,
            "BGP may be overkill for small network".to_string(),
            Vec::new(),
            "OSPF might be more appropriate for this network size".to_string(),
        );
    }
}

fn suggest_node_aggregation(topology: &Topology, checks: &mut Checks) {
    for name in topology.nodes.keys() {
        if topology.kind_of(name) != DeviceKind::Switch {
            continue;
        }
        let neighbors = topology.neighbors(name);
        if let [peer] = neighbors.as_slice() {
            if topology.kind_of(peer) == DeviceKind::Switch {
                checks.warn(
                    FindingKind::NodeAggregation,
                    Severity::Low,
                    format!("Switches {} and {} could be aggregated", name, peer),
                    vec![name.clone(), peer.to_string()],
                    format!("Consider combining {} and {} into single switch", name, peer),
                );
            }
        }
    }
}
