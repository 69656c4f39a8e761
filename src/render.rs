//! Graphviz DOT rendering of an inferred topology.
//!
//! Render the output with Graphviz:
//!   dot -Tpng network_topology.dot -o topology.png

use crate::model::DeviceKind;
use crate::topology::{Link, Tier, Topology};

fn fill_color(kind: DeviceKind) -> &'static str {
    match kind {
        DeviceKind::Router => "#ffcdd2",
        DeviceKind::Switch => "#bbdefb",
        DeviceKind::Host => "#c8e6c9",
        DeviceKind::Server => "#fff9c4",
        DeviceKind::Unknown => "#e0e0e0",
    }
}

fn shape(kind: DeviceKind) -> &'static str {
    match kind {
        DeviceKind::Router => "ellipse",
        DeviceKind::Switch => "box",
        DeviceKind::Host | DeviceKind::Server => "component",
        DeviceKind::Unknown => "plaintext",
    }
}

/// Escape a string for use inside a double-quoted DOT label
fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

fn bandwidth_label(kbps: u64) -> String {
    if kbps >= 1_000_000 && kbps % 1_000_000 == 0 {
        format!("{}G", kbps / 1_000_000)
    } else if kbps >= 1_000 && kbps % 1_000 == 0 {
        format!("{}M", kbps / 1_000)
    } else {
        format!("{}k", kbps)
    }
}

fn edge_label(link: &Link) -> String {
    let side = |iface: &Option<String>| iface.as_deref().map(escape).unwrap_or_else(|| "?".to_string());
    format!(
        "{} - {}\\n{}",
        side(&link.a.interface),
        side(&link.b.interface),
        bandwidth_label(link.bandwidth_kbps)
    )
}

/// Render a topology as an undirected Graphviz graph.
///
/// Devices are grouped into one cluster per hierarchy tier. Links inferred
/// only from neighbour statements or descriptions are drawn dashed.
pub fn render_dot(topology: &Topology) -> String {
    let mut out = String::with_capacity(2048);
    out.push_str("graph network {\n");
    out.push_str("    layout=dot;\n");
    out.push_str("    rankdir=TB;\n");
    out.push_str("    fontname=\"Helvetica\";\n");
    out.push_str("    node [fontname=\"Helvetica\", fontsize=10, style=filled];\n");
    out.push_str("    edge [fontname=\"Helvetica\", fontsize=8];\n\n");

    let tiers = [
        (Tier::Core, "Core", &topology.hierarchy.core),
        (Tier::Distribution, "Distribution", &topology.hierarchy.distribution),
        (Tier::Access, "Access", &topology.hierarchy.access),
    ];
    for (tier, label, members) in tiers {
        if members.is_empty() {
            continue;
        }
        out.push_str(&format!("    subgraph cluster_{} {{\n", tier));
        out.push_str(&format!("        label=\"{}\";\n", label));
        out.push_str("        style=dashed;\n");
        out.push_str("        color=\"#666666\";\n");
        for name in members {
            let kind = topology.kind_of(name);
            out.push_str(&format!(
                "        \"{}\" [label=\"{}\\n({})\", shape={}, fillcolor=\"{}\"];\n",
                escape(name),
                escape(name),
                kind,
                shape(kind),
                fill_color(kind),
            ));
        }
        out.push_str("    }\n\n");
    }

    // Devices missing from the hierarchy still get a node
    for (name, node) in &topology.nodes {
        if topology.hierarchy.tier_of(name).is_none() {
            out.push_str(&format!(
                "    \"{}\" [label=\"{}\\n({})\", shape={}, fillcolor=\"{}\"];\n",
                escape(name),
                escape(name),
                node.kind,
                shape(node.kind),
                fill_color(node.kind),
            ));
        }
    }

    for link in &topology.links {
        let style = if link.is_inferred_from_subnet() {
            "solid"
        } else {
            "dashed"
        };
        out.push_str(&format!(
            "    \"{}\" -- \"{}\" [label=\"{}\", style={}];\n",
            escape(&link.a.device),
            escape(&link.b.device),
            edge_label(link),
            style,
        ));
    }

    out.push_str("}\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::parse_device;
    use crate::model::Inventory;
    use crate::settings::TopologySettings;
    use crate::topology::build_topology;

    fn sample() -> Topology {
        let mut inventory = Inventory::default();
        for (name, text) in [
            (
                "R1",
                "hostname R1\ninterface Gi0/0\n ip address 10.0.12.1 255.255.255.252\n bandwidth 1000000\n",
            ),
            (
                "R2",
                "hostname R2\ninterface Gi0/0\n ip address 10.0.12.2 255.255.255.252\n bandwidth 1000000\ninterface Gi0/1\n description uplink to R3\n",
            ),
            ("R3", "hostname R3\ninterface Gi0/0\n"),
        ] {
            let device = parse_device(name, text);
            inventory.devices.insert(device.hostname.clone(), device);
        }
        build_topology(&inventory, &TopologySettings::default())
    }

    #[test]
    fn test_dot_structure() {
        let dot = render_dot(&sample());
        assert!(dot.starts_with("graph network {"));
        assert!(dot.trim_end().ends_with('}'));
        assert!(dot.contains("subgraph cluster_core"));
        assert!(dot.contains("\"R1\" -- \"R2\" [label=\"Gi0/0 - Gi0/0\\n1G\", style=solid]"));
    }

    #[test]
    fn test_description_link_is_dashed() {
        let dot = render_dot(&sample());
        assert!(dot.contains("\"R2\" -- \"R3\""));
        assert!(dot.contains("style=dashed]"));
    }

    #[test]
    fn test_escape_and_bandwidth_labels() {
        assert_eq!(escape("a\"b"), "a\\\"b");
        assert_eq!(bandwidth_label(100_000), "100M");
        assert_eq!(bandwidth_label(10_000_000), "10G");
        assert_eq!(bandwidth_label(1544), "1544k");
    }
}
