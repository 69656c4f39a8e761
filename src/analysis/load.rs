//! Per-link load estimation and load-balancing recommendations.

use std::collections::BTreeMap;

use log::{info, warn};

use crate::model::DeviceKind;
use crate::settings::TrafficSettings;
use crate::topology::{Link, Topology};

use super::types::{LinkLoad, LinkStatus, LoadRecommendation, LoadReport, OverloadedLink};

/// Estimated demand on a link from the roles of its two ends.
pub fn estimate_demand(topology: &Topology, link: &Link, traffic: &TrafficSettings) -> u64 {
    let (a, b) = link.devices();
    let mut demand = traffic.base_demand_kbps;
    if topology.kind_of(a) == DeviceKind::Router || topology.kind_of(b) == DeviceKind::Router {
        demand += traffic.router_demand_kbps;
    }
    if topology.hierarchy.is_core(a) || topology.hierarchy.is_core(b) {
        demand += traffic.core_demand_kbps;
    }
    demand
}

/// Analyze every link of the topology against its estimated demand.
///
/// The topology's hierarchy decides which devices count as core.
pub fn analyze_load(topology: &Topology, traffic: &TrafficSettings) -> LoadReport {
    info!("Analyzing traffic load...");

    let mut report = LoadReport::default();
    let mut seen: BTreeMap<String, usize> = BTreeMap::new();

    for link in &topology.links {
        let base_id = link.id();
        let count = seen.entry(base_id.clone()).or_insert(0);
        *count += 1;
        let id = if *count == 1 {
            base_id
        } else {
            format!("{}#{}", base_id, count)
        };

        let demand = estimate_demand(topology, link, traffic);
        let utilization = demand as f64 / link.bandwidth_kbps as f64;
        let overloaded = utilization > traffic.overload_threshold;

        if overloaded {
            let (a, b) = link.devices();
            report.overloaded_links.push(OverloadedLink {
                link: id.clone(),
                endpoints: (a.to_string(), b.to_string()),
                utilization,
                bandwidth_kbps: link.bandwidth_kbps,
                demand_kbps: demand,
            });
        }
        report.link_analysis.insert(
            id,
            LinkLoad {
                bandwidth_kbps: link.bandwidth_kbps,
                demand_kbps: demand,
                utilization,
                status: if overloaded {
                    LinkStatus::Overloaded
                } else {
                    LinkStatus::Normal
                },
            },
        );
    }

    report.recommendations = recommend(topology, &report.overloaded_links, traffic);

    if !report.overloaded_links.is_empty() {
        warn!("{} overloaded links detected", report.overloaded_links.len());
    }
    info!(
        "Load analysis complete: {} links, {} recommendations",
        report.link_analysis.len(),
        report.recommendations.len()
    );
    report
}

fn recommend(
    topology: &Topology,
    overloaded: &[OverloadedLink],
    traffic: &TrafficSettings,
) -> Vec<LoadRecommendation> {
    let mut recommendations = Vec::new();

    for link in overloaded {
        let (a, b) = (&link.endpoints.0, &link.endpoints.1);
        let parallel_links = topology.links_between(a, b).count();
        let alternative_paths: Vec<Vec<String>> = topology
            .alternative_paths(a, b, traffic.alternative_paths)
            .into_iter()
            .skip(1)
            .collect();

        if parallel_links > 1 || !alternative_paths.is_empty() {
            recommendations.push(LoadRecommendation::LoadBalancing {
                overloaded_link: link.link.clone(),
                utilization: link.utilization,
                parallel_links,
                alternative_paths,
                suggested_action: "Implement ECMP (Equal Cost Multi-Path) routing".to_string(),
            });
        } else {
            recommendations.push(LoadRecommendation::CapacityUpgrade {
                overloaded_link: link.link.clone(),
                utilization: link.utilization,
                current_bandwidth_kbps: link.bandwidth_kbps,
                suggested_bandwidth_kbps: (link.demand_kbps as f64 * traffic.upgrade_factor) as u64,
                suggested_action: "Increase link bandwidth or add parallel links".to_string(),
            });
        }
    }

    if !overloaded.is_empty() {
        recommendations.push(LoadRecommendation::Qos {
            suggested_action: "Prioritize critical traffic and limit non-essential traffic"
                .to_string(),
            priority_classes: vec![
                "High: Database and critical applications".to_string(),
                "Medium: Web traffic and user applications".to_string(),
                "Low: Backup and maintenance traffic".to_string(),
            ],
        });
    }
    recommendations
}
