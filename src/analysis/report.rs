//! Report generation for topology analysis runs.
//!
//! Generates both JSON files and human-readable text summaries.

use std::fs;
use std::path::Path;

use color_eyre::eyre::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::topology::{NetworkInfo, Topology};

use super::types::{LoadRecommendation, LoadReport, ValidationReport};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub analysis_timestamp: String,
    pub config_path: String,
    pub total_devices: usize,
    pub total_links: usize,
}

/// Contents of `topology.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologyReport {
    pub metadata: ReportMetadata,
    pub summary: NetworkInfo,
    pub topology: Topology,
}

impl TopologyReport {
    pub fn new(config_path: &Path, topology: &Topology) -> Self {
        Self {
            metadata: ReportMetadata {
                analysis_timestamp: chrono::Utc::now().to_rfc3339(),
                config_path: config_path.display().to_string(),
                total_devices: topology.nodes.len(),
                total_links: topology.links.len(),
            },
            summary: topology.network_info(),
            topology: topology.clone(),
        }
    }
}

/// Write any report as pretty-printed JSON
pub fn write_json_report<T: Serialize + ?Sized>(report: &T, output_path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("Failed to serialize report to JSON")?;

    fs::write(output_path, json)
        .with_context(|| format!("Failed to write JSON report to {}", output_path.display()))?;

    log::info!("JSON report written to {}", output_path.display());
    Ok(())
}

fn banner(lines: &mut Vec<String>, title: &str) {
    lines.push("=".repeat(60));
    lines.push(format!("{:^60}", title));
    lines.push("=".repeat(60));
}

pub fn format_network_summary(info: &NetworkInfo) -> String {
    let mut lines: Vec<String> = Vec::new();
    banner(&mut lines, "NETWORK TOPOLOGY");
    lines.push(format!("Devices:     {}", info.nodes));
    lines.push(format!("Links:       {} ({} adjacent pairs)", info.links, info.edges));
    lines.push(format!("Density:     {:.3}", info.density));
    lines.push(format!(
        "Connected:   {} ({} component{})",
        if info.is_connected { "yes" } else { "no" },
        info.components,
        if info.components == 1 { "" } else { "s" }
    ));
    match info.diameter {
        Some(d) => lines.push(format!("Diameter:    {}", d)),
        None => lines.push("Diameter:    n/a".to_string()),
    }
    lines.push(String::new());
    lines.push(format!("Core:         {}", info.hierarchy.core.join(", ")));
    lines.push(format!("Distribution: {}", info.hierarchy.distribution.join(", ")));
    lines.push(format!("Access:       {}", info.hierarchy.access.join(", ")));
    lines.join("\n")
}

pub fn format_validation_summary(report: &ValidationReport) -> String {
    let mut lines: Vec<String> = Vec::new();
    banner(&mut lines, "CONFIGURATION VALIDATION");
    lines.push(format!(
        "{} issues, {} warnings",
        report.total_issues, report.total_warnings
    ));

    for (label, findings) in [("Issues", &report.issues), ("Warnings", &report.warnings)] {
        if findings.is_empty() {
            continue;
        }
        lines.push(String::new());
        lines.push(format!("{}:", label));
        for finding in findings {
            lines.push(format!("  [{}] {}", finding.severity, finding.description));
            lines.push(format!("         -> {}", finding.recommendation));
        }
    }
    lines.join("\n")
}

pub fn format_load_summary(report: &LoadReport) -> String {
    let mut lines: Vec<String> = Vec::new();
    banner(&mut lines, "LOAD ANALYSIS");
    lines.push(format!(
        "{} links analyzed, {} overloaded",
        report.link_analysis.len(),
        report.overloaded_links.len()
    ));

    for link in &report.overloaded_links {
        lines.push(format!(
            "  {}: {:.0}% ({} / {} kbps)",
            link.link,
            link.utilization * 100.0,
            link.demand_kbps,
            link.bandwidth_kbps
        ));
    }

    if !report.recommendations.is_empty() {
        lines.push(String::new());
        lines.push("Recommendations:".to_string());
        for rec in &report.recommendations {
            match rec {
                LoadRecommendation::LoadBalancing {
                    overloaded_link,
                    alternative_paths,
                    ..
                } => lines.push(format!(
                    "  [{}] {}: {} ({} alternative paths)",
                    rec.label(),
                    overloaded_link,
                    rec.suggested_action(),
                    alternative_paths.len()
                )),
                LoadRecommendation::CapacityUpgrade {
                    overloaded_link,
                    suggested_bandwidth_kbps,
                    ..
                } => lines.push(format!(
                    "  [{}] {}: {} (suggest {} kbps)",
                    rec.label(),
                    overloaded_link,
                    rec.suggested_action(),
                    suggested_bandwidth_kbps
                )),
                LoadRecommendation::Qos { .. } => {
                    lines.push(format!("  [{}] {}", rec.label(), rec.suggested_action()))
                }
            }
        }
    }
    lines.join("\n")
}
