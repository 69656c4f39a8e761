//! Core data types for configuration validation and load analysis.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    High,
    Medium,
    Low,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::High => write!(f, "HIGH"),
            Severity::Medium => write!(f, "MEDIUM"),
            Severity::Low => write!(f, "LOW"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    DuplicateIp,
    VlanInconsistency,
    MtuMismatch,
    SubnetMaskMismatch,
    MissingComponent,
    GatewayConfig,
    NetworkLoop,
    IsolatedDevice,
    ProtocolOptimization,
    NodeAggregation,
}

/// A single validation result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub kind: FindingKind,
    pub severity: Severity,
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub affected_devices: Vec<String>,
    pub recommendation: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationReport {
    pub issues: Vec<Finding>,
    pub warnings: Vec<Finding>,
    pub total_issues: usize,
    pub total_warnings: usize,
}

impl ValidationReport {
    pub fn all(&self) -> impl Iterator<Item = &Finding> {
        self.issues.iter().chain(self.warnings.iter())
    }

    pub fn count_of(&self, kind: FindingKind) -> usize {
        self.all().filter(|f| f.kind == kind).count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkStatus {
    Normal,
    Overloaded,
}

/// Estimated load on one link
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkLoad {
    pub bandwidth_kbps: u64,
    pub demand_kbps: u64,
    pub utilization: f64,
    pub status: LinkStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverloadedLink {
    pub link: String,
    pub endpoints: (String, String),
    pub utilization: f64,
    pub bandwidth_kbps: u64,
    pub demand_kbps: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LoadRecommendation {
    LoadBalancing {
        overloaded_link: String,
        utilization: f64,
        parallel_links: usize,
        /// Alternative device paths, excluding the direct one
        alternative_paths: Vec<Vec<String>>,
        suggested_action: String,
    },
    CapacityUpgrade {
        overloaded_link: String,
        utilization: f64,
        current_bandwidth_kbps: u64,
        suggested_bandwidth_kbps: u64,
        suggested_action: String,
    },
    Qos {
        suggested_action: String,
        priority_classes: Vec<String>,
    },
}

impl LoadRecommendation {
    pub fn label(&self) -> &'static str {
        match self {
            LoadRecommendation::LoadBalancing { .. } => "LOAD_BALANCING",
            LoadRecommendation::CapacityUpgrade { .. } => "CAPACITY_UPGRADE",
            LoadRecommendation::Qos { .. } => "QOS",
        }
    }

    pub fn suggested_action(&self) -> &str {
        match self {
            LoadRecommendation::LoadBalancing { suggested_action, .. }
            | LoadRecommendation::CapacityUpgrade { suggested_action, .. }
            | LoadRecommendation::Qos { suggested_action, .. } => suggested_action,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoadReport {
    /// Keyed by link id (`A-B`, suffixed `#n` for parallel links)
    pub link_analysis: BTreeMap<String, LinkLoad>,
    pub overloaded_links: Vec<OverloadedLink>,
    pub recommendations: Vec<LoadRecommendation>,
}
