//! Network topology module.
//!
//! This module infers links between parsed devices, classifies devices into
//! hierarchy tiers and answers graph queries (paths, components, cycles).

pub mod builder;
pub mod graph;
pub mod hierarchy;
pub mod types;

// Re-export key types and functions for easier access
pub use builder::build_topology;
pub use graph::NetworkInfo;
pub use hierarchy::compute_hierarchy;
pub use types::{DeviceNode, Hierarchy, Link, LinkEndpoint, LinkEvidence, Tier, Topology};
