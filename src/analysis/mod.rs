//! Configuration validation and traffic load analysis.
//!
//! This module checks parsed devices and their inferred topology for
//! configuration problems, estimates per-link load and writes reports.

pub mod load;
pub mod report;
pub mod types;
pub mod validator;

pub use load::{analyze_load, estimate_demand};
pub use report::{
    format_load_summary, format_network_summary, format_validation_summary, write_json_report,
    ReportMetadata, TopologyReport,
};
pub use types::*;
pub use validator::validate;
