//! # cisco-topology - topology analysis for Cisco configuration dumps
//!
//! This library reads Cisco device configuration dumps, infers the network
//! topology between the devices and analyses it.
//!
//! ## Overview
//!
//! An analysis run reads a directory of per-device folders, a directory of
//! `<hostname>_config.dump` files or a zip archive holding either layout.
//! Every dump becomes a `Device`; links are inferred from shared subnets,
//! BGP neighbour and static route statements, and interface descriptions.
//!
//! ## Architecture
//!
//! - `ingest`: input discovery (folders, flat files, zip) and dump parsing
//! - `model`: devices, interfaces, routing statements and the inventory
//! - `topology`: link inference, hierarchy tiers and graph queries
//! - `analysis`: configuration validation, load estimates and reports
//! - `render`: Graphviz DOT output
//! - `simulation`: tick-based neighbour discovery and routing exchange
//! - `settings`: optional YAML settings file
//! - `utils`: IPv4 helpers
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use cisco_topology::{analysis, ingest, settings::Settings, topology};
//! use std::path::Path;
//!
//! let settings = Settings::default();
//! let inventory = ingest::ingest(Path::new("configs"))?;
//! let topo = topology::build_topology(&inventory, &settings.topology);
//! let report = analysis::validate(&inventory, &topo, &settings);
//! println!("{} issues", report.total_issues);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod analysis;
pub mod ingest;
pub mod model;
pub mod render;
pub mod settings;
pub mod simulation;
pub mod topology;
pub mod utils;

pub use model::{Device, DeviceKind, Interface, Inventory};
pub use settings::Settings;
