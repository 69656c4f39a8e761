//! Configuration dump ingestion.
//!
//! Reads per-device folders, flat `<hostname>_config.dump` files or a zip
//! archive holding either layout, and parses each dump into a [`Device`].

pub mod archive;
pub mod parser;
pub mod source;

use std::collections::btree_map::Entry;
use std::path::{Path, PathBuf};

use log::{info, warn};
use rayon::prelude::*;

use crate::model::{Device, Inventory};

pub use parser::parse_device;
pub use source::{discover_sources, Discovered, DumpOrigin, RawDump};

/// File name expected inside a per-device folder
pub const DEVICE_DUMP_FILE: &str = "config.dump";
/// Suffix of flat per-device dump files
pub const FLAT_DUMP_SUFFIX: &str = "_config.dump";

/// Errors that can occur while ingesting configuration dumps
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("Configuration path not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("No device configurations found in {}", .0.display())]
    NoDevices(PathBuf),

    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read archive {}: {message}", .path.display())]
    Archive { path: PathBuf, message: String },

    #[error("Duplicate hostname '{hostname}' in {first} and {second}")]
    DuplicateHostname {
        hostname: String,
        first: String,
        second: String,
    },
}

/// Discover and parse every dump under `path`
pub fn ingest(path: &Path) -> Result<Inventory, IngestError> {
    let discovered = discover_sources(path)?;
    let (dumps, mut warnings) = (discovered.dumps, discovered.warnings);
    if dumps.is_empty() {
        return Err(IngestError::NoDevices(path.to_path_buf()));
    }

    info!("Parsing {} configuration dumps", dumps.len());

    let parsed: Vec<Device> = dumps
        .par_iter()
        .map(|dump| parse_device(&dump.source_name, &dump.text))
        .collect();

    let mut inventory = Inventory::default();
    for device in parsed {
        match inventory.devices.entry(device.hostname.clone()) {
            Entry::Occupied(existing) => {
                return Err(IngestError::DuplicateHostname {
                    hostname: device.hostname.clone(),
                    first: existing.get().source_name.clone(),
                    second: device.source_name,
                });
            }
            Entry::Vacant(slot) => {
                slot.insert(device);
            }
        }
    }

    for device in inventory.devices.values() {
        if device.interfaces.is_empty() {
            let msg = format!("Device {} has no interfaces", device.hostname);
            warn!("{}", msg);
            warnings.push(msg);
        }
    }
    inventory.warnings = warnings;

    info!("Parsed {} devices", inventory.len());
    Ok(inventory)
}
