//! Input layout detection.
//!
//! Supported layouts:
//! - `<dir>/<device>/config.dump`
//! - `<dir>/<hostname>_config.dump`
//! - a `.zip` archive containing either of the above

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use serde::Serialize;

use super::{archive, IngestError, DEVICE_DUMP_FILE, FLAT_DUMP_SUFFIX};

/// Where a dump was found
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DumpOrigin {
    DeviceFolder(PathBuf),
    FlatFile(PathBuf),
    ArchiveEntry { archive: PathBuf, entry: String },
}

/// Raw text of one device dump before parsing
#[derive(Debug, Clone)]
pub struct RawDump {
    /// Fallback device name: folder name or `<hostname>` file prefix
    pub source_name: String,
    pub origin: DumpOrigin,
    pub text: String,
}

/// Result of scanning an input location
#[derive(Debug, Default)]
pub struct Discovered {
    pub dumps: Vec<RawDump>,
    pub warnings: Vec<String>,
}

/// Detect the layout at `path` and collect every dump, sorted by source name
pub fn discover_sources(path: &Path) -> Result<Discovered, IngestError> {
    if !path.exists() {
        return Err(IngestError::NotFound(path.to_path_buf()));
    }

    let mut discovered = if path.is_file() {
        if is_zip(path) {
            archive::read_archive(path)?
        } else if let Some(name) = flat_dump_name(path) {
            Discovered {
                dumps: vec![RawDump {
                    source_name: name,
                    origin: DumpOrigin::FlatFile(path.to_path_buf()),
                    text: read_text(path)?,
                }],
                warnings: Vec::new(),
            }
        } else {
            return Err(IngestError::NoDevices(path.to_path_buf()));
        }
    } else {
        scan_directory(path)?
    };

    discovered.dumps.sort_by(|a, b| a.source_name.cmp(&b.source_name));
    Ok(discovered)
}

fn scan_directory(dir: &Path) -> Result<Discovered, IngestError> {
    let mut discovered = Discovered::default();

    let entries = fs::read_dir(dir).map_err(|source| IngestError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    for entry in entries {
        let entry = entry.map_err(|source| IngestError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let entry_path = entry.path();
        let file_name = entry.file_name().to_string_lossy().to_string();

        if entry_path.is_dir() {
            let dump_path = entry_path.join(DEVICE_DUMP_FILE);
            if dump_path.is_file() {
                discovered.dumps.push(RawDump {
                    source_name: file_name,
                    origin: DumpOrigin::DeviceFolder(entry_path.clone()),
                    text: read_text(&dump_path)?,
                });
            } else {
                let msg = format!("Missing {} for device folder: {}", DEVICE_DUMP_FILE, file_name);
                warn!("{}", msg);
                discovered.warnings.push(msg);
            }
        } else if let Some(name) = flat_dump_name(&entry_path) {
            discovered.dumps.push(RawDump {
                source_name: name,
                origin: DumpOrigin::FlatFile(entry_path.clone()),
                text: read_text(&entry_path)?,
            });
        } else if is_zip(&entry_path) {
            let nested = archive::read_archive(&entry_path)?;
            discovered.dumps.extend(nested.dumps);
            discovered.warnings.extend(nested.warnings);
        } else {
            debug!("Ignoring {}", entry_path.display());
        }
    }

    Ok(discovered)
}

/// `R1_config.dump` -> `R1`
pub(crate) fn flat_dump_name(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    let prefix = name.strip_suffix(FLAT_DUMP_SUFFIX)?;
    if prefix.is_empty() {
        None
    } else {
        Some(prefix.to_string())
    }
}

fn is_zip(path: &Path) -> bool {
    path.extension()
        .map_or(false, |ext| ext.eq_ignore_ascii_case("zip"))
}

fn read_text(path: &Path) -> Result<String, IngestError> {
    let bytes = fs::read(path).map_err(|source| IngestError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
