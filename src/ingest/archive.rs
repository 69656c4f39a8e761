//! Zip archive ingestion.
//!
//! The archive is read in memory; nothing is extracted to disk. Entries may
//! sit at any depth, so `dumps/R1/config.dump` and `R1/config.dump` both
//! resolve to device `R1`.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Component, Path};

use log::{debug, info, warn};
use zip::ZipArchive;

use super::source::{flat_dump_name, Discovered, DumpOrigin, RawDump};
use super::{IngestError, DEVICE_DUMP_FILE};

/// Read every device dump contained in a zip archive
pub fn read_archive(path: &Path) -> Result<Discovered, IngestError> {
    info!("Reading configuration archive: {}", path.display());

    let file = File::open(path).map_err(|source| IngestError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut archive = ZipArchive::new(BufReader::new(file)).map_err(|e| IngestError::Archive {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let mut discovered = Discovered::default();

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).map_err(|e| IngestError::Archive {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        if entry.is_dir() {
            continue;
        }

        // Entries with absolute paths or `..` components are skipped
        let Some(entry_path) = entry.enclosed_name() else {
            let msg = format!("Skipping unsafe archive entry: {}", entry.name());
            warn!("{}", msg);
            discovered.warnings.push(msg);
            continue;
        };

        let Some(source_name) = archive_dump_name(&entry_path) else {
            debug!("Ignoring archive entry {}", entry_path.display());
            continue;
        };

        let mut bytes = Vec::new();
        entry
            .read_to_end(&mut bytes)
            .map_err(|source| IngestError::Io {
                path: path.join(&entry_path),
                source,
            })?;

        discovered.dumps.push(RawDump {
            source_name,
            origin: DumpOrigin::ArchiveEntry {
                archive: path.to_path_buf(),
                entry: entry_path.to_string_lossy().to_string(),
            },
            text: String::from_utf8_lossy(&bytes).into_owned(),
        });
    }

    info!(
        "Found {} device dumps in {}",
        discovered.dumps.len(),
        path.display()
    );
    Ok(discovered)
}

/// Device name for an archive entry, if the entry follows a dump convention
fn archive_dump_name(entry_path: &Path) -> Option<String> {
    if entry_path.file_name()?.to_str()? == DEVICE_DUMP_FILE {
        let parent = entry_path.parent()?;
        return match parent.components().last()? {
            Component::Normal(name) => Some(name.to_string_lossy().to_string()),
            _ => None,
        };
    }
    flat_dump_name(entry_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn write_zip(path: &Path, entries: &[(&str, &str)]) {
        let file = File::create(path).unwrap();
        let mut writer = ZipWriter::new(file);
        for (name, body) in entries {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(body.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn test_archive_dump_name() {
        assert_eq!(archive_dump_name(Path::new("R1/config.dump")), Some("R1".to_string()));
        assert_eq!(
            archive_dump_name(Path::new("lab/devices/SW2/config.dump")),
            Some("SW2".to_string())
        );
        assert_eq!(archive_dump_name(Path::new("config.dump")), None);
        assert_eq!(archive_dump_name(Path::new("PC1_config.dump")), Some("PC1".to_string()));
        assert_eq!(archive_dump_name(Path::new("R1/notes.txt")), None);
    }

    #[test]
    fn test_read_archive() {
        let dir = TempDir::new().unwrap();
        let zip_path = dir.path().join("lab.zip");
        write_zip(
            &zip_path,
            &[
                ("lab/R1/config.dump", "hostname R1\n"),
                ("lab/SW1_config.dump", "hostname SW1\n"),
                ("lab/README.txt", "ignored"),
            ],
        );

        let found = read_archive(&zip_path).unwrap();
        let mut names: Vec<&str> = found.dumps.iter().map(|d| d.source_name.as_str()).collect();
        names.sort();
        assert_eq!(names, vec!["R1", "SW1"]);
        assert!(found.dumps.iter().all(|d| d.text.starts_with("hostname")));
    }

    #[test]
    fn test_corrupt_archive() {
        let dir = TempDir::new().unwrap();
        let zip_path = dir.path().join("broken.zip");
        std::fs::write(&zip_path, b"not a zip file").unwrap();

        assert!(matches!(read_archive(&zip_path), Err(IngestError::Archive { .. })));
    }

    #[test]
    fn test_declared_entry_size_is_not_trusted() {
        let dir = TempDir::new().unwrap();
        let zip_path = dir.path().join("inflated.zip");
        write_zip(&zip_path, &[("R1/config.dump", "hostname R1\n")]);

        // Claim a 4 GiB uncompressed size in the local and central headers
        let mut bytes = std::fs::read(&zip_path).unwrap();
        for (signature, offset) in [(b"PK\x03\x04", 22), (b"PK\x01\x02", 24)] {
            let at = bytes.windows(4).position(|w| w == signature).unwrap() + offset;
            bytes[at..at + 4].copy_from_slice(&u32::MAX.to_le_bytes());
        }
        std::fs::write(&zip_path, &bytes).unwrap();

        match read_archive(&zip_path) {
            Ok(found) => assert!(found.dumps.iter().all(|d| d.text.len() < 64)),
            Err(err) => assert!(matches!(
                err,
                IngestError::Io { .. } | IngestError::Archive { .. }
            )),
        }
    }
}
