//! Snapshot export of the full catalog.
//!
//! The export is a JSON array with one object per website, rewritten in full
//! on every run via a temp file and an atomic rename.

use crate::error::Result;
use crate::types::WebsiteRecord;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::Path;
use uuid::Uuid;

/// Write `records` to `path`, replacing any previous snapshot.
///
/// Returns the number of entries written.
pub fn write_snapshot(path: &Path, records: &[WebsiteRecord]) -> Result<usize> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)?;

    let mut bytes = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut bytes, formatter);
    records.serialize(&mut serializer)?;
    bytes.push(b'\n');

    let temp_path = parent.join(format!(".{}.{}.tmp", Uuid::new_v4(), records.len()));
    let written = fs::File::create(&temp_path).and_then(|mut file| {
        file.write_all(&bytes)?;
        file.sync_all()
    });
    if let Err(e) = written {
        let _ = fs::remove_file(&temp_path);
        return Err(e.into());
    }

    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(e.into());
    }

    tracing::debug!(path = %path.display(), entries = records.len(), "Wrote snapshot export");
    Ok(records.len())
}

/// Read a snapshot written by [`write_snapshot`].
pub fn read_snapshot(path: &Path) -> Result<Vec<WebsiteRecord>> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
