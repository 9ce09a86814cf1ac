mod settings;
mod store;

use serde::{Deserialize, Serialize};
use std::io::{BufRead, Read, Write};
use std::path::Path;

pub use settings::{FrameSettings, HarnessSettings, SimulatorSettings, StorageSettings};
pub use store::RunStore;

/// File name of the manifest inside a records directory.
pub const MANIFEST_FILE_NAME: &str = "manifest.jsonl";

/// One persisted simulator execution.
///
/// This is the file format of the run files in the records directory. It is written once and never
/// modified afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunRecord {
    /// Name of the run file this record is stored in
    pub record_name: String,
    /// The fingerprint of the configuration that produced this run
    ///
    /// Run files written by the simulator itself do not carry it, in which case it is recovered
    /// from the file name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
    /// The raw telemetry, one fixed-position array per frame
    pub frames: Vec<Vec<serde_json::Value>>,
}

/// A line of the run manifest
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ManifestEntry {
    pub fingerprint: String,
    pub file_name: String,
    /// Unix timestamp in seconds
    pub created_at: i64,
}

/// Append a manifest entry to a file
///
/// The entry is serialized to JSON and written as a single line followed by a newline.
pub fn append_manifest_entry(entry: &ManifestEntry, path: &Path) -> anyhow::Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)?;
    let mut line = serde_json::to_vec(entry)?;
    line.push(b'\n');
    file.write_all(&line)?;
    Ok(())
}

/// Serialize a run record to a writer
pub fn store_run_record<W: Write>(record: &RunRecord, writer: &mut W) -> anyhow::Result<()> {
    serde_json::to_writer(writer, record)?;
    Ok(())
}

/// Load a run record from a reader
pub fn load_run_record<R: Read>(reader: R) -> anyhow::Result<RunRecord> {
    let reader = std::io::BufReader::new(reader);
    let record: RunRecord = serde_json::from_reader(reader)?;
    Ok(record)
}

/// Load manifest entries from a file
///
/// The file should contain one JSON object per line, the format produced by
/// [append_manifest_entry]. Blank lines are skipped.
pub fn load_manifest(path: &Path) -> anyhow::Result<Vec<ManifestEntry>> {
    let file = std::fs::File::open(path)?;
    let reader = std::io::BufReader::new(file);
    let mut entries = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let entry: ManifestEntry = serde_json::from_str(&line)?;
        entries.push(entry);
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn manifest_lines_append() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join(MANIFEST_FILE_NAME);
        let first = ManifestEntry {
            fingerprint: "a".to_string(),
            file_name: "a.UTC_1".to_string(),
            created_at: 1,
        };
        let second = ManifestEntry {
            fingerprint: "b".to_string(),
            file_name: "b.UTC_2".to_string(),
            created_at: 2,
        };
        append_manifest_entry(&first, &path)?;
        append_manifest_entry(&second, &path)?;

        assert_eq!(vec![first, second], load_manifest(&path)?);
        Ok(())
    }

    #[test]
    fn reads_simulator_record_without_fingerprint() -> anyhow::Result<()> {
        let record = load_run_record(r#"{"record_name": "x", "frames": [[1, [], 2.5]]}"#.as_bytes())?;
        assert_eq!(None, record.fingerprint);
        assert_eq!(1, record.frames.len());
        assert_eq!(3, record.frames[0].len());
        Ok(())
    }
}
