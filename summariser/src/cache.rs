use crate::model::DerivedMetrics;
use anyhow::Context;
use sha3::Digest;
use std::io::Write;
use std::path::{Path, PathBuf};

/// On-disk memo of [DerivedMetrics], one JSON file per run file.
///
/// Entries are never invalidated automatically. After a change to the simulator's frame format the
/// cache has to be cleared with [TelemetryCache::clear].
#[derive(Debug, Clone)]
pub struct TelemetryCache {
    dir: PathBuf,
}

impl TelemetryCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The cache file for a run file name, `<sha3-256 of the name>.json`.
    pub fn entry_path(&self, file_name: &str) -> PathBuf {
        let mut hasher = sha3::Sha3_256::new();
        Digest::update(&mut hasher, file_name.as_bytes());
        self.dir.join(format!("{:x}.json", hasher.finalize()))
    }

    /// Look up a cached entry. Unreadable entries are treated as missing.
    pub fn get(&self, file_name: &str) -> Option<DerivedMetrics> {
        let path = self.entry_path(file_name);
        let content = std::fs::read(&path).ok()?;
        match serde_json::from_slice::<DerivedMetrics>(&content) {
            Ok(metrics) if metrics.file_name == file_name => Some(metrics),
            Ok(_) => {
                log::warn!("Cache entry {} belongs to another file", path.display());
                None
            }
            Err(e) => {
                log::warn!("Ignoring unreadable cache entry {}: {e}", path.display());
                None
            }
        }
    }

    /// Store an entry. The write goes through a temporary file so readers never see a partial
    /// entry; concurrent writers of the same entry leave the last one in place.
    pub fn put(&self, metrics: &DerivedMetrics) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create cache directory {}", self.dir.display()))?;

        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        serde_json::to_writer(&mut tmp, metrics)?;
        tmp.flush()?;
        tmp.persist(self.entry_path(&metrics.file_name))?;
        Ok(())
    }

    /// Remove every cache entry. Returns the number of entries removed.
    pub fn clear(&self) -> anyhow::Result<usize> {
        if !self.dir.exists() {
            return Ok(0);
        }

        let mut removed = 0;
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
                std::fs::remove_file(&path)
                    .with_context(|| format!("Failed to remove {}", path.display()))?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}
