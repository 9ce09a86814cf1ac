use crate::{
    append_manifest_entry, load_manifest, load_run_record, store_run_record, ManifestEntry,
    RunRecord, MANIFEST_FILE_NAME,
};
use anyhow::Context;
use campaign_core::prelude::{fingerprint_of_file, Fingerprint, RUN_FILE_SEPARATOR};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// The records directory together with its manifest.
///
/// Run counts come from the manifest, which is appended to on every write. Files placed in the
/// directory by other tools are only counted after [RunStore::rebuild_manifest].
///
/// Callers that count and then write for the same fingerprint should hold
/// [RunStore::fingerprint_lock] for the whole sequence. Different fingerprints do not contend.
#[derive(Debug)]
pub struct RunStore {
    dir: PathBuf,
    index: Mutex<BTreeMap<String, Vec<String>>>,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl RunStore {
    /// Open a records directory, creating it if needed.
    ///
    /// Manifest entries whose file no longer exists are dropped with a warning. Without a manifest
    /// the directory is scanned and a new manifest is written.
    pub fn open(dir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create records directory {}", dir.display()))?;

        let store = Self {
            dir,
            index: Mutex::new(BTreeMap::new()),
            locks: Mutex::new(HashMap::new()),
        };

        let manifest_path = store.manifest_path();
        if !manifest_path.exists() {
            let found = store.rebuild_manifest()?;
            log::info!(
                "No manifest in {}, indexed {found} existing run files",
                store.dir.display()
            );
            return Ok(store);
        }

        let entries = load_manifest(&manifest_path)
            .with_context(|| format!("Failed to read manifest {}", manifest_path.display()))?;
        {
            let mut index = store.index.lock();
            for entry in entries {
                if !store.path(&entry.file_name).exists() {
                    log::warn!(
                        "Manifest lists missing run file {}, not counting it",
                        entry.file_name
                    );
                    continue;
                }
                let files = index.entry(entry.fingerprint).or_default();
                if !files.contains(&entry.file_name) {
                    files.push(entry.file_name);
                }
            }
            index.values_mut().for_each(|files| files.sort());
        }

        Ok(store)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.dir.join(MANIFEST_FILE_NAME)
    }

    pub fn path(&self, file_name: &str) -> PathBuf {
        self.dir.join(file_name)
    }

    /// The lock that serializes count-then-write sequences for one fingerprint.
    pub fn fingerprint_lock(&self, fingerprint: &Fingerprint) -> Arc<Mutex<()>> {
        self.locks
            .lock()
            .entry(fingerprint.to_string())
            .or_default()
            .clone()
    }

    /// Number of recorded runs for a fingerprint.
    pub fn count(&self, fingerprint: &Fingerprint) -> usize {
        self.index
            .lock()
            .get(fingerprint.as_str())
            .map_or(0, Vec::len)
    }

    /// Run file names for a fingerprint, sorted by name and therefore by creation time.
    pub fn files_for(&self, fingerprint: &Fingerprint) -> Vec<String> {
        self.index
            .lock()
            .get(fingerprint.as_str())
            .cloned()
            .unwrap_or_default()
    }

    /// Every fingerprint with its sorted run file names.
    pub fn index(&self) -> BTreeMap<Fingerprint, Vec<String>> {
        self.index
            .lock()
            .iter()
            .map(|(fingerprint, files)| (Fingerprint::new(fingerprint.clone()), files.clone()))
            .collect()
    }

    pub fn read_record(&self, file_name: &str) -> anyhow::Result<RunRecord> {
        let path = self.path(file_name);
        let file = std::fs::File::open(&path)
            .with_context(|| format!("Failed to open run file {}", path.display()))?;
        load_run_record(file).with_context(|| format!("Failed to parse run file {}", path.display()))
    }

    /// Write a new run file for `fingerprint` and record it in the manifest.
    ///
    /// The file is written under a temporary name and renamed into place, so a run file is either
    /// complete or absent. Returns the new file name.
    pub fn persist(
        &self,
        fingerprint: &Fingerprint,
        frames: Vec<Vec<serde_json::Value>>,
    ) -> anyhow::Result<String> {
        let mut created = Utc::now();
        let file_name = loop {
            let candidate = run_file_name(fingerprint, created);
            if !self.path(&candidate).exists() {
                break candidate;
            }
            created += chrono::Duration::nanoseconds(1);
        };

        let record = RunRecord {
            record_name: file_name.clone(),
            fingerprint: Some(fingerprint.to_string()),
            frames,
        };

        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)
            .context("Failed to create temporary run file")?;
        store_run_record(&record, &mut tmp)?;
        tmp.flush()?;
        tmp.persist(self.path(&file_name))
            .with_context(|| format!("Failed to move run file {file_name} into place"))?;

        let entry = ManifestEntry {
            fingerprint: fingerprint.to_string(),
            file_name: file_name.clone(),
            created_at: created.timestamp(),
        };
        let mut index = self.index.lock();
        if let Err(e) = append_manifest_entry(&entry, &self.manifest_path()) {
            // A run file exists only alongside its manifest entry
            if let Err(remove) = std::fs::remove_file(self.path(&file_name)) {
                log::warn!(
                    "Failed to remove unindexed run file {file_name}, run rebuild-manifest to count it: {remove}"
                );
            }
            return Err(e.context("Failed to append to manifest"));
        }
        let files = index.entry(entry.fingerprint).or_default();
        files.push(file_name.clone());
        files.sort();

        log::debug!("Persisted run file {file_name}");
        Ok(file_name)
    }

    /// Scan the records directory and rewrite the manifest from what is found.
    ///
    /// Returns the number of run files indexed.
    pub fn rebuild_manifest(&self) -> anyhow::Result<usize> {
        let mut entries = Vec::new();
        for entry in walkdir::WalkDir::new(&self.dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(file_name) = entry.file_name().to_str() else {
                continue;
            };
            let Some(fingerprint) = fingerprint_of_file(file_name) else {
                continue;
            };

            let created_at = entry
                .metadata()
                .ok()
                .and_then(|m| m.modified().ok())
                .map(|t| DateTime::<Utc>::from(t).timestamp())
                .unwrap_or_default();
            entries.push(ManifestEntry {
                fingerprint: fingerprint.to_string(),
                file_name: file_name.to_string(),
                created_at,
            });
        }

        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)
            .context("Failed to create temporary manifest")?;
        for entry in &entries {
            serde_json::to_writer(&mut tmp, entry)?;
            tmp.write_all(b"\n")?;
        }
        tmp.flush()?;

        let mut index = self.index.lock();
        tmp.persist(self.manifest_path())
            .context("Failed to move manifest into place")?;
        index.clear();
        for entry in &entries {
            index
                .entry(entry.fingerprint.clone())
                .or_default()
                .push(entry.file_name.clone());
        }

        Ok(entries.len())
    }
}

/// `<fingerprint>.UTC_<YYYY_mm_dd_HH_MM_SS_nanos>`
pub(crate) fn run_file_name(fingerprint: &Fingerprint, created: DateTime<Utc>) -> String {
    format!(
        "{fingerprint}{RUN_FILE_SEPARATOR}{}",
        created.format("%Y_%m_%d_%H_%M_%S_%9f")
    )
}
