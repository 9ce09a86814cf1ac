use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Harness settings, loaded from a TOML file.
///
/// Every section is optional and falls back to the defaults below.
///
/// ```toml
/// [simulator]
/// url = "http://127.0.0.1:3000"
/// timeout_secs = 600
///
/// [storage]
/// records_dir = "records"
/// cache_dir = "records_cache"
///
/// [frames]
/// min_frames = 10
/// metric_source = "../serverless_sim/src/metric.rs"
///
/// [frames.indices]
/// cost = 6
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessSettings {
    pub simulator: SimulatorSettings,
    pub storage: StorageSettings,
    pub frames: FrameSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorSettings {
    pub url: String,
    pub timeout_secs: u64,
    /// Action sent with the single step of every run
    pub action: i64,
}

impl Default for SimulatorSettings {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:3000".to_string(),
            timeout_secs: 600,
            action: 1,
        }
    }
}

impl SimulatorSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub records_dir: PathBuf,
    pub cache_dir: PathBuf,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            records_dir: PathBuf::from("records"),
            cache_dir: PathBuf::from("records_cache"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameSettings {
    /// Run files with fewer frames are rejected
    pub min_frames: usize,
    /// A simulator `metric.rs` to read the frame indices from
    pub metric_source: Option<PathBuf>,
    /// Per field index overrides, applied last
    pub indices: BTreeMap<String, usize>,
}

impl Default for FrameSettings {
    fn default() -> Self {
        Self {
            min_frames: 10,
            metric_source: None,
            indices: BTreeMap::new(),
        }
    }
}

impl HarnessSettings {
    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load settings from `path`, or use the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => {
                let content = std::fs::read_to_string(path)?;
                Self::from_toml(&content)
            }
            None => Ok(Self::default()),
        }
    }
}
