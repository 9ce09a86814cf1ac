//! Canonical string keys for configurations.
//!
//! A fingerprint looks like
//!
//! ```text
//! sdhello.rflow.dtsingle.cshigh.ftcpu.mtscale_sche_joint.scl(hpa.)(default.)(least_task.)[(careful_down.)].scd(greedy.).ic(lru.10)
//! ```
//!
//! Each single choice axis is written as `(name.param)`, the active filters are concatenated in
//! name order inside `[...]`. Run files are stored as `<fingerprint>.UTC_<timestamp>`, so the
//! fingerprint is also the storage key.

use crate::axis::AxisKind;
use crate::config::Configuration;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::sync::LazyLock;

/// Separator between the fingerprint and the timestamp in a run file name.
pub const RUN_FILE_SEPARATOR: &str = ".UTC_";

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse this fingerprint back into its flat fields.
    pub fn decode(&self) -> FlatConfig {
        decode(&self.0)
    }

    /// Whether `file_name` is a run file produced for this fingerprint.
    pub fn owns_file(&self, file_name: &str) -> bool {
        fingerprint_of_file(file_name) == Some(self.as_str())
    }
}

impl Display for Fingerprint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Fingerprint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<String> for Fingerprint {
    fn from(value: String) -> Self {
        Self(value)
    }
}

fn single(config: &Configuration, axis: AxisKind) -> String {
    match config.mech.active(axis).first() {
        Some((name, param)) => format!("{name}.{param}"),
        None => ".".to_string(),
    }
}

/// Compute the fingerprint of a configuration.
///
/// Reads exactly one canonical value per axis, so the result does not depend on any map
/// iteration order. An axis without a selection is written as `(.)`; such a configuration will
/// not pass [Configuration::validate] but still has a well defined key.
pub fn encode(config: &Configuration) -> Fingerprint {
    let mech_type = config
        .mech
        .active(AxisKind::MechType)
        .first()
        .map(|(name, _)| *name)
        .unwrap_or_default();

    let filters = config
        .mech
        .active(AxisKind::Filter)
        .into_iter()
        .map(|(name, param)| format!("({name}.{param})"))
        .collect::<String>();

    Fingerprint(format!(
        "sd{}.rf{}.dt{}.cs{}.ft{}.mt{}.scl({})({})({})[{}].scd({}).ic({})",
        config.rand_seed,
        config.request_freq,
        config.dag_type,
        config.cold_start,
        config.fn_type,
        mech_type,
        single(config, AxisKind::ScaleNum),
        single(config, AxisKind::ScaleDownExec),
        single(config, AxisKind::ScaleUpExec),
        filters,
        single(config, AxisKind::Sche),
        single(config, AxisKind::InstanceCachePolicy),
    ))
}

/// The fingerprint prefix of a run file name, if it has one.
pub fn fingerprint_of_file(file_name: &str) -> Option<&str> {
    file_name
        .split_once(RUN_FILE_SEPARATOR)
        .map(|(prefix, _)| prefix)
}

/// The flat, string typed view of a fingerprint.
///
/// Single choice mechanism fields hold `name.param` (for example `lru.10` or `hpa.`), `mech_type`
/// holds the bare name and `filter` holds the concatenated `(name.param)` entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlatConfig {
    pub rand_seed: String,
    pub request_freq: String,
    pub dag_type: String,
    pub cold_start: String,
    pub fn_type: String,
    pub mech_type: String,
    pub scale_num: String,
    pub scale_down_exec: String,
    pub scale_up_exec: String,
    pub filter: String,
    pub sche: String,
    pub instance_cache_policy: String,
}

impl FlatConfig {
    pub const FIELD_NAMES: [&'static str; 12] = [
        "rand_seed",
        "request_freq",
        "dag_type",
        "cold_start",
        "fn_type",
        "mech_type",
        "scale_num",
        "scale_down_exec",
        "scale_up_exec",
        "filter",
        "sche",
        "instance_cache_policy",
    ];

    /// Look a field up by name. Returns `None` for names that are not flat config fields.
    pub fn get(&self, field: &str) -> Option<&str> {
        let value = match field {
            "rand_seed" => &self.rand_seed,
            "request_freq" => &self.request_freq,
            "dag_type" => &self.dag_type,
            "cold_start" => &self.cold_start,
            "fn_type" => &self.fn_type,
            "mech_type" => &self.mech_type,
            "scale_num" => &self.scale_num,
            "scale_down_exec" => &self.scale_down_exec,
            "scale_up_exec" => &self.scale_up_exec,
            "filter" => &self.filter,
            "sche" => &self.sche,
            "instance_cache_policy" => &self.instance_cache_policy,
            _ => return None,
        };
        Some(value.as_str())
    }

    fn set(&mut self, field: &str, value: &str) {
        let slot = match field {
            "rand_seed" => &mut self.rand_seed,
            "request_freq" => &mut self.request_freq,
            "dag_type" => &mut self.dag_type,
            "cold_start" => &mut self.cold_start,
            "fn_type" => &mut self.fn_type,
            "mech_type" => &mut self.mech_type,
            "scale_num" => &mut self.scale_num,
            "scale_down_exec" => &mut self.scale_down_exec,
            "scale_up_exec" => &mut self.scale_up_exec,
            "filter" => &mut self.filter,
            "sche" => &mut self.sche,
            "instance_cache_policy" => &mut self.instance_cache_policy,
            _ => return,
        };
        *slot = value.to_string();
    }

    /// Fields that the decoder could not find. These were silently left empty.
    ///
    /// `rand_seed`, `mech_type` and `filter` may legitimately be empty and are never reported.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        Self::FIELD_NAMES
            .into_iter()
            .filter(|f| !matches!(*f, "rand_seed" | "mech_type" | "filter"))
            .filter(|f| self.get(f).is_some_and(str::is_empty))
            .collect()
    }
}

struct FieldPattern {
    regex: Regex,
    fields: &'static [&'static str],
}

impl FieldPattern {
    fn new(pattern: &str, fields: &'static [&'static str]) -> Self {
        Self {
            regex: Regex::new(pattern).expect("Invalid fingerprint pattern"),
            fields,
        }
    }
}

static FIELD_PATTERNS: LazyLock<Vec<FieldPattern>> = LazyLock::new(|| {
    vec![
        FieldPattern::new(r"^sd(\w*)\.rf", &["rand_seed"]),
        FieldPattern::new(r"\.rf(\w+)\.", &["request_freq"]),
        FieldPattern::new(r"\.dt(\w+)\.", &["dag_type"]),
        FieldPattern::new(r"\.cs(\w+)\.", &["cold_start"]),
        FieldPattern::new(r"\.ft(\w+)\.", &["fn_type"]),
        FieldPattern::new(r"\.mt(\w*)\.scl", &["mech_type"]),
        FieldPattern::new(
            r"\.scl\(([^)]+)\)\(([^)]+)\)\(([^)]+)\)\[(.*?)\]\.",
            &["scale_num", "scale_down_exec", "scale_up_exec", "filter"],
        ),
        FieldPattern::new(r"\.scd\(([^)]+)\)", &["sche"]),
        FieldPattern::new(r"\.ic\(([^)]+)\)", &["instance_cache_policy"]),
    ]
});

/// Parse a fingerprint (or a full run file name) into its flat fields.
///
/// Every field is extracted by its own pattern. Fields whose pattern does not match are left
/// empty rather than reported, see [FlatConfig::missing_fields].
pub fn decode(fingerprint: &str) -> FlatConfig {
    let mut flat = FlatConfig::default();
    for pattern in FIELD_PATTERNS.iter() {
        if let Some(captures) = pattern.regex.captures(fingerprint) {
            for (field, value) in pattern.fields.iter().zip(captures.iter().skip(1)) {
                if let Some(value) = value {
                    flat.set(field, value.as_str());
                }
            }
        }
    }
    flat
}
