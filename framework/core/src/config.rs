use crate::axis::{
    AxisKind, Candidate, Filter, InstanceCachePolicy, MechType, ScaleDownExec, ScaleNum,
    ScaleUpExec, Sche, Selected,
};
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Top level scalar fields that take part in the fingerprint and can be swept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarField {
    RandSeed,
    RequestFreq,
    DagType,
    ColdStart,
    FnType,
}

impl ScalarField {
    pub const ALL: [ScalarField; 5] = [
        ScalarField::RandSeed,
        ScalarField::RequestFreq,
        ScalarField::DagType,
        ScalarField::ColdStart,
        ScalarField::FnType,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ScalarField::RandSeed => "rand_seed",
            ScalarField::RequestFreq => "request_freq",
            ScalarField::DagType => "dag_type",
            ScalarField::ColdStart => "cold_start",
            ScalarField::FnType => "fn_type",
        }
    }
}

impl Display for ScalarField {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ScalarField {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ScalarField::ALL
            .into_iter()
            .find(|field| field.name() == s)
            .ok_or_else(|| ConfigError::UnknownScalar(s.to_string()))
    }
}

/// The mechanism sub-tree of a [Configuration].
///
/// Single choice axes are `Option<Selected<_>>`, so two active candidates on one axis cannot be
/// represented. `None` is the cleared state used between sweep branches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WireMechanism", into = "WireMechanism")]
pub struct Mechanism {
    pub mech_type: Option<Selected<MechType>>,
    pub scale_num: Option<Selected<ScaleNum>>,
    pub scale_down_exec: Option<Selected<ScaleDownExec>>,
    pub scale_up_exec: Option<Selected<ScaleUpExec>>,
    pub sche: Option<Selected<Sche>>,
    pub instance_cache_policy: Option<Selected<InstanceCachePolicy>>,
    pub filter: BTreeMap<Filter, String>,
}

impl Mechanism {
    /// The active `(candidate, param)` pairs of an axis.
    ///
    /// Single choice axes yield at most one pair. Filters are returned sorted by name.
    pub fn active(&self, axis: AxisKind) -> Vec<(&'static str, &str)> {
        fn one<C: Candidate>(selected: &Option<Selected<C>>) -> Vec<(&'static str, &str)> {
            selected
                .iter()
                .map(|s| (s.name(), s.param.as_str()))
                .collect()
        }

        match axis {
            AxisKind::MechType => one(&self.mech_type),
            AxisKind::ScaleNum => one(&self.scale_num),
            AxisKind::ScaleDownExec => one(&self.scale_down_exec),
            AxisKind::ScaleUpExec => one(&self.scale_up_exec),
            AxisKind::Sche => one(&self.sche),
            AxisKind::InstanceCachePolicy => one(&self.instance_cache_policy),
            AxisKind::Filter => {
                let mut active = self
                    .filter
                    .iter()
                    .map(|(k, v)| (k.name(), v.as_str()))
                    .collect::<Vec<_>>();
                active.sort_by_key(|(name, _)| *name);
                active
            }
        }
    }

    pub fn is_cleared(&self, axis: AxisKind) -> bool {
        self.active(axis).is_empty()
    }
}

/// Mechanism in the simulator's own representation: every axis maps every known candidate name
/// to `null` or to its parameter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WireMechanism {
    #[serde(default)]
    pub mech_type: BTreeMap<String, Option<String>>,
    #[serde(default)]
    pub scale_num: BTreeMap<String, Option<String>>,
    #[serde(default)]
    pub scale_down_exec: BTreeMap<String, Option<String>>,
    #[serde(default)]
    pub scale_up_exec: BTreeMap<String, Option<String>>,
    #[serde(default)]
    pub sche: BTreeMap<String, Option<String>>,
    #[serde(default)]
    pub instance_cache_policy: BTreeMap<String, Option<String>>,
    #[serde(default)]
    pub filter: BTreeMap<String, Option<String>>,
}

fn wire_axis<C: Candidate>(selected: &Option<Selected<C>>) -> BTreeMap<String, Option<String>> {
    C::ALL
        .iter()
        .map(|c| {
            let value = selected
                .as_ref()
                .filter(|s| s.candidate == *c)
                .map(|s| s.param.clone());
            (c.name().to_string(), value)
        })
        .collect()
}

fn unwire_axis<C: Candidate>(
    entries: &BTreeMap<String, Option<String>>,
) -> Result<Option<Selected<C>>, ConfigError> {
    let active = entries
        .iter()
        .filter_map(|(k, v)| v.as_ref().map(|v| (k, v)))
        .collect::<Vec<_>>();

    match active.as_slice() {
        [] => Ok(None),
        [(name, param)] => Selected::parse(name, param.as_str()).map(Some),
        _ => Err(ConfigError::MultipleActive {
            axis: C::AXIS,
            candidates: active.iter().map(|(k, _)| k.to_string()).collect(),
        }),
    }
}

impl From<Mechanism> for WireMechanism {
    fn from(mech: Mechanism) -> Self {
        Self {
            mech_type: wire_axis(&mech.mech_type),
            scale_num: wire_axis(&mech.scale_num),
            scale_down_exec: wire_axis(&mech.scale_down_exec),
            scale_up_exec: wire_axis(&mech.scale_up_exec),
            sche: wire_axis(&mech.sche),
            instance_cache_policy: wire_axis(&mech.instance_cache_policy),
            filter: Filter::ALL
                .iter()
                .map(|f| (f.name().to_string(), mech.filter.get(f).cloned()))
                .collect(),
        }
    }
}

impl TryFrom<WireMechanism> for Mechanism {
    type Error = ConfigError;

    fn try_from(wire: WireMechanism) -> Result<Self, Self::Error> {
        let mut filter = BTreeMap::new();
        for (name, value) in wire.filter {
            if let Some(value) = value {
                filter.insert(name.parse::<Filter>()?, value);
            }
        }

        Ok(Self {
            mech_type: unwire_axis(&wire.mech_type)?,
            scale_num: unwire_axis(&wire.scale_num)?,
            scale_down_exec: unwire_axis(&wire.scale_down_exec)?,
            scale_up_exec: unwire_axis(&wire.scale_up_exec)?,
            sche: unwire_axis(&wire.sche)?,
            instance_cache_policy: unwire_axis(&wire.instance_cache_policy)?,
            filter,
        })
    }
}

/// The full experiment configuration sent to the simulator on reset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    #[serde(default)]
    pub rand_seed: String,
    pub request_freq: String,
    pub dag_type: String,
    pub cold_start: String,
    pub fn_type: String,
    #[serde(default)]
    pub no_log: bool,
    #[serde(default = "Configuration::default_total_frame")]
    pub total_frame: u64,
    #[serde(default)]
    pub mech: Mechanism,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            rand_seed: String::new(),
            request_freq: "low".to_string(),
            dag_type: "single".to_string(),
            cold_start: "high".to_string(),
            fn_type: "cpu".to_string(),
            no_log: false,
            total_frame: Self::default_total_frame(),
            mech: Mechanism::default(),
        }
    }
}

impl Configuration {
    const fn default_total_frame() -> u64 {
        1000
    }

    /// Select `candidate` with parameter `param` on `axis`.
    ///
    /// On a single choice axis this replaces any previous selection. On the filter axis the entry
    /// is added to the active set.
    pub fn apply(
        &mut self,
        axis: AxisKind,
        candidate: &str,
        param: impl Into<String>,
    ) -> Result<(), ConfigError> {
        let mech = &mut self.mech;
        match axis {
            AxisKind::MechType => mech.mech_type = Some(Selected::parse(candidate, param)?),
            AxisKind::ScaleNum => mech.scale_num = Some(Selected::parse(candidate, param)?),
            AxisKind::ScaleDownExec => {
                mech.scale_down_exec = Some(Selected::parse(candidate, param)?)
            }
            AxisKind::ScaleUpExec => mech.scale_up_exec = Some(Selected::parse(candidate, param)?),
            AxisKind::Sche => mech.sche = Some(Selected::parse(candidate, param)?),
            AxisKind::InstanceCachePolicy => {
                mech.instance_cache_policy = Some(Selected::parse(candidate, param)?)
            }
            AxisKind::Filter => {
                mech.filter.insert(candidate.parse()?, param.into());
            }
        }
        Ok(())
    }

    /// Deselect every candidate of `axis`.
    pub fn clear(&mut self, axis: AxisKind) {
        let mech = &mut self.mech;
        match axis {
            AxisKind::MechType => mech.mech_type = None,
            AxisKind::ScaleNum => mech.scale_num = None,
            AxisKind::ScaleDownExec => mech.scale_down_exec = None,
            AxisKind::ScaleUpExec => mech.scale_up_exec = None,
            AxisKind::Sche => mech.sche = None,
            AxisKind::InstanceCachePolicy => mech.instance_cache_policy = None,
            AxisKind::Filter => mech.filter.clear(),
        }
    }

    pub fn scalar(&self, field: ScalarField) -> &str {
        match field {
            ScalarField::RandSeed => &self.rand_seed,
            ScalarField::RequestFreq => &self.request_freq,
            ScalarField::DagType => &self.dag_type,
            ScalarField::ColdStart => &self.cold_start,
            ScalarField::FnType => &self.fn_type,
        }
    }

    pub fn set_scalar(&mut self, field: ScalarField, value: impl Into<String>) {
        let value = value.into();
        match field {
            ScalarField::RandSeed => self.rand_seed = value,
            ScalarField::RequestFreq => self.request_freq = value,
            ScalarField::DagType => self.dag_type = value,
            ScalarField::ColdStart => self.cold_start = value,
            ScalarField::FnType => self.fn_type = value,
        }
    }

    /// Check that this configuration can be run and fingerprinted without loss.
    ///
    /// Every single choice axis needs an active candidate. Scalars must be word characters and
    /// parameters must not contain the fingerprint delimiters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for axis in AxisKind::ALL {
            if !axis.is_filter() && self.mech.is_cleared(axis) {
                return Err(ConfigError::NoActiveCandidate(axis));
            }
        }

        for field in ScalarField::ALL {
            let value = self.scalar(field);
            if !value.chars().all(|c| c.is_alphanumeric() || c == '_') {
                return Err(ConfigError::UnencodableValue {
                    field: field.name().to_string(),
                    value: value.to_string(),
                });
            }
        }

        for axis in AxisKind::ALL {
            for (_, param) in self.mech.active(axis) {
                // The fingerprint keeps only the mechanism family name
                let dropped = axis == AxisKind::MechType && !param.is_empty();
                if dropped || param.contains(['(', ')', '[', ']']) {
                    return Err(ConfigError::UnencodableValue {
                        field: axis.name().to_string(),
                        value: param.to_string(),
                    });
                }
            }
        }

        Ok(())
    }

    /// Serialize into the simulator's request shape.
    pub fn to_wire(&self) -> serde_json::Value {
        // Serializing plain strings, bools and string maps cannot fail.
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    /// Parse a configuration in the simulator's shape, rejecting axes with several active
    /// candidates.
    pub fn from_wire(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// Load a baseline configuration from a YAML file.
    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(content)
    }
}
