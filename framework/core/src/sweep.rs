//! Depth-first enumeration of a campaign's configuration space.

use crate::axis::{AxisKind, Candidate, MechType};
use crate::config::{Configuration, ScalarField};
use crate::error::ConfigError;
use indexmap::IndexMap;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One candidate of an axis together with the parameter it should be applied with.
///
/// In a sweep file a choice is written either as a bare name (`greedy`) or as a single entry map
/// (`{lru: 10}`, `{hpa: null}`). Parameters are always passed to the simulator as strings, a
/// `null` parameter becomes the empty string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawChoice")]
pub struct Choice {
    pub name: String,
    #[serde(default)]
    pub param: String,
}

impl Choice {
    pub fn new(name: impl Into<String>, param: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            param: param.into(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ParamValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
}

impl ParamValue {
    fn into_param(self) -> String {
        match self {
            ParamValue::Text(s) => s,
            ParamValue::Integer(i) => i.to_string(),
            ParamValue::Float(f) => f.to_string(),
            ParamValue::Bool(b) => b.to_string(),
        }
    }
}

type RawEntries = BTreeMap<String, Option<ParamValue>>;

fn entries_to_choices(entries: RawEntries) -> Vec<Choice> {
    entries
        .into_iter()
        .map(|(name, param)| Choice {
            name,
            param: param.map(ParamValue::into_param).unwrap_or_default(),
        })
        .collect()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawChoice {
    Name(String),
    Entry(RawEntries),
}

impl TryFrom<RawChoice> for Choice {
    type Error = String;

    fn try_from(raw: RawChoice) -> Result<Self, Self::Error> {
        match raw {
            RawChoice::Name(name) => Ok(Choice::new(name, "")),
            RawChoice::Entry(entries) => {
                let mut choices = entries_to_choices(entries);
                match choices.len() {
                    1 => Ok(choices.remove(0)),
                    n => Err(format!("A choice must have exactly one entry, found {n}")),
                }
            }
        }
    }
}

/// A set of filters that are active together, one option of the filter axis.
///
/// Written as a map (`{careful_down: null}`) or a list of single entry maps. An empty set is the
/// "no filters" option.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawFilterSet")]
pub struct FilterSet(pub Vec<Choice>);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawFilterSet {
    Entries(RawEntries),
    List(Vec<RawEntries>),
}

impl From<RawFilterSet> for FilterSet {
    fn from(raw: RawFilterSet) -> Self {
        match raw {
            RawFilterSet::Entries(entries) => FilterSet(entries_to_choices(entries)),
            RawFilterSet::List(list) => {
                FilterSet(list.into_iter().flat_map(entries_to_choices).collect())
            }
        }
    }
}

/// Axis candidates swept inside one mechanism family.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FamilyAxes {
    pub scale_num: Vec<Choice>,
    pub scale_down_exec: Vec<Choice>,
    pub scale_up_exec: Vec<Choice>,
    pub sche: Vec<Choice>,
    #[serde(default)]
    pub filter: Vec<FilterSet>,
}

impl FamilyAxes {
    fn filter_options(&self) -> Vec<FilterSet> {
        if self.filter.is_empty() {
            vec![FilterSet::default()]
        } else {
            self.filter.clone()
        }
    }

    fn combination_count(&self) -> usize {
        self.scale_num.len()
            * self.scale_down_exec.len()
            * self.scale_up_exec.len()
            * self.sche.len()
            * self.filter_options().len()
    }
}

/// The sweep file of a campaign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepPlan {
    /// Target number of runs per fingerprint.
    pub run_time: usize,
    /// Outer scalar sweep. Fields are visited in [ScalarField::ALL] order, unlisted fields keep
    /// their baseline value.
    #[serde(default)]
    pub params: BTreeMap<ScalarField, Vec<Choice>>,
    /// Mechanism families, visited in the order the sweep file declares them.
    pub mech_scale_sche: IndexMap<MechType, FamilyAxes>,
    #[serde(default)]
    pub mech_other: BTreeMap<AxisKind, Vec<Choice>>,
}

impl SweepPlan {
    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(content)
    }

    /// Check that every named candidate exists and that `mech_other` only names axes that are not
    /// swept per family.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut probe = Configuration::default();
        for (mech_type, axes) in &self.mech_scale_sche {
            probe.apply(AxisKind::MechType, mech_type.name(), "")?;
            for (axis, choices) in [
                (AxisKind::ScaleNum, &axes.scale_num),
                (AxisKind::ScaleDownExec, &axes.scale_down_exec),
                (AxisKind::ScaleUpExec, &axes.scale_up_exec),
                (AxisKind::Sche, &axes.sche),
            ] {
                for choice in choices {
                    probe.apply(axis, &choice.name, choice.param.as_str())?;
                }
            }
            for set in &axes.filter {
                for choice in &set.0 {
                    probe.apply(AxisKind::Filter, &choice.name, choice.param.as_str())?;
                }
            }
        }

        for (axis, choices) in &self.mech_other {
            if !matches!(axis, AxisKind::InstanceCachePolicy) {
                return Err(ConfigError::UnknownAxis(format!(
                    "{axis} cannot be swept in mech_other"
                )));
            }
            for choice in choices {
                probe.apply(*axis, &choice.name, choice.param.as_str())?;
            }
        }

        Ok(())
    }

    /// Scalar fields of the outer sweep, in visiting order.
    fn outer_fields(&self) -> Vec<(ScalarField, &Vec<Choice>)> {
        ScalarField::ALL
            .into_iter()
            .filter_map(|field| self.params.get(&field).map(|choices| (field, choices)))
            .collect()
    }

    /// Every assignment of the outer scalar fields, in the order the sweep visits them.
    pub fn scalar_combinations(&self) -> Vec<Vec<(ScalarField, String)>> {
        let fields = self.outer_fields();
        if fields.is_empty() {
            return vec![Vec::new()];
        }

        fields
            .into_iter()
            .map(|(field, choices)| {
                choices
                    .iter()
                    .map(move |c| (field, c.name.clone()))
                    .collect::<Vec<_>>()
            })
            .multi_cartesian_product()
            .collect()
    }

    /// Number of mechanism combinations visited for one assignment of the scalar fields.
    pub fn mechanism_combination_count(&self) -> usize {
        let other = self
            .mech_other
            .values()
            .map(Vec::len)
            .product::<usize>();
        self.mech_scale_sche
            .values()
            .map(FamilyAxes::combination_count)
            .sum::<usize>()
            * other
    }

    /// Total number of configurations the sweep visits, computed without visiting.
    pub fn combination_count(&self) -> usize {
        let outer = self
            .outer_fields()
            .iter()
            .map(|(_, choices)| choices.len())
            .product::<usize>();
        outer * self.mechanism_combination_count()
    }
}

/// Walks a [SweepPlan] over a configuration it owns.
///
/// At each depth a candidate is applied, the next depth is visited and the axis is cleared again.
/// After [SweepDriver::run] returns, successfully or not, the configuration equals the baseline it
/// was created with.
pub struct SweepDriver {
    config: Configuration,
}

impl SweepDriver {
    pub fn new(baseline: Configuration) -> Self {
        Self { config: baseline }
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    pub fn into_config(self) -> Configuration {
        self.config
    }

    /// Visit every configuration of the plan. Returns the number of visits.
    ///
    /// An error from `visit` aborts the sweep and is returned unchanged.
    pub fn run<E, F>(&mut self, plan: &SweepPlan, mut visit: F) -> Result<usize, E>
    where
        E: From<ConfigError>,
        F: FnMut(&Configuration) -> Result<(), E>,
    {
        let fields = plan.outer_fields();
        let mut visited = 0;
        let result = self.sweep_scalars(plan, &fields, &mut visit, &mut visited);
        result.map(|_| visited)
    }

    /// Visit only the mechanism combinations, leaving the scalar fields as they are.
    pub fn run_mechanisms<E, F>(&mut self, plan: &SweepPlan, mut visit: F) -> Result<usize, E>
    where
        E: From<ConfigError>,
        F: FnMut(&Configuration) -> Result<(), E>,
    {
        let mut visited = 0;
        self.sweep_families(plan, &mut visit, &mut visited)
            .map(|_| visited)
    }

    fn sweep_scalars<E, F>(
        &mut self,
        plan: &SweepPlan,
        fields: &[(ScalarField, &Vec<Choice>)],
        visit: &mut F,
        visited: &mut usize,
    ) -> Result<(), E>
    where
        E: From<ConfigError>,
        F: FnMut(&Configuration) -> Result<(), E>,
    {
        let Some(((field, choices), rest)) = fields.split_first() else {
            return self.sweep_families(plan, visit, visited);
        };

        let baseline = self.config.scalar(*field).to_string();
        for choice in choices.iter() {
            self.config.set_scalar(*field, choice.name.as_str());
            let result = self.sweep_scalars(plan, rest, visit, visited);
            self.config.set_scalar(*field, baseline.as_str());
            result?;
        }
        Ok(())
    }

    fn sweep_families<E, F>(
        &mut self,
        plan: &SweepPlan,
        visit: &mut F,
        visited: &mut usize,
    ) -> Result<(), E>
    where
        E: From<ConfigError>,
        F: FnMut(&Configuration) -> Result<(), E>,
    {
        let baseline = self.config.mech.clone();
        for (mech_type, axes) in &plan.mech_scale_sche {
            log::debug!("Sweeping mechanism family {mech_type}");
            let result = self
                .config
                .apply(AxisKind::MechType, mech_type.name(), "")
                .map_err(E::from)
                .and_then(|_| self.sweep_family(plan, axes, visit, visited));
            self.config.mech = baseline.clone();
            result?;
        }
        Ok(())
    }

    fn sweep_family<E, F>(
        &mut self,
        plan: &SweepPlan,
        axes: &FamilyAxes,
        visit: &mut F,
        visited: &mut usize,
    ) -> Result<(), E>
    where
        E: From<ConfigError>,
        F: FnMut(&Configuration) -> Result<(), E>,
    {
        let mut levels: Vec<(AxisKind, Vec<Vec<Choice>>)> = vec![
            (AxisKind::ScaleNum, singletons(&axes.scale_num)),
            (AxisKind::ScaleDownExec, singletons(&axes.scale_down_exec)),
            (AxisKind::ScaleUpExec, singletons(&axes.scale_up_exec)),
            (AxisKind::Sche, singletons(&axes.sche)),
            (
                AxisKind::Filter,
                axes.filter_options().into_iter().map(|s| s.0).collect(),
            ),
        ];
        for (axis, choices) in &plan.mech_other {
            levels.push((*axis, singletons(choices)));
        }

        self.descend(&levels, visit, visited)
    }

    fn descend<E, F>(
        &mut self,
        levels: &[(AxisKind, Vec<Vec<Choice>>)],
        visit: &mut F,
        visited: &mut usize,
    ) -> Result<(), E>
    where
        E: From<ConfigError>,
        F: FnMut(&Configuration) -> Result<(), E>,
    {
        let Some(((axis, options), rest)) = levels.split_first() else {
            *visited += 1;
            return visit(&self.config);
        };

        for option in options {
            self.config.clear(*axis);
            let result = self
                .apply_all(*axis, option)
                .and_then(|_| self.descend(rest, visit, visited));
            self.config.clear(*axis);
            result?;
        }
        Ok(())
    }

    fn apply_all<E: From<ConfigError>>(
        &mut self,
        axis: AxisKind,
        choices: &[Choice],
    ) -> Result<(), E> {
        for choice in choices {
            self.config
                .apply(axis, &choice.name, choice.param.as_str())?;
        }
        Ok(())
    }
}

fn singletons(choices: &[Choice]) -> Vec<Vec<Choice>> {
    choices.iter().map(|c| vec![c.clone()]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::encode;
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;

    const PLAN: &str = r#"
run_time: 3
params:
  request_freq:
    - low: null
    - middle: null
  dag_type:
    - single
    - dag
mech_scale_sche:
  scale_sche_joint:
    scale_num:
      - hpa: null
      - lass: null
    scale_down_exec:
      - default: null
    scale_up_exec:
      - least_task: null
    sche:
      - pos: null
      - greedy: null
      - random: null
    filter:
      - {}
      - careful_down: null
  no_scale:
    scale_num:
      - no: null
    scale_down_exec:
      - default
    scale_up_exec:
      - no: null
    sche:
      - faasflow: null
mech_other:
  instance_cache_policy:
    - no_evict: null
    - lru: 10
"#;

    fn plan() -> SweepPlan {
        SweepPlan::from_yaml(PLAN).unwrap()
    }

    #[test]
    fn parses_choices_in_every_form() {
        let plan = plan();
        assert_eq!(3, plan.run_time);
        assert_eq!(
            vec![Choice::new("no_evict", ""), Choice::new("lru", "10")],
            plan.mech_other[&AxisKind::InstanceCachePolicy]
        );
        let joint = &plan.mech_scale_sche[&MechType::ScaleScheJoint];
        assert_eq!(
            vec![
                FilterSet::default(),
                FilterSet(vec![Choice::new("careful_down", "")])
            ],
            joint.filter
        );
        assert_eq!(
            vec![Choice::new("single", ""), Choice::new("dag", "")],
            plan.params[&ScalarField::DagType]
        );
    }

    #[test]
    fn rejects_multi_entry_choices() {
        let err = serde_yaml::from_str::<Choice>("{a: 1, b: 2}").unwrap_err();
        assert!(err.to_string().contains("exactly one entry"), "{err}");
    }

    #[test]
    fn counts_without_visiting() {
        // (2 * 1 * 1 * 3 * 2 + 1) * 2 cache policies * 4 scalar combinations
        assert_eq!(26, plan().mechanism_combination_count());
        assert_eq!(104, plan().combination_count());
        assert_eq!(4, plan().scalar_combinations().len());
    }

    #[test]
    fn visits_every_combination_once() {
        let plan = plan();
        let baseline = Configuration {
            rand_seed: "seed".to_string(),
            ..Default::default()
        };
        let mut driver = SweepDriver::new(baseline.clone());
        let mut seen = HashSet::new();

        let visited = driver
            .run(&plan, |config| -> Result<(), ConfigError> {
                config.validate()?;
                assert!(seen.insert(encode(config)));
                Ok(())
            })
            .unwrap();

        assert_eq!(plan.combination_count(), visited);
        assert_eq!(104, seen.len());
        assert_eq!(&baseline, driver.config());
    }

    #[test]
    fn visits_scalars_in_declared_order() {
        let plan = plan();
        let mut driver = SweepDriver::new(Configuration::default());
        let mut order = Vec::new();
        driver
            .run(&plan, |config| -> Result<(), ConfigError> {
                let pair = (config.request_freq.clone(), config.dag_type.clone());
                if order.last() != Some(&pair) {
                    order.push(pair);
                }
                Ok(())
            })
            .unwrap();

        let expected = plan
            .scalar_combinations()
            .into_iter()
            .map(|combo| (combo[0].1.clone(), combo[1].1.clone()))
            .collect::<Vec<_>>();
        assert_eq!(expected, order);
        assert_eq!(("low".to_string(), "single".to_string()), order[0]);
    }

    fn family_order(plan: &SweepPlan) -> Vec<String> {
        let mut driver = SweepDriver::new(Configuration::default());
        let mut order: Vec<String> = Vec::new();
        driver
            .run_mechanisms(plan, |config| -> Result<(), ConfigError> {
                let family = encode(config).decode().mech_type;
                if order.last() != Some(&family) {
                    order.push(family);
                }
                Ok(())
            })
            .unwrap();
        order
    }

    #[test]
    fn visits_families_in_declared_order() {
        let mut plan = plan();
        assert_eq!(vec!["scale_sche_joint", "no_scale"], family_order(&plan));

        plan.mech_scale_sche.reverse();
        assert_eq!(vec!["no_scale", "scale_sche_joint"], family_order(&plan));
    }

    #[test]
    fn callback_error_aborts_and_restores_baseline() {
        let plan = plan();
        let mut driver = SweepDriver::new(Configuration::default());
        let mut calls = 0;

        let err = driver
            .run(&plan, |_| {
                calls += 1;
                if calls == 5 {
                    Err(ConfigError::UnknownAxis("stop".to_string()))
                } else {
                    Ok(())
                }
            })
            .unwrap_err();

        assert_eq!(ConfigError::UnknownAxis("stop".to_string()), err);
        assert_eq!(5, calls);
        assert_eq!(&Configuration::default(), driver.config());
    }

    #[test]
    fn run_mechanisms_keeps_scalars() {
        let plan = plan();
        let baseline = Configuration {
            request_freq: "high".to_string(),
            ..Default::default()
        };
        let mut driver = SweepDriver::new(baseline);
        let visited = driver
            .run_mechanisms(&plan, |config| -> Result<(), ConfigError> {
                assert_eq!("high", config.request_freq);
                Ok(())
            })
            .unwrap();
        assert_eq!(26, visited);
    }

    #[test]
    fn validate_reports_unknown_candidates() {
        let mut plan = plan();
        plan.mech_scale_sche
            .get_mut(&MechType::NoScale)
            .unwrap()
            .sche
            .push(Choice::new("nonsense", ""));
        assert!(matches!(
            plan.validate(),
            Err(ConfigError::UnknownCandidate { .. })
        ));
    }
}
