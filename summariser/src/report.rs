//! Grouped, aliased and averaged comparison reports over the records directory.
//!
//! A report specification selects fingerprints with `filter` and `targets_alias`, averages the
//! first `avg_cnt` runs of each, partitions the averages by one flat configuration field and
//! evaluates every declared value for every (group, alias) pair:
//!
//! ```yaml
//! avg_cnt: 3
//! filter:
//!   cold_start: high
//! targets_alias:
//! - [{sche: greedy.}, Greedy]
//! - [{sche: hash.}, Hash]
//! group:
//!   by: request_freq
//!   types: [low, middle, high]
//!   alias: Request frequency
//!   type_alias: [Low, Middle, High]
//! values:
//! - {alias: Cost, expr: cost}
//! - {alias: Latency, expr: {stack: [schedule_wait, cold_start_wait, data_recv_time, exec_time]}}
//! ```

use crate::aggregator::{average, spread, AggregateError};
use crate::expr::{ExprError, ValueExpr};
use crate::filter::{matches_all, select_fingerprints};
use crate::model::{ChartOutput, DerivedMetrics, ReportOutput, ReportRecord, SeriesOutput, SeriesValue};
use crate::partition::{group_by, Group};
use crate::telemetry::TelemetryLoader;
use campaign_core::prelude::{Fingerprint, FlatConfig};
use itertools::Itertools;
use polars::prelude::PolarsError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("avg_cnt must be at least 1")]
    ZeroAvgCnt,

    #[error("The group must declare at least one type")]
    NoGroupTypes,

    #[error("The group declares {types} types but {aliases} type aliases")]
    TypeAliasMismatch { types: usize, aliases: usize },

    #[error("Unknown flat configuration field `{0}`")]
    UnknownField(String),

    #[error("Configuration {fingerprint} has {found} runs, at least {required} are needed")]
    InsufficientSamples {
        fingerprint: String,
        found: usize,
        required: usize,
    },

    #[error("Configuration {fingerprint} has {field} = `{value}`, which is not a declared group type")]
    UndeclaredGroup {
        field: String,
        value: String,
        fingerprint: String,
    },

    #[error("No alias rule matches configuration {0}")]
    NoAliasMatch(String),

    #[error("No data for `{alias}` in group `{group}` of `{value}`, at least the first group should be complete")]
    NothingResolved {
        value: String,
        alias: String,
        group: String,
    },

    #[error("No data for `{alias}` in group `{group}` of `{value}`")]
    MissingValue {
        value: String,
        alias: String,
        group: String,
    },

    #[error("Failed to evaluate `{value}`: {source}")]
    Expr {
        value: String,
        #[source]
        source: ExprError,
    },

    #[error(transparent)]
    Aggregate(#[from] AggregateError),

    #[error("Failed to partition records: {0}")]
    Frame(#[from] PolarsError),
}

/// A predicate over flat configuration fields and the label of the configurations it matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasRule(pub BTreeMap<String, String>, pub String);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSpec {
    /// The flat configuration field to partition by
    pub by: String,
    /// Declared values of `by`, in display order
    pub types: Vec<String>,
    #[serde(default)]
    pub alias: String,
    /// Display labels for `types`. Empty means the types themselves are shown.
    #[serde(default)]
    pub type_alias: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueSpec {
    pub alias: String,
    pub expr: ValueExpr,
}

/// What to do when a (group, alias) pair has no record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
    /// Fill the gap with zeros shaped like the values resolved before it
    #[default]
    ZeroPlaceholder,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSpec {
    pub avg_cnt: usize,
    #[serde(default)]
    pub filter: BTreeMap<String, String>,
    pub targets_alias: Vec<AliasRule>,
    pub group: GroupSpec,
    pub values: Vec<ValueSpec>,
    #[serde(default)]
    pub fallback: FallbackPolicy,
}

impl ReportSpec {
    pub fn from_yaml(content: &str) -> serde_yaml::Result<Self> {
        serde_yaml::from_str(content)
    }

    pub fn validate(&self) -> Result<(), ReportError> {
        if self.avg_cnt == 0 {
            return Err(ReportError::ZeroAvgCnt);
        }
        if self.group.types.is_empty() {
            return Err(ReportError::NoGroupTypes);
        }
        if !self.group.type_alias.is_empty() && self.group.type_alias.len() != self.group.types.len()
        {
            return Err(ReportError::TypeAliasMismatch {
                types: self.group.types.len(),
                aliases: self.group.type_alias.len(),
            });
        }

        let probe = FlatConfig::default();
        let fields = std::iter::once(&self.group.by)
            .chain(self.filter.keys())
            .chain(self.targets_alias.iter().flat_map(|rule| rule.0.keys()));
        for field in fields {
            if probe.get(field).is_none() {
                return Err(ReportError::UnknownField(field.clone()));
            }
        }

        Ok(())
    }

    /// Group labels as displayed: the type aliases when given, otherwise the types.
    pub fn group_labels(&self) -> Vec<String> {
        if self.group.type_alias.is_empty() {
            self.group.types.clone()
        } else {
            self.group.type_alias.clone()
        }
    }

    /// Alias labels in rule order, each label once.
    pub fn alias_labels(&self) -> Vec<String> {
        self.targets_alias
            .iter()
            .map(|rule| rule.1.clone())
            .unique()
            .collect()
    }
}

/// The label of the first rule whose every predicate holds for `metrics`.
pub fn resolve_alias(metrics: &DerivedMetrics, rules: &[AliasRule]) -> Result<String, ReportError> {
    for rule in rules {
        if matches_all(&metrics.flat, &rule.0)? {
            return Ok(rule.1.clone());
        }
    }
    Err(ReportError::NoAliasMatch(metrics.fingerprint.clone()))
}

/// Every selected fingerprint of the first declared group must have at least `avg_cnt` runs.
pub fn check_min_samples(
    spec: &ReportSpec,
    selected: &BTreeMap<Fingerprint, Vec<String>>,
) -> Result<(), ReportError> {
    if spec.avg_cnt == 0 {
        return Err(ReportError::ZeroAvgCnt);
    }
    let first_group = spec.group.types.first().ok_or(ReportError::NoGroupTypes)?;

    for (fingerprint, files) in selected {
        let flat = fingerprint.decode();
        let value = flat
            .get(&spec.group.by)
            .ok_or_else(|| ReportError::UnknownField(spec.group.by.clone()))?;
        if value == first_group.as_str() && files.len() < spec.avg_cnt {
            return Err(ReportError::InsufficientSamples {
                fingerprint: fingerprint.to_string(),
                found: files.len(),
                required: spec.avg_cnt,
            });
        }
    }

    Ok(())
}

/// Run the whole report pipeline over the run files listed in `index`.
pub fn generate_report(
    spec: &ReportSpec,
    index: &BTreeMap<Fingerprint, Vec<String>>,
    loader: &TelemetryLoader,
) -> Result<ReportOutput, ReportError> {
    spec.validate()?;

    let selected = select_fingerprints(index, &spec.filter, &spec.targets_alias)?;
    log::info!("Selected {} configurations", selected.len());
    check_min_samples(spec, &selected)?;

    let mut averaged = Vec::with_capacity(selected.len());
    let mut runs = BTreeMap::new();
    for (fingerprint, files) in &selected {
        let files = &files[..files.len().min(spec.avg_cnt)];
        let loaded = loader.load_all(files);
        if loaded.is_empty() {
            log::warn!("No usable runs for {fingerprint}, leaving it out of the report");
            continue;
        }
        if loaded.len() < files.len() {
            log::warn!(
                "Averaging {} of {} runs for {fingerprint}",
                loaded.len(),
                files.len()
            );
        }
        let mean = average(&loaded)?;
        runs.insert(mean.fingerprint.clone(), loaded);
        averaged.push(mean);
    }

    let groups = group_by(averaged, &spec.group.by, &spec.group.types)?;
    let labels = spec.group_labels();

    let mut aliased = Vec::with_capacity(groups.len());
    let mut records = Vec::new();
    for (Group { records: members, .. }, label) in groups.into_iter().zip(&labels) {
        let mut entries = Vec::with_capacity(members.len());
        for metrics in members {
            let alias = resolve_alias(&metrics, &spec.targets_alias)?;
            records.push(ReportRecord {
                alias: alias.clone(),
                group: label.clone(),
                metrics: metrics.clone(),
            });
            entries.push(Entry {
                runs: runs.remove(&metrics.fingerprint).unwrap_or_default(),
                alias,
                mean: metrics,
            });
        }
        aliased.push(entries);
    }

    let charts = spec
        .values
        .iter()
        .map(|value| chart(spec, value, &aliased, &labels))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ReportOutput {
        group_by: spec.group.by.clone(),
        group_alias: spec.group.alias.clone(),
        groups: labels,
        charts,
        records,
    })
}

/// An averaged configuration of one group, with the runs it averages.
struct Entry {
    alias: String,
    mean: DerivedMetrics,
    runs: Vec<DerivedMetrics>,
}

fn chart(
    spec: &ReportSpec,
    value: &ValueSpec,
    groups: &[Vec<Entry>],
    labels: &[String],
) -> Result<ChartOutput, ReportError> {
    let eval = |metrics: &DerivedMetrics| {
        value.expr.eval(metrics).map_err(|source| ReportError::Expr {
            value: value.alias.clone(),
            source,
        })
    };
    let mut placeholder: Option<SeriesValue> = None;
    let mut series = Vec::new();

    for alias in spec.alias_labels() {
        let mut values = Vec::with_capacity(groups.len());
        let mut spreads = Vec::with_capacity(groups.len());
        let mut placeholders = Vec::new();

        for (entries, label) in groups.iter().zip(labels) {
            match entries.iter().find(|entry| entry.alias == alias) {
                Some(entry) => {
                    let resolved = eval(&entry.mean)?;
                    let per_run = entry.runs.iter().map(&eval).collect::<Result<Vec<_>, _>>()?;
                    let (per_run, _) = stack_bars(per_run);
                    placeholder = Some(resolved.zeroed());
                    spreads.push(spread(&per_run)?);
                    values.push(resolved);
                }
                None => {
                    if spec.fallback == FallbackPolicy::Error {
                        return Err(ReportError::MissingValue {
                            value: value.alias.clone(),
                            alias,
                            group: label.clone(),
                        });
                    }
                    let Some(zero) = &placeholder else {
                        return Err(ReportError::NothingResolved {
                            value: value.alias.clone(),
                            alias,
                            group: label.clone(),
                        });
                    };
                    log::warn!(
                        "No data for `{alias}` in group `{label}` of `{}`, using a zero placeholder",
                        value.alias
                    );
                    placeholders.push(label.clone());
                    spreads.push(zero.clone());
                    values.push(zero.clone());
                }
            }
        }

        let (values, bars) = stack_bars(values);
        series.push(SeriesOutput {
            alias,
            values,
            bars,
            spread: spreads,
            placeholders,
        });
    }

    Ok(ChartOutput {
        value: value.alias.clone(),
        series,
    })
}

/// Turn stacked values into running totals and arrange them per stack level.
///
/// Scalar series come back unchanged with a single bar row.
pub(crate) fn stack_bars(mut values: Vec<SeriesValue>) -> (Vec<SeriesValue>, Vec<Vec<f64>>) {
    let levels = match values.first() {
        Some(SeriesValue::Stack(components)) => components.len(),
        _ => {
            let row = values
                .iter()
                .map(|v| match v {
                    SeriesValue::Scalar(x) => *x,
                    SeriesValue::Stack(components) => components.iter().sum(),
                })
                .collect();
            return (values, vec![row]);
        }
    };

    for value in &mut values {
        if let SeriesValue::Stack(components) = value {
            for i in 1..components.len() {
                components[i] += components[i - 1];
            }
        }
    }

    let bars = (0..levels)
        .map(|level| {
            values.iter().map(|v| v.level(level)).collect()
        })
        .collect();

    (values, bars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::metrics;
    use pretty_assertions::assert_eq;

    fn spec(yaml: &str) -> ReportSpec {
        ReportSpec::from_yaml(yaml).unwrap()
    }

    const BASE: &str = r#"
avg_cnt: 2
targets_alias:
- [{sche: greedy.}, Greedy]
- [{sche: hash.}, Hash]
- [{}, Other]
group:
  by: request_freq
  types: [low, high]
values:
- {alias: Cost, expr: cost_per_req}
"#;

    #[test]
    fn parses_report_layout() {
        let spec = spec(BASE);
        assert_eq!(2, spec.avg_cnt);
        assert_eq!(3, spec.targets_alias.len());
        assert_eq!(vec!["low", "high"], spec.group_labels());
        assert_eq!(FallbackPolicy::ZeroPlaceholder, spec.fallback);
        spec.validate().unwrap();
    }

    #[test]
    fn validation_catches_bad_specs() {
        let mut bad = spec(BASE);
        bad.avg_cnt = 0;
        assert!(matches!(bad.validate(), Err(ReportError::ZeroAvgCnt)));

        let mut bad = spec(BASE);
        bad.group.type_alias = vec!["Low".to_string()];
        assert!(matches!(
            bad.validate(),
            Err(ReportError::TypeAliasMismatch { types: 2, aliases: 1 })
        ));

        let mut bad = spec(BASE);
        bad.group.by = "colour".to_string();
        assert!(matches!(bad.validate(), Err(ReportError::UnknownField(_))));
    }

    #[test]
    fn first_matching_rule_wins() {
        let rules = spec(BASE).targets_alias;
        let fp = "sd.rflow.dtsingle.cshigh.ftcpu.mtno_scale.scl(no.)(default.)(no.)[].scd(hash.).ic(lru.10)";
        assert_eq!("Hash", resolve_alias(&metrics("x", fp, 1.0, 1.0), &rules).unwrap());

        let fp = "sd.rflow.dtsingle.cshigh.ftcpu.mtno_scale.scl(no.)(default.)(no.)[].scd(pass.).ic(lru.10)";
        assert_eq!("Other", resolve_alias(&metrics("x", fp, 1.0, 1.0), &rules).unwrap());
        assert!(matches!(
            resolve_alias(&metrics("x", fp, 1.0, 1.0), &rules[..2]),
            Err(ReportError::NoAliasMatch(_))
        ));
    }

    #[test]
    fn stacks_become_running_totals() {
        let (values, bars) = stack_bars(vec![
            SeriesValue::Stack(vec![1.0, 2.0, 3.0]),
            SeriesValue::Stack(vec![4.0, 5.0, 6.0]),
        ]);
        assert_eq!(
            vec![
                SeriesValue::Stack(vec![1.0, 3.0, 6.0]),
                SeriesValue::Stack(vec![4.0, 9.0, 15.0])
            ],
            values
        );
        assert_eq!(vec![vec![1.0, 4.0], vec![3.0, 9.0], vec![6.0, 15.0]], bars);
    }

    #[test]
    fn scalars_form_one_bar_row() {
        let (values, bars) = stack_bars(vec![SeriesValue::Scalar(1.0), SeriesValue::Scalar(2.0)]);
        assert_eq!(vec![SeriesValue::Scalar(1.0), SeriesValue::Scalar(2.0)], values);
        assert_eq!(vec![vec![1.0, 2.0]], bars);
    }
}
