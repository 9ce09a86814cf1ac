use crate::expr::{Metric, ValueExpr};
use crate::report::{AliasRule, FallbackPolicy, GroupSpec, ReportSpec, ValueSpec};
use campaign_core::prelude::{FlatConfig, Fingerprint};
use itertools::Itertools;
use std::collections::BTreeMap;

/// The field starter reports are grouped by.
const SCAFFOLD_GROUP_BY: &str = "cold_start";

/// A starter report covering every fingerprint in `index`.
///
/// Each fingerprint gets an alias rule that pins all of its flat fields and is labelled with the
/// fingerprint itself, so the report can be trimmed down by hand afterwards.
pub fn scaffold_report(index: &BTreeMap<Fingerprint, Vec<String>>, avg_cnt: usize) -> ReportSpec {
    let flats = index
        .keys()
        .map(|fingerprint| (fingerprint, fingerprint.decode()))
        .collect::<Vec<_>>();

    let targets_alias = flats
        .iter()
        .map(|(fingerprint, flat)| AliasRule(pinned_fields(flat), fingerprint.to_string()))
        .collect();

    let types = flats
        .iter()
        .filter_map(|(_, flat)| flat.get(SCAFFOLD_GROUP_BY))
        .map(str::to_string)
        .unique()
        .sorted()
        .collect();

    ReportSpec {
        avg_cnt,
        filter: BTreeMap::new(),
        targets_alias,
        group: GroupSpec {
            by: SCAFFOLD_GROUP_BY.to_string(),
            types,
            alias: String::new(),
            type_alias: Vec::new(),
        },
        values: default_values(),
        fallback: FallbackPolicy::default(),
    }
}

fn pinned_fields(flat: &FlatConfig) -> BTreeMap<String, String> {
    FlatConfig::FIELD_NAMES
        .into_iter()
        .filter_map(|field| flat.get(field).map(|value| (field.to_string(), value.to_string())))
        .collect()
}

fn default_values() -> Vec<ValueSpec> {
    use Metric::*;
    let metric = ValueExpr::metric;

    vec![
        ValueSpec {
            alias: "Cost".to_string(),
            expr: metric(Cost),
        },
        ValueSpec {
            alias: "Latency".to_string(),
            expr: ValueExpr::stack(vec![
                metric(ScheduleWait),
                metric(ColdStartWait),
                metric(DataRecvTime),
                metric(ExecTime),
            ]),
        },
        ValueSpec {
            alias: "Quality-Price Ratio".to_string(),
            expr: ValueExpr::ratio(
                ValueExpr::ratio(metric(Throughput), metric(Cost)),
                metric(Latency),
            ),
        },
        ValueSpec {
            alias: "Throughput".to_string(),
            expr: ValueExpr::product(vec![metric(Throughput), ValueExpr::Const(1000.0)]),
        },
        ValueSpec {
            alias: "Avg Container Count".to_string(),
            expr: metric(AvgContainers),
        },
    ]
}
