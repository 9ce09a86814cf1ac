use crate::expr::Metric;
use campaign_core::prelude::FlatConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Statistics derived from one run file, or the mean over several.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DerivedMetrics {
    /// The run file these metrics were derived from. For an average, the first file averaged.
    pub file_name: String,
    pub fingerprint: String,
    pub flat: FlatConfig,
    /// Number of runs averaged into this record
    pub sample_count: usize,

    pub cost: f64,
    /// Mean request completion time
    pub latency: f64,
    pub latency_std: f64,
    pub latency_p90: f64,
    pub score: f64,
    /// Completed requests per frame over the whole run
    pub throughput: f64,
    pub cold_start_wait: f64,
    pub schedule_wait: f64,
    pub data_recv_time: f64,
    pub exec_time: f64,
    pub algo_exec_time: f64,
    /// Containers per frame over the whole run
    pub avg_containers: f64,
    /// Requests still running in the final frame
    pub unfinished_requests: f64,

    /// Population standard deviation of every metric across the averaged runs. Empty for a record
    /// derived from a single run file.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub spread: BTreeMap<Metric, f64>,
}

/// A value of a report series: one number, or the components of a stacked bar.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum SeriesValue {
    Scalar(f64),
    Stack(Vec<f64>),
}

impl SeriesValue {
    /// A zero value of the same shape.
    pub fn zeroed(&self) -> Self {
        match self {
            SeriesValue::Scalar(_) => SeriesValue::Scalar(0.0),
            SeriesValue::Stack(v) => SeriesValue::Stack(vec![0.0; v.len()]),
        }
    }

    /// The component at stack `level`. A scalar spans every level.
    pub fn level(&self, level: usize) -> f64 {
        match self {
            SeriesValue::Scalar(x) => *x,
            SeriesValue::Stack(components) => components.get(level).copied().unwrap_or(0.0),
        }
    }
}

/// The values of one alias across every group of a report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SeriesOutput {
    pub alias: String,
    /// One value per group. Stacks hold running totals.
    pub values: Vec<SeriesValue>,
    /// The same values arranged per stack level, each level holding one number per group
    pub bars: Vec<Vec<f64>>,
    /// Standard deviation of each value across the runs it averages, shaped like `values`
    pub spread: Vec<SeriesValue>,
    /// Groups with no record for this alias, filled with a placeholder
    pub placeholders: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChartOutput {
    pub value: String,
    pub series: Vec<SeriesOutput>,
}

/// One aggregated fingerprint as it took part in a report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportRecord {
    pub alias: String,
    pub group: String,
    pub metrics: DerivedMetrics,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportOutput {
    pub group_by: String,
    pub group_alias: String,
    /// Group labels in declared order, using the display aliases where given
    pub groups: Vec<String>,
    pub charts: Vec<ChartOutput>,
    pub records: Vec<ReportRecord>,
}
