//! Declarative value expressions for report series.
//!
//! An expression is a metric name, a constant, or one of a few combinators:
//!
//! ```yaml
//! expr: cost
//! expr: {product: [throughput, 1000]}
//! expr: {ratio: [{ratio: [throughput, cost]}, latency]}
//! expr: {stack: [schedule_wait, cold_start_wait, data_recv_time, exec_time]}
//! ```

use crate::model::{DerivedMetrics, SeriesValue};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExprError {
    #[error("A stacked value can only be the whole expression, not an operand")]
    NestedStack,

    #[error("`{0}` needs at least one operand")]
    NoOperands(&'static str),
}

/// The metrics of [DerivedMetrics] that expressions can refer to.
///
/// The aliases are the names older report files used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    #[serde(alias = "cost_per_req")]
    Cost,
    #[serde(alias = "time_per_req")]
    Latency,
    LatencyStd,
    LatencyP90,
    Score,
    #[serde(alias = "rps")]
    Throughput,
    #[serde(alias = "coldstart_time_per_req")]
    ColdStartWait,
    #[serde(alias = "waitsche_time_per_req")]
    ScheduleWait,
    #[serde(alias = "datarecv_time_per_req")]
    DataRecvTime,
    #[serde(alias = "exe_time_per_req")]
    ExecTime,
    AlgoExecTime,
    #[serde(alias = "fn_container_cnt")]
    AvgContainers,
    UnfinishedRequests,
}

impl Metric {
    pub const ALL: [Metric; 13] = [
        Metric::Cost,
        Metric::Latency,
        Metric::LatencyStd,
        Metric::LatencyP90,
        Metric::Score,
        Metric::Throughput,
        Metric::ColdStartWait,
        Metric::ScheduleWait,
        Metric::DataRecvTime,
        Metric::ExecTime,
        Metric::AlgoExecTime,
        Metric::AvgContainers,
        Metric::UnfinishedRequests,
    ];

    /// The canonical name, as written in report files.
    pub fn name(self) -> &'static str {
        match self {
            Metric::Cost => "cost",
            Metric::Latency => "latency",
            Metric::LatencyStd => "latency_std",
            Metric::LatencyP90 => "latency_p90",
            Metric::Score => "score",
            Metric::Throughput => "throughput",
            Metric::ColdStartWait => "cold_start_wait",
            Metric::ScheduleWait => "schedule_wait",
            Metric::DataRecvTime => "data_recv_time",
            Metric::ExecTime => "exec_time",
            Metric::AlgoExecTime => "algo_exec_time",
            Metric::AvgContainers => "avg_containers",
            Metric::UnfinishedRequests => "unfinished_requests",
        }
    }

    pub fn value(self, metrics: &DerivedMetrics) -> f64 {
        match self {
            Metric::Cost => metrics.cost,
            Metric::Latency => metrics.latency,
            Metric::LatencyStd => metrics.latency_std,
            Metric::LatencyP90 => metrics.latency_p90,
            Metric::Score => metrics.score,
            Metric::Throughput => metrics.throughput,
            Metric::ColdStartWait => metrics.cold_start_wait,
            Metric::ScheduleWait => metrics.schedule_wait,
            Metric::DataRecvTime => metrics.data_recv_time,
            Metric::ExecTime => metrics.exec_time,
            Metric::AlgoExecTime => metrics.algo_exec_time,
            Metric::AvgContainers => metrics.avg_containers,
            Metric::UnfinishedRequests => metrics.unfinished_requests,
        }
    }

    pub fn value_mut(self, metrics: &mut DerivedMetrics) -> &mut f64 {
        match self {
            Metric::Cost => &mut metrics.cost,
            Metric::Latency => &mut metrics.latency,
            Metric::LatencyStd => &mut metrics.latency_std,
            Metric::LatencyP90 => &mut metrics.latency_p90,
            Metric::Score => &mut metrics.score,
            Metric::Throughput => &mut metrics.throughput,
            Metric::ColdStartWait => &mut metrics.cold_start_wait,
            Metric::ScheduleWait => &mut metrics.schedule_wait,
            Metric::DataRecvTime => &mut metrics.data_recv_time,
            Metric::ExecTime => &mut metrics.exec_time,
            Metric::AlgoExecTime => &mut metrics.algo_exec_time,
            Metric::AvgContainers => &mut metrics.avg_containers,
            Metric::UnfinishedRequests => &mut metrics.unfinished_requests,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ValueExpr {
    Metric(Metric),
    Const(f64),
    Sum(SumExpr),
    Product(ProductExpr),
    Ratio(RatioExpr),
    Stack(StackExpr),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SumExpr {
    pub sum: Vec<ValueExpr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProductExpr {
    pub product: Vec<ValueExpr>,
}

/// Numerator divided by denominator, or 0 when the denominator is not positive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RatioExpr {
    pub ratio: (Box<ValueExpr>, Box<ValueExpr>),
}

/// Components of a stacked bar, bottom first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StackExpr {
    pub stack: Vec<ValueExpr>,
}

impl ValueExpr {
    pub fn metric(metric: Metric) -> Self {
        ValueExpr::Metric(metric)
    }

    pub fn sum(operands: Vec<ValueExpr>) -> Self {
        ValueExpr::Sum(SumExpr { sum: operands })
    }

    pub fn product(operands: Vec<ValueExpr>) -> Self {
        ValueExpr::Product(ProductExpr { product: operands })
    }

    pub fn ratio(numerator: ValueExpr, denominator: ValueExpr) -> Self {
        ValueExpr::Ratio(RatioExpr {
            ratio: (Box::new(numerator), Box::new(denominator)),
        })
    }

    pub fn stack(components: Vec<ValueExpr>) -> Self {
        ValueExpr::Stack(StackExpr { stack: components })
    }

    /// Evaluate against one record.
    pub fn eval(&self, metrics: &DerivedMetrics) -> Result<SeriesValue, ExprError> {
        match self {
            ValueExpr::Stack(StackExpr { stack: components }) => {
                if components.is_empty() {
                    return Err(ExprError::NoOperands("stack"));
                }
                components
                    .iter()
                    .map(|c| c.scalar(metrics))
                    .collect::<Result<Vec<_>, _>>()
                    .map(SeriesValue::Stack)
            }
            _ => self.scalar(metrics).map(SeriesValue::Scalar),
        }
    }

    fn scalar(&self, metrics: &DerivedMetrics) -> Result<f64, ExprError> {
        match self {
            ValueExpr::Metric(metric) => Ok(metric.value(metrics)),
            ValueExpr::Const(value) => Ok(*value),
            ValueExpr::Sum(SumExpr { sum: operands }) => {
                if operands.is_empty() {
                    return Err(ExprError::NoOperands("sum"));
                }
                operands.iter().map(|o| o.scalar(metrics)).sum()
            }
            ValueExpr::Product(ProductExpr { product: operands }) => {
                if operands.is_empty() {
                    return Err(ExprError::NoOperands("product"));
                }
                operands.iter().map(|o| o.scalar(metrics)).product()
            }
            ValueExpr::Ratio(RatioExpr {
                ratio: (numerator, denominator),
            }) => {
                let denominator = denominator.scalar(metrics)?;
                if denominator > 0.0 {
                    Ok(numerator.scalar(metrics)? / denominator)
                } else {
                    Ok(0.0)
                }
            }
            ValueExpr::Stack(_) => Err(ExprError::NestedStack),
        }
    }
}
