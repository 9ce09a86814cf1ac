use crate::expr::Metric;
use crate::model::{DerivedMetrics, SeriesValue};
use polars::prelude::*;
use thiserror::Error;

const FINGERPRINT: &str = "fingerprint";

#[derive(Error, Debug)]
pub enum AggregateError {
    #[error("No records to average")]
    Empty,

    #[error("Cannot average runs of different configurations: {expected} and {found}")]
    FingerprintMismatch { expected: String, found: String },

    #[error("Failed to aggregate runs: {0}")]
    Frame(#[from] PolarsError),
}

/// One row per record: the fingerprint and every [Metric].
fn metrics_frame(records: &[DerivedMetrics]) -> PolarsResult<DataFrame> {
    let mut columns = Vec::with_capacity(Metric::ALL.len() + 1);
    columns.push(Column::new(
        FINGERPRINT.into(),
        records
            .iter()
            .map(|r| r.fingerprint.as_str())
            .collect::<Vec<_>>(),
    ));
    for metric in Metric::ALL {
        columns.push(Column::new(
            metric.name().into(),
            records.iter().map(|r| metric.value(r)).collect::<Vec<_>>(),
        ));
    }
    DataFrame::new(columns)
}

/// Field-wise arithmetic mean of records that share one fingerprint, with the population standard
/// deviation of every metric in `spread`.
///
/// Non-numeric fields are taken from the first record. `sample_count` of the result is the number
/// of records averaged.
pub fn average(records: &[DerivedMetrics]) -> Result<DerivedMetrics, AggregateError> {
    let first = records.first().ok_or(AggregateError::Empty)?;

    let stats = metrics_frame(records)?
        .lazy()
        .group_by_stable([col(FINGERPRINT)])
        .agg(
            Metric::ALL
                .iter()
                .flat_map(|metric| {
                    let name = metric.name();
                    [
                        col(name).mean().alias(format!("{name}_mean")),
                        col(name).std(0).alias(format!("{name}_std")),
                    ]
                })
                .collect::<Vec<_>>(),
        )
        .collect()?;

    if stats.height() > 1 {
        let fingerprints = stats.column(FINGERPRINT)?.str()?;
        return Err(AggregateError::FingerprintMismatch {
            expected: first.fingerprint.clone(),
            found: fingerprints.get(1).unwrap_or_default().to_string(),
        });
    }

    let mut averaged = first.clone();
    averaged.sample_count = records.len();
    averaged.spread.clear();
    for metric in Metric::ALL {
        let name = metric.name();
        let mean = stats.column(&format!("{name}_mean"))?.f64()?.get(0);
        let std = stats.column(&format!("{name}_std"))?.f64()?.get(0);
        *metric.value_mut(&mut averaged) = mean.unwrap_or_default();
        averaged.spread.insert(metric, std.unwrap_or_default());
    }
    Ok(averaged)
}

/// Population standard deviation across runs of each level of a series value.
///
/// `runs` holds one value per run, all of the same shape, and the result has that shape too.
pub(crate) fn spread(runs: &[SeriesValue]) -> Result<SeriesValue, AggregateError> {
    let first = runs.first().ok_or(AggregateError::Empty)?;
    let levels = match first {
        SeriesValue::Scalar(_) => 1,
        SeriesValue::Stack(components) => components.len(),
    };

    let frame = DataFrame::new(
        (0..levels)
            .map(|level| {
                Column::new(
                    format!("level_{level}").into(),
                    runs.iter().map(|v| v.level(level)).collect::<Vec<_>>(),
                )
            })
            .collect(),
    )?;
    let stds = frame
        .get_columns()
        .iter()
        .map(|column| column.as_materialized_series().std(0).unwrap_or_default())
        .collect::<Vec<_>>();

    Ok(match first {
        SeriesValue::Scalar(_) => SeriesValue::Scalar(stds.first().copied().unwrap_or_default()),
        SeriesValue::Stack(_) => SeriesValue::Stack(stds),
    })
}
