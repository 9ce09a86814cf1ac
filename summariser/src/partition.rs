use crate::model::DerivedMetrics;
use crate::report::ReportError;
use polars::prelude::*;

const ROW: &str = "row";

/// Records sharing one value of the grouping field.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub label: String,
    pub records: Vec<DerivedMetrics>,
}

/// Partition `records` by the value of a flat configuration field.
///
/// Groups come back in the order of `order`, one per declared label, even when a group ends up
/// empty. Records keep their input order within a group. A record whose value is not declared is an
/// error.
pub fn group_by(
    records: Vec<DerivedMetrics>,
    field: &str,
    order: &[String],
) -> Result<Vec<Group>, ReportError> {
    let values = records
        .iter()
        .map(|r| {
            r.flat
                .get(field)
                .ok_or_else(|| ReportError::UnknownField(field.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;
    let frame = DataFrame::new(vec![
        Column::new(ROW.into(), (0..records.len() as u32).collect::<Vec<_>>()),
        Column::new(field.into(), values),
    ])?;

    let undeclared = order.iter().fold(lit(true), |expr, label| {
        expr.and(col(field).neq(lit(label.as_str())))
    });
    if let Some(&row) = rows(&frame, undeclared)?.first() {
        let record = &records[row];
        return Err(ReportError::UndeclaredGroup {
            field: field.to_string(),
            value: record.flat.get(field).unwrap_or_default().to_string(),
            fingerprint: record.fingerprint.clone(),
        });
    }

    let mut slots = records.into_iter().map(Some).collect::<Vec<_>>();
    order
        .iter()
        .map(|label| -> Result<Group, ReportError> {
            let members = rows(&frame, col(field).eq(lit(label.as_str())))?;
            Ok(Group {
                label: label.clone(),
                records: members
                    .into_iter()
                    .filter_map(|row| slots[row].take())
                    .collect(),
            })
        })
        .collect()
}

/// Input positions of the rows matching `predicate`, in input order.
fn rows(frame: &DataFrame, predicate: Expr) -> PolarsResult<Vec<usize>> {
    let selected = frame
        .clone()
        .lazy()
        .filter(predicate)
        .select([col(ROW)])
        .collect()?;
    Ok(selected
        .column(ROW)?
        .u32()?
        .into_iter()
        .flatten()
        .map(|row| row as usize)
        .collect())
}
