//! Missing-value imputation

use log::debug;

use crate::error::PipelineError;
use crate::table::{ColumnData, Table};

/// Fill missing values in the listed columns
///
/// # Arguments
/// * `table` - Input table, left untouched
/// * `numeric` - Columns whose gaps take the column median
/// * `boolean` - Flag columns whose gaps become `false` (or `0.0` for 0/1 numeric flags)
///
/// # Returns
/// * A new table with no missing entries in the listed columns
pub fn fill<S: AsRef<str>>(table: &Table, numeric: &[S], boolean: &[S]) -> crate::Result<Table> {
    let mut planned = Vec::with_capacity(numeric.len() + boolean.len());

    for name in numeric {
        let name = name.as_ref();
        let column = table.column(name)?;
        let values = column.as_numeric().ok_or_else(|| {
            PipelineError::Schema(format!(
                "column '{}' is {}, median imputation needs numeric",
                name,
                column.kind()
            ))
        })?;
        let fill_value = median(values).ok_or_else(|| {
            PipelineError::InsufficientData(format!(
                "column '{}' has no values to take a median from",
                name
            ))
        })?;
        debug!("imputing '{}' with median {}", name, fill_value);
        planned.push((table.position(name)?, fill_numeric(values, fill_value)));
    }

    for name in boolean {
        let name = name.as_ref();
        let column = table.column(name)?;
        let filled = match column.data() {
            ColumnData::Boolean(values) => {
                ColumnData::Boolean(values.iter().map(|v| Some(v.unwrap_or(false))).collect())
            }
            ColumnData::Numeric(values) => fill_numeric(values, 0.0),
            ColumnData::Categorical(_) => {
                return Err(PipelineError::Schema(format!(
                    "column '{}' is categorical, expected a boolean flag",
                    name
                )))
            }
        };
        planned.push((table.position(name)?, filled));
    }

    let mut output = table.clone();
    for (position, data) in planned {
        output.replace_data(position, data);
    }
    Ok(output)
}

fn fill_numeric(values: &[Option<f64>], fill_value: f64) -> ColumnData {
    ColumnData::Numeric(
        values
            .iter()
            .map(|v| match v {
                Some(x) if !x.is_nan() => Some(*x),
                _ => Some(fill_value),
            })
            .collect(),
    )
}

/// Median of the present values, `None` when there are none
pub(crate) fn median(values: &[Option<f64>]) -> Option<f64> {
    let mut present: Vec<f64> = values
        .iter()
        .filter_map(|v| v.filter(|x| !x.is_nan()))
        .collect();
    if present.is_empty() {
        return None;
    }
    present.sort_by(f64::total_cmp);

    let mid = present.len() / 2;
    if present.len() % 2 == 0 {
        Some((present[mid - 1] + present[mid]) / 2.0)
    } else {
        Some(present[mid])
    }
}
