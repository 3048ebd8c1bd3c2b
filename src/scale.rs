//! Standard scaling of numeric columns

use std::collections::BTreeMap;

use log::debug;
use ndarray::Array1;

use crate::error::PipelineError;
use crate::table::{ColumnData, Table};

/// Fitted statistics of one column
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnScaling {
    pub mean: f64,
    /// Population standard deviation (divisor `n`); `0.0` for constant columns
    pub std: f64,
}

impl ColumnScaling {
    /// `(x - mean) / std`, or `0.0` when the column had no spread
    pub fn apply(&self, value: f64) -> f64 {
        if self.std == 0.0 {
            0.0
        } else {
            (value - self.mean) / self.std
        }
    }
}

/// Scaling statistics per column name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScalingParams {
    columns: BTreeMap<String, ColumnScaling>,
}

impl ScalingParams {
    pub fn get(&self, column: &str) -> Option<&ColumnScaling> {
        self.columns.get(column)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ColumnScaling)> {
        self.columns.iter().map(|(name, s)| (name.as_str(), s))
    }

    /// Scale another table with these statistics, e.g. a held-out split
    pub fn apply(&self, table: &Table) -> crate::Result<Table> {
        let mut planned = Vec::with_capacity(self.columns.len());
        for (name, scaling) in &self.columns {
            let values = numeric_values(table, name)?;
            planned.push((table.position(name)?, transform(values, scaling)));
        }

        let mut output = table.clone();
        for (position, data) in planned {
            output.replace_data(position, data);
        }
        Ok(output)
    }
}

/// Standardize the listed columns to zero mean and unit variance
///
/// Statistics come from the present values of `table` itself, using the
/// population standard deviation. Missing entries stay missing. A column
/// without spread is mapped to `0.0` on every present row instead of being
/// divided by zero.
///
/// # Returns
/// * The scaled table and the statistics that produced it
pub fn scale<S: AsRef<str>>(table: &Table, numeric: &[S]) -> crate::Result<(Table, ScalingParams)> {
    let mut params = ScalingParams::default();
    let mut planned = Vec::with_capacity(numeric.len());

    for name in numeric {
        let name = name.as_ref();
        let values = numeric_values(table, name)?;
        let present: Array1<f64> = values
            .iter()
            .filter_map(|v| v.filter(|x| !x.is_nan()))
            .collect();
        let mean = present.mean().ok_or_else(|| {
            PipelineError::InsufficientData(format!("column '{}' has no values to scale", name))
        })?;
        let mut std = present.std(0.0);
        if std < f64::EPSILON {
            debug!("column '{}' has zero variance, centering to 0", name);
            std = 0.0;
        }

        let scaling = ColumnScaling { mean, std };
        planned.push((table.position(name)?, transform(values, &scaling)));
        params.columns.insert(name.to_string(), scaling);
    }

    let mut output = table.clone();
    for (position, data) in planned {
        output.replace_data(position, data);
    }
    Ok((output, params))
}

fn numeric_values<'a>(table: &'a Table, name: &str) -> crate::Result<&'a [Option<f64>]> {
    let column = table.column(name)?;
    column.as_numeric().ok_or_else(|| {
        PipelineError::Schema(format!(
            "column '{}' is {}, scaling needs numeric",
            name,
            column.kind()
        ))
    })
}

fn transform(values: &[Option<f64>], scaling: &ColumnScaling) -> ColumnData {
    ColumnData::Numeric(
        values
            .iter()
            .map(|v| v.filter(|x| !x.is_nan()).map(|x| scaling.apply(x)))
            .collect(),
    )
}
