//! Threshold-based outlier removal

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::table::Table;

/// Inclusive keep-range for one numeric column; an absent side is unbounded
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    #[serde(default)]
    pub lower: Option<f64>,
    #[serde(default)]
    pub upper: Option<f64>,
}

impl Bounds {
    pub fn new(lower: Option<f64>, upper: Option<f64>) -> Self {
        Self { lower, upper }
    }

    pub fn lower(lower: f64) -> Self {
        Self::new(Some(lower), None)
    }

    pub fn upper(upper: f64) -> Self {
        Self::new(None, Some(upper))
    }

    pub fn between(lower: f64, upper: f64) -> Self {
        Self::new(Some(lower), Some(upper))
    }

    pub fn is_unbounded(&self) -> bool {
        self.lower.is_none() && self.upper.is_none()
    }

    /// Whether `value` falls outside the provided bounds
    pub fn rejects(&self, value: f64) -> bool {
        self.lower.is_some_and(|lo| value < lo) || self.upper.is_some_and(|hi| value > hi)
    }

    fn validate(&self, column: &str) -> crate::Result<()> {
        if self.lower.is_some_and(f64::is_nan) || self.upper.is_some_and(f64::is_nan) {
            return Err(PipelineError::InvalidArgument(format!(
                "threshold for '{}' has a NaN bound",
                column
            )));
        }
        if let (Some(lo), Some(hi)) = (self.lower, self.upper) {
            if lo > hi {
                return Err(PipelineError::InvalidArgument(format!(
                    "threshold for '{}' has lower bound {} above upper bound {}",
                    column, lo, hi
                )));
            }
        }
        Ok(())
    }
}

/// Column name to bounds, iterated in name order
pub type ThresholdMap = BTreeMap<String, Bounds>;

/// Drop every row that violates any threshold
///
/// Offending rows are collected for all columns first and removed in a single
/// pass, so the outcome does not depend on the order of the map. Missing
/// values never offend.
///
/// # Arguments
/// * `table` - Input table, left untouched
/// * `thresholds` - Bounds per numeric column
///
/// # Returns
/// * A new table without the offending rows
pub fn remove_outliers(table: &Table, thresholds: &ThresholdMap) -> crate::Result<Table> {
    for (name, bounds) in thresholds {
        let column = table.column(name)?;
        if column.as_numeric().is_none() {
            return Err(PipelineError::Schema(format!(
                "column '{}' is {}, thresholds need numeric",
                name,
                column.kind()
            )));
        }
        bounds.validate(name)?;
    }

    let mut to_remove = BTreeSet::new();
    for (name, bounds) in thresholds {
        if bounds.is_unbounded() {
            warn!("threshold for '{}' has no bounds, ignoring it", name);
            continue;
        }
        let values = table.column(name)?.as_numeric().unwrap_or_default();
        let before = to_remove.len();
        for (row, value) in values.iter().enumerate() {
            if matches!(value, Some(x) if bounds.rejects(*x)) {
                to_remove.insert(row);
            }
        }
        debug!(
            "threshold on '{}' flags {} new rows",
            name,
            to_remove.len() - before
        );
    }

    let keep: Vec<usize> = (0..table.n_rows())
        .filter(|row| !to_remove.contains(row))
        .collect();
    debug!(
        "removing {} of {} rows as outliers",
        to_remove.len(),
        table.n_rows()
    );
    Ok(table.take_rows(&keep))
}
