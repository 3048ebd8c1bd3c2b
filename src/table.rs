//! Column-oriented table with stable row identifiers

use std::collections::HashSet;
use std::fmt;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Stable identifier of a row; survives filtering and splitting
pub type RowId = i64;

/// Declared kind of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Numeric,
    Boolean,
    Categorical,
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnKind::Numeric => write!(f, "numeric"),
            ColumnKind::Boolean => write!(f, "boolean"),
            ColumnKind::Categorical => write!(f, "categorical"),
        }
    }
}

/// A column name plus the kind the caller expects it to have
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub kind: ColumnKind,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    pub fn numeric(name: impl Into<String>) -> Self {
        Self::new(name, ColumnKind::Numeric)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, ColumnKind::Boolean)
    }

    pub fn categorical(name: impl Into<String>) -> Self {
        Self::new(name, ColumnKind::Categorical)
    }
}

/// Values of a single column. `None` marks a missing entry; a numeric `NaN`
/// is treated as missing as well.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Numeric(Vec<Option<f64>>),
    Boolean(Vec<Option<bool>>),
    Categorical(Vec<Option<String>>),
}

impl ColumnData {
    pub fn kind(&self) -> ColumnKind {
        match self {
            ColumnData::Numeric(_) => ColumnKind::Numeric,
            ColumnData::Boolean(_) => ColumnKind::Boolean,
            ColumnData::Categorical(_) => ColumnKind::Categorical,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ColumnData::Numeric(v) => v.len(),
            ColumnData::Boolean(v) => v.len(),
            ColumnData::Categorical(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the entry at `row` is missing
    pub fn is_missing(&self, row: usize) -> bool {
        match self {
            ColumnData::Numeric(v) => !matches!(v[row], Some(x) if !x.is_nan()),
            ColumnData::Boolean(v) => v[row].is_none(),
            ColumnData::Categorical(v) => v[row].is_none(),
        }
    }

    pub fn missing_count(&self) -> usize {
        (0..self.len()).filter(|&row| self.is_missing(row)).count()
    }

    /// Text form of the entry at `row`, `None` when missing
    pub fn text_at(&self, row: usize) -> Option<String> {
        if self.is_missing(row) {
            return None;
        }
        match self {
            ColumnData::Numeric(v) => v[row].map(|x| x.to_string()),
            ColumnData::Boolean(v) => v[row].map(|b| b.to_string()),
            ColumnData::Categorical(v) => v[row].clone(),
        }
    }

    fn take(&self, positions: &[usize]) -> ColumnData {
        match self {
            ColumnData::Numeric(v) => ColumnData::Numeric(positions.iter().map(|&i| v[i]).collect()),
            ColumnData::Boolean(v) => ColumnData::Boolean(positions.iter().map(|&i| v[i]).collect()),
            ColumnData::Categorical(v) => {
                ColumnData::Categorical(positions.iter().map(|&i| v[i].clone()).collect())
            }
        }
    }
}

/// A named column
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    name: String,
    data: ColumnData,
}

impl Column {
    pub fn new(name: impl Into<String>, data: ColumnData) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    /// Numeric column; `NaN` entries are stored as missing
    pub fn numeric(name: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        let values = values
            .into_iter()
            .map(|v| v.filter(|x| !x.is_nan()))
            .collect();
        Self::new(name, ColumnData::Numeric(values))
    }

    /// Numeric column from plain floats, `NaN` marking missing entries
    pub fn from_f64(name: impl Into<String>, values: &[f64]) -> Self {
        Self::numeric(name, values.iter().map(|&x| Some(x)).collect())
    }

    pub fn boolean(name: impl Into<String>, values: Vec<Option<bool>>) -> Self {
        Self::new(name, ColumnData::Boolean(values))
    }

    pub fn categorical<S: Into<String>>(name: impl Into<String>, values: Vec<Option<S>>) -> Self {
        let values = values.into_iter().map(|v| v.map(Into::into)).collect();
        Self::new(name, ColumnData::Categorical(values))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ColumnKind {
        self.data.kind()
    }

    pub fn data(&self) -> &ColumnData {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn missing_count(&self) -> usize {
        self.data.missing_count()
    }

    /// Numeric values, or `None` when the column is not numeric
    pub fn as_numeric(&self) -> Option<&[Option<f64>]> {
        match &self.data {
            ColumnData::Numeric(v) => Some(v),
            _ => None,
        }
    }
}

/// Ordered collection of equally long named columns keyed by row id
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    row_ids: Vec<RowId>,
    columns: Vec<Column>,
}

impl Table {
    /// Build a table, checking column lengths, name and row id uniqueness
    pub fn new(row_ids: Vec<RowId>, columns: Vec<Column>) -> crate::Result<Self> {
        let n_rows = row_ids.len();

        let mut names = HashSet::new();
        for column in &columns {
            if !names.insert(column.name()) {
                return Err(PipelineError::Schema(format!(
                    "duplicate column name '{}'",
                    column.name()
                )));
            }
            if column.len() != n_rows {
                return Err(PipelineError::Schema(format!(
                    "column '{}' has {} rows, expected {}",
                    column.name(),
                    column.len(),
                    n_rows
                )));
            }
        }

        let mut seen = HashSet::with_capacity(n_rows);
        if let Some(dup) = row_ids.iter().find(|id| !seen.insert(**id)) {
            return Err(PipelineError::Schema(format!("duplicate row id {}", dup)));
        }

        Ok(Self { row_ids, columns })
    }

    /// Build a table whose row ids are the positions `0..n`
    pub fn from_columns(columns: Vec<Column>) -> crate::Result<Self> {
        let n_rows = columns.first().map_or(0, Column::len);
        Self::new((0..n_rows as RowId).collect(), columns)
    }

    pub fn n_rows(&self) -> usize {
        self.row_ids.len()
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn row_ids(&self) -> &[RowId] {
        &self.row_ids
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(Column::name).collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name() == name)
    }

    /// Look up a column, failing with a schema error when absent
    pub fn column(&self, name: &str) -> crate::Result<&Column> {
        self.columns
            .iter()
            .find(|c| c.name() == name)
            .ok_or_else(|| PipelineError::missing_column(name))
    }

    pub(crate) fn position(&self, name: &str) -> crate::Result<usize> {
        self.columns
            .iter()
            .position(|c| c.name() == name)
            .ok_or_else(|| PipelineError::missing_column(name))
    }

    pub(crate) fn replace_data(&mut self, position: usize, data: ColumnData) {
        debug_assert_eq!(data.len(), self.n_rows());
        self.columns[position].data = data;
    }

    /// New table holding the rows at `positions`, in that order
    pub fn take_rows(&self, positions: &[usize]) -> Table {
        Table {
            row_ids: positions.iter().map(|&i| self.row_ids[i]).collect(),
            columns: self
                .columns
                .iter()
                .map(|c| Column::new(c.name(), c.data.take(positions)))
                .collect(),
        }
    }

    /// New table holding only the named columns, in the given order
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> crate::Result<Table> {
        let columns = names
            .iter()
            .map(|name| self.column(name.as_ref()).cloned())
            .collect::<crate::Result<Vec<_>>>()?;
        Table::new(self.row_ids.clone(), columns)
    }

    /// Split off one column, returning the remaining table and the column
    pub fn without_column(&self, name: &str) -> crate::Result<(Table, Column)> {
        let position = self.position(name)?;
        let mut columns = self.columns.clone();
        let removed = columns.remove(position);
        Ok((
            Table {
                row_ids: self.row_ids.clone(),
                columns,
            },
            removed,
        ))
    }

    /// Row-major feature matrix; every column must be numeric and complete
    pub fn to_matrix(&self) -> crate::Result<Array2<f64>> {
        let mut matrix = Array2::zeros((self.n_rows(), self.n_cols()));
        for (j, column) in self.columns.iter().enumerate() {
            let values = column.as_numeric().ok_or_else(|| {
                PipelineError::Schema(format!(
                    "column '{}' is {}, expected numeric",
                    column.name(),
                    column.kind()
                ))
            })?;
            for (i, value) in values.iter().enumerate() {
                match value {
                    Some(x) if !x.is_nan() => matrix[[i, j]] = *x,
                    _ => {
                        return Err(PipelineError::Schema(format!(
                            "column '{}' has a missing value at row id {}",
                            column.name(),
                            self.row_ids[i]
                        )))
                    }
                }
            }
        }
        Ok(matrix)
    }
}
