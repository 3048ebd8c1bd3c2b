//! CSV loading into a keyed [`Table`] using Polars

use std::path::Path;

use anyhow::Context;
use log::info;
use polars::prelude::*;

use crate::table::{Column, RowId, Table};

/// Load a CSV file, using `key` as the row identifier
///
/// # Arguments
/// * `path` - Path to the CSV file (with header)
/// * `key` - Integer column holding unique row ids, e.g. `Loyalty#`
///
/// # Returns
/// * Table with every other column, kinds inferred from the CSV dtypes
pub fn load_table(path: impl AsRef<Path>, key: &str) -> anyhow::Result<Table> {
    let path = path.as_ref();
    let df = LazyCsvReader::new(path)
        .with_has_header(true)
        .finish()
        .and_then(|lf| lf.collect())
        .with_context(|| format!("cannot read {}", path.display()))?;

    info!("loaded {} rows from {}", df.height(), path.display());
    dataframe_to_table(&df, key)
}

/// Load two CSV files and left-join the second onto the first by `key`
///
/// Mirrors the customer/flight import: every row of `left` is kept, columns
/// of `right` are appended. Keys must stay unique after the join.
pub fn load_joined(left: impl AsRef<Path>, right: impl AsRef<Path>, key: &str) -> anyhow::Result<Table> {
    let (left, right) = (left.as_ref(), right.as_ref());
    let left_lf = LazyCsvReader::new(left)
        .with_has_header(true)
        .finish()
        .with_context(|| format!("cannot read {}", left.display()))?;
    let right_lf = LazyCsvReader::new(right)
        .with_has_header(true)
        .finish()
        .with_context(|| format!("cannot read {}", right.display()))?;

    let df = left_lf
        .join(right_lf, [col(key)], [col(key)], JoinArgs::new(JoinType::Left))
        .collect()
        .with_context(|| format!("cannot join {} and {} on '{}'", left.display(), right.display(), key))?;

    info!(
        "joined {} and {}: {} rows x {} columns",
        left.display(),
        right.display(),
        df.height(),
        df.width()
    );
    dataframe_to_table(&df, key)
}

/// Convert a DataFrame into a Table keyed by `key`
///
/// Boolean columns stay boolean, numeric dtypes become `f64`, anything else
/// is read as text.
pub fn dataframe_to_table(df: &DataFrame, key: &str) -> anyhow::Result<Table> {
    let row_ids = df
        .column(key)?
        .cast(&DataType::Int64)?
        .i64()?
        .into_iter()
        .enumerate()
        .map(|(i, id)| id.with_context(|| format!("row {} has no '{}'", i, key)))
        .collect::<anyhow::Result<Vec<RowId>>>()?;

    let mut columns = Vec::with_capacity(df.width().saturating_sub(1));
    for series in df.get_columns() {
        let name = series.name();
        if name == key {
            continue;
        }
        let column = match series.dtype() {
            DataType::Boolean => Column::boolean(name, series.bool()?.into_iter().collect()),
            dtype if dtype.is_numeric() => {
                Column::numeric(name, series.cast(&DataType::Float64)?.f64()?.into_iter().collect())
            }
            _ => Column::categorical(
                name,
                series
                    .cast(&DataType::String)?
                    .str()?
                    .into_iter()
                    .map(|v| v.map(str::to_string))
                    .collect(),
            ),
        };
        columns.push(column);
    }

    Ok(Table::new(row_ids, columns)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::ColumnKind;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_customers_csv() -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "Loyalty#,Province,Income,Married").unwrap();
        writeln!(file, "480934,Ontario,70146,true").unwrap();
        writeln!(file, "549612,Alberta,,false").unwrap();
        writeln!(file, "429460,British Columbia,21000,true").unwrap();
        file
    }

    fn create_flights_csv() -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "Loyalty#,NumFlights,PointsAccumulated").unwrap();
        writeln!(file, "480934,12,1500.5").unwrap();
        writeln!(file, "429460,3,200.0").unwrap();
        file
    }

    #[test]
    fn test_load_table() {
        let file = create_customers_csv();
        let table = load_table(file.path(), "Loyalty#").unwrap();

        assert_eq!(table.row_ids(), &[480934, 549612, 429460]);
        assert_eq!(table.column_names(), vec!["Province", "Income", "Married"]);
        assert_eq!(table.column("Province").unwrap().kind(), ColumnKind::Categorical);
        assert_eq!(table.column("Married").unwrap().kind(), ColumnKind::Boolean);

        let income = table.column("Income").unwrap();
        assert_eq!(income.kind(), ColumnKind::Numeric);
        assert_eq!(income.missing_count(), 1);
    }

    #[test]
    fn test_load_joined_keeps_left_rows() {
        let customers = create_customers_csv();
        let flights = create_flights_csv();
        let table = load_joined(customers.path(), flights.path(), "Loyalty#").unwrap();

        assert_eq!(table.n_rows(), 3);
        assert!(table.has_column("NumFlights"));
        assert!(table.has_column("PointsAccumulated"));
        let id_position = table.row_ids().iter().position(|&id| id == 549612).unwrap();
        assert_eq!(
            table.column("NumFlights").unwrap().as_numeric().unwrap()[id_position],
            None
        );
    }

    #[test]
    fn test_missing_key_column() {
        let file = create_customers_csv();
        assert!(load_table(file.path(), "CustomerID").is_err());
    }

    #[test]
    fn test_duplicate_keys_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "id,x").unwrap();
        writeln!(file, "1,2.0").unwrap();
        writeln!(file, "1,3.0").unwrap();
        assert!(load_table(file.path(), "id").is_err());
    }
}
