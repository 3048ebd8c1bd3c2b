//! Seeded train/test partitioning

use std::collections::HashMap;

use log::debug;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::encode::MISSING_TOKEN;
use crate::error::PipelineError;
use crate::table::Table;

/// How to partition a table
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SplitOptions {
    /// Share of rows that go to the test side, strictly between 0 and 1
    pub test_fraction: f64,
    pub seed: u64,
    /// Keep the target's class proportions in both partitions
    #[serde(default)]
    pub stratify: bool,
}

/// Features and target of both partitions. Target tables hold the single
/// target column and share row ids with their feature tables.
#[derive(Debug, Clone, PartialEq)]
pub struct Split {
    pub train_features: Table,
    pub train_target: Table,
    pub test_features: Table,
    pub test_target: Table,
}

/// Partition `table` into train and test rows
///
/// The same table, target, fraction and seed always give the same partition.
/// Rows keep their original relative order inside each partition.
///
/// # Arguments
/// * `table` - Input table, left untouched
/// * `target` - Label column, removed from the feature side
/// * `options` - Fraction, seed and stratification flag
pub fn split(table: &Table, target: &str, options: &SplitOptions) -> crate::Result<Split> {
    let fraction = options.test_fraction;
    if !(fraction > 0.0 && fraction < 1.0) {
        return Err(PipelineError::InvalidArgument(format!(
            "test fraction must be in (0, 1), got {}",
            fraction
        )));
    }
    let (features, target_column) = table.without_column(target)?;
    let n_rows = table.n_rows();
    if n_rows < 2 {
        return Err(PipelineError::InsufficientData(format!(
            "cannot split {} rows into two non-empty partitions",
            n_rows
        )));
    }

    let mut rng = ChaCha8Rng::seed_from_u64(options.seed);
    let mut is_test = vec![false; n_rows];

    if options.stratify {
        let data = target_column.data();
        let mut order: Vec<Option<String>> = Vec::new();
        let mut classes: HashMap<Option<String>, Vec<usize>> = HashMap::new();
        for row in 0..n_rows {
            let key = data.text_at(row);
            classes
                .entry(key.clone())
                .or_insert_with(|| {
                    order.push(key);
                    Vec::new()
                })
                .push(row);
        }

        for key in &order {
            let mut members = classes.remove(key).unwrap_or_default();
            if members.len() < 2 {
                return Err(PipelineError::InsufficientData(format!(
                    "class '{}' of '{}' has {} member(s), stratification needs at least 2",
                    key.as_deref().unwrap_or(MISSING_TOKEN),
                    target,
                    members.len()
                )));
            }
            members.shuffle(&mut rng);
            let n_test = test_size((fraction * members.len() as f64).round(), members.len());
            for &row in &members[..n_test] {
                is_test[row] = true;
            }
        }
    } else {
        let mut rows: Vec<usize> = (0..n_rows).collect();
        rows.shuffle(&mut rng);
        let n_test = test_size((fraction * n_rows as f64).ceil(), n_rows);
        for &row in &rows[..n_test] {
            is_test[row] = true;
        }
    }

    let (test_rows, train_rows): (Vec<usize>, Vec<usize>) = (0..n_rows).partition(|&row| is_test[row]);
    debug!(
        "split {} rows into {} train / {} test (stratify = {})",
        n_rows,
        train_rows.len(),
        test_rows.len(),
        options.stratify
    );

    let target_table = Table::new(table.row_ids().to_vec(), vec![target_column])?;
    Ok(Split {
        train_features: features.take_rows(&train_rows),
        train_target: target_table.take_rows(&train_rows),
        test_features: features.take_rows(&test_rows),
        test_target: target_table.take_rows(&test_rows),
    })
}

/// Clamp a raw test size so both sides keep at least one row
fn test_size(raw: f64, n: usize) -> usize {
    (raw as usize).clamp(1, n - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Column;

    fn labelled(n_gold: usize, n_silver: usize) -> Table {
        let n = n_gold + n_silver;
        let labels: Vec<Option<&str>> = (0..n)
            .map(|i| Some(if i < n_gold { "gold" } else { "silver" }))
            .collect();
        let values: Vec<f64> = (0..n).map(|i| i as f64).collect();
        Table::new(
            (1000..1000 + n as i64).collect(),
            vec![Column::from_f64("points", &values), Column::categorical("tier", labels)],
        )
        .unwrap()
    }

    fn options(stratify: bool) -> SplitOptions {
        SplitOptions {
            test_fraction: 0.25,
            seed: 42,
            stratify,
        }
    }

    fn count(target: &Table, label: &str) -> usize {
        let data = target.column("tier").unwrap().data();
        (0..target.n_rows())
            .filter(|&row| data.text_at(row).as_deref() == Some(label))
            .count()
    }

    #[test]
    fn test_split_sizes_and_columns() {
        let table = labelled(30, 10);
        let split = split(&table, "tier", &options(false)).unwrap();

        assert_eq!(split.train_features.n_rows() + split.test_features.n_rows(), 40);
        assert_eq!(split.test_features.n_rows(), 10);
        assert_eq!(split.train_features.column_names(), vec!["points"]);
        assert_eq!(split.train_target.column_names(), vec!["tier"]);
        assert_eq!(split.train_features.row_ids(), split.train_target.row_ids());
        assert_eq!(split.test_features.row_ids(), split.test_target.row_ids());
    }

    #[test]
    fn test_split_is_deterministic() {
        let table = labelled(30, 10);
        let a = split(&table, "tier", &options(true)).unwrap();
        let b = split(&table, "tier", &options(true)).unwrap();
        assert_eq!(a, b);

        let other = SplitOptions {
            seed: 7,
            ..options(true)
        };
        let c = split(&table, "tier", &other).unwrap();
        assert_eq!(c.test_features.n_rows(), a.test_features.n_rows());
    }

    #[test]
    fn test_seed_changes_the_draw() {
        let table = labelled(30, 10);
        let a = split(&table, "tier", &options(false)).unwrap();
        let b = split(
            &table,
            "tier",
            &SplitOptions {
                seed: 7,
                ..options(false)
            },
        )
        .unwrap();

        assert_eq!(a.test_features.n_rows(), b.test_features.n_rows());
        assert_ne!(a.test_features.row_ids(), b.test_features.row_ids());
    }

    #[test]
    fn test_gaps_and_literal_token_are_separate_classes() {
        let labels: Vec<Option<&str>> = (0..12)
            .map(|i| match i % 3 {
                0 => None,
                1 => Some(MISSING_TOKEN),
                _ => Some("gold"),
            })
            .collect();
        let values: Vec<f64> = (0..12).map(|i| i as f64).collect();
        let table = Table::from_columns(vec![
            Column::from_f64("points", &values),
            Column::categorical("tier", labels),
        ])
        .unwrap();

        let split = split(&table, "tier", &options(true)).unwrap();
        let data = split.test_target.column("tier").unwrap().data();
        let gaps = (0..split.test_target.n_rows()).filter(|&row| data.is_missing(row)).count();
        // one test row per class of four
        assert_eq!(split.test_features.n_rows(), 3);
        assert_eq!(gaps, 1);
        assert_eq!(count(&split.test_target, MISSING_TOKEN), 1);
    }

    #[test]
    fn test_stratified_preserves_proportions() {
        let table = labelled(30, 10);
        let split = split(&table, "tier", &options(true)).unwrap();

        assert_eq!(count(&split.test_target, "gold"), 8);
        assert_eq!(count(&split.test_target, "silver"), 3);
        assert_eq!(count(&split.train_target, "gold"), 22);
        assert_eq!(count(&split.train_target, "silver"), 7);

        let source_share = 30.0 / 40.0;
        for part in [&split.train_target, &split.test_target] {
            let share = count(part, "gold") as f64 / part.n_rows() as f64;
            assert!((share - source_share).abs() <= 1.0 / part.n_rows() as f64);
        }
    }

    #[test]
    fn test_rows_keep_relative_order() {
        let table = labelled(12, 8);
        let split = split(&table, "tier", &options(false)).unwrap();
        for part in [&split.train_features, &split.test_features] {
            assert!(part.row_ids().windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn test_split_errors() {
        let table = labelled(5, 1);
        assert!(matches!(
            split(&table, "tier", &options(true)),
            Err(PipelineError::InsufficientData(_))
        ));
        assert!(matches!(
            split(&table, "segment", &options(false)),
            Err(PipelineError::Schema(_))
        ));

        for fraction in [0.0, 1.0, -0.5, f64::NAN] {
            let bad = SplitOptions {
                test_fraction: fraction,
                ..options(false)
            };
            assert!(matches!(
                split(&table, "tier", &bad),
                Err(PipelineError::InvalidArgument(_))
            ));
        }

        let single = labelled(1, 0);
        assert!(matches!(
            split(&single, "tier", &options(false)),
            Err(PipelineError::InsufficientData(_))
        ));
    }
}
