//! Declarative preprocessing pipeline
//!
//! Runs the cleaning stages in their fixed order
//! (impute → outliers → encode → scale) from a [`PipelineConfig`], which
//! is usually read from a JSON file:
//!
//! ```json
//! {
//!   "columns": [
//!     {"name": "Age", "kind": "numeric"},
//!     {"name": "Income", "kind": "numeric"},
//!     {"name": "Has_Card", "kind": "boolean"},
//!     {"name": "Education", "kind": "categorical"}
//!   ],
//!   "thresholds": {"Age": {"lower": 0, "upper": 100}},
//!   "split": {"target": "Education", "test_fraction": 0.2, "stratify": true}
//! }
//! ```

use std::collections::HashSet;
use std::path::Path;

use anyhow::Context;
use log::info;
use serde::{Deserialize, Serialize};

use crate::cluster::{self, Clustering};
use crate::encode::{self, EncodingMap};
use crate::error::PipelineError;
use crate::impute;
use crate::outliers::{self, ThresholdMap};
use crate::scale::{self, ScalingParams};
use crate::split::{self, Split, SplitOptions};
use crate::table::{ColumnData, ColumnKind, ColumnSpec, Table};

/// Train/test settings; the seed is supplied at run time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitConfig {
    pub target: String,
    pub test_fraction: f64,
    #[serde(default)]
    pub stratify: bool,
}

/// Columns to process and the parameters of each stage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub columns: Vec<ColumnSpec>,
    #[serde(default)]
    pub thresholds: ThresholdMap,
    #[serde(default)]
    pub split: Option<SplitConfig>,
}

impl PipelineConfig {
    pub fn from_json(text: &str) -> anyhow::Result<Self> {
        let config: Self = serde_json::from_str(text).context("invalid pipeline config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read config {}", path.display()))?;
        Self::from_json(&text)
    }

    /// Every column may be declared only once
    pub fn validate(&self) -> crate::Result<()> {
        let mut seen = HashSet::new();
        for spec in &self.columns {
            if !seen.insert(spec.name.as_str()) {
                return Err(PipelineError::InvalidArgument(format!(
                    "column '{}' is declared more than once",
                    spec.name
                )));
            }
        }
        Ok(())
    }

    /// Declared columns of one kind, in declaration order
    pub fn names_of(&self, kind: ColumnKind) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|spec| spec.kind == kind)
            .map(|spec| spec.name.as_str())
            .collect()
    }

    /// All declared columns, in declaration order
    pub fn feature_names(&self) -> Vec<&str> {
        self.columns.iter().map(|spec| spec.name.as_str()).collect()
    }
}

/// Output of [`Pipeline::prepare`]
#[derive(Debug, Clone, PartialEq)]
pub struct Prepared {
    /// Cleaned table, pass-through columns included
    pub table: Table,
    /// Declared columns only, all numeric; ready for clustering
    pub features: Table,
    pub encodings: EncodingMap,
    pub scaling: ScalingParams,
}

#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> crate::Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Clean `table` according to the config
    ///
    /// Boolean flags are turned into 0/1 numeric columns after imputation so
    /// the feature table is fully numeric.
    pub fn prepare(&self, table: &Table) -> crate::Result<Prepared> {
        let numeric = self.config.names_of(ColumnKind::Numeric);
        let boolean = self.config.names_of(ColumnKind::Boolean);
        let categorical = self.config.names_of(ColumnKind::Categorical);

        let filled = impute::fill(table, &numeric, &boolean)?;
        let filled = flags_to_numeric(filled, &boolean)?;
        info!("imputed {} numeric and {} boolean columns", numeric.len(), boolean.len());

        let filtered = outliers::remove_outliers(&filled, &self.config.thresholds)?;
        info!(
            "outlier filter kept {} of {} rows",
            filtered.n_rows(),
            filled.n_rows()
        );

        let (encoded, encodings) = encode::encode(&filtered, &categorical)?;
        let (scaled, scaling) = scale::scale(&encoded, &numeric)?;
        let features = scaled.select(&self.config.feature_names())?;
        info!(
            "prepared {} rows x {} features",
            features.n_rows(),
            features.n_cols()
        );

        Ok(Prepared {
            table: scaled,
            features,
            encodings,
            scaling,
        })
    }

    /// Configured train/test split of the prepared features plus target,
    /// `None` when the config has no split section
    pub fn split(&self, prepared: &Prepared, seed: u64) -> crate::Result<Option<Split>> {
        let Some(settings) = &self.config.split else {
            return Ok(None);
        };

        let mut names = self.config.feature_names();
        if !names.contains(&settings.target.as_str()) {
            names.push(&settings.target);
        }
        let table = prepared.table.select(&names)?;
        let options = SplitOptions {
            test_fraction: settings.test_fraction,
            seed,
            stratify: settings.stratify,
        };
        split::split(&table, &settings.target, &options).map(Some)
    }

    /// Cluster the prepared feature table
    pub fn cluster(
        &self,
        prepared: &Prepared,
        k: usize,
        seed: u64,
        reduce_to: Option<usize>,
    ) -> crate::Result<Clustering> {
        cluster::cluster(&prepared.features, k, seed, reduce_to)
    }
}

/// Boolean columns become numeric 0.0/1.0; numeric flags pass through
fn flags_to_numeric(mut table: Table, names: &[&str]) -> crate::Result<Table> {
    for name in names {
        let position = table.position(name)?;
        let numeric = match table.columns()[position].data() {
            ColumnData::Boolean(values) => values
                .iter()
                .map(|v| v.map(|b| if b { 1.0 } else { 0.0 }))
                .collect(),
            _ => continue,
        };
        table.replace_data(position, ColumnData::Numeric(numeric));
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Column;

    const CONFIG: &str = r#"{
        "columns": [
            {"name": "age", "kind": "numeric"},
            {"name": "newsletter", "kind": "boolean"},
            {"name": "tier", "kind": "categorical"}
        ],
        "thresholds": {"age": {"lower": 0, "upper": 100}},
        "split": {"target": "tier", "test_fraction": 0.5}
    }"#;

    fn raw() -> Table {
        Table::new(
            vec![11, 12, 13, 14, 15],
            vec![
                Column::from_f64("age", &[10.0, 12.0, f64::NAN, 1000.0, 14.0]),
                Column::boolean("newsletter", vec![Some(true), None, Some(false), Some(true), None]),
                Column::categorical(
                    "tier",
                    vec![Some("gold"), Some("silver"), Some("gold"), None, Some("silver")],
                ),
                Column::categorical("name", vec![Some("a"), Some("b"), Some("c"), Some("d"), Some("e")]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_config_from_json() {
        let config = PipelineConfig::from_json(CONFIG).unwrap();
        assert_eq!(config.names_of(ColumnKind::Numeric), vec!["age"]);
        assert_eq!(config.names_of(ColumnKind::Boolean), vec!["newsletter"]);
        assert_eq!(config.feature_names(), vec!["age", "newsletter", "tier"]);
        assert_eq!(config.split.as_ref().unwrap().target, "tier");
        assert!(!config.split.as_ref().unwrap().stratify);
    }

    #[test]
    fn test_config_rejects_duplicates() {
        let text = r#"{"columns": [{"name": "a", "kind": "numeric"}, {"name": "a", "kind": "boolean"}]}"#;
        assert!(PipelineConfig::from_json(text).is_err());
        assert!(PipelineConfig::from_json("{not json").is_err());
    }

    #[test]
    fn test_prepare_runs_all_stages() {
        let pipeline = Pipeline::new(PipelineConfig::from_json(CONFIG).unwrap()).unwrap();
        let prepared = pipeline.prepare(&raw()).unwrap();

        // median of [10, 12, 1000, 14] = 13 fills row 13; row 14 is an outlier
        assert_eq!(prepared.table.row_ids(), &[11, 12, 13, 15]);
        assert_eq!(prepared.features.column_names(), vec!["age", "newsletter", "tier"]);
        assert!(prepared.table.has_column("name"));

        let age = prepared.scaling.get("age").unwrap();
        assert!((age.mean - 12.25).abs() < 1e-10);

        assert_eq!(
            prepared.features.column("newsletter").unwrap().as_numeric().unwrap(),
            &[Some(1.0), Some(0.0), Some(0.0), Some(0.0)]
        );
        assert_eq!(
            prepared.features.column("tier").unwrap().as_numeric().unwrap(),
            &[Some(0.0), Some(1.0), Some(0.0), Some(1.0)]
        );
        assert_eq!(prepared.encodings["tier"].len(), 2);
    }

    #[test]
    fn test_split_and_cluster_prepared() {
        let pipeline = Pipeline::new(PipelineConfig::from_json(CONFIG).unwrap()).unwrap();
        let prepared = pipeline.prepare(&raw()).unwrap();

        let split = pipeline.split(&prepared, 42).unwrap().unwrap();
        assert_eq!(split.train_features.n_rows() + split.test_features.n_rows(), 4);
        assert_eq!(split.test_target.column_names(), vec!["tier"]);
        assert!(!split.train_features.has_column("tier"));

        let result = pipeline.cluster(&prepared, 2, 42, Some(2)).unwrap();
        assert_eq!(result.assignment.len(), 4);
        assert_eq!(result.projection.unwrap().dims(), 2);
    }

    #[test]
    fn test_split_without_section() {
        let pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
        let prepared = pipeline.prepare(&raw()).unwrap();
        assert!(pipeline.split(&prepared, 1).unwrap().is_none());
        assert_eq!(prepared.features.n_cols(), 0);
    }
}
