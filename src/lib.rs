//! ClusterPrep: preprocessing and K-Means segmentation for customer tables
//!
//! The pipeline cleans a raw [`Table`] in a fixed order (median/flag
//! imputation, threshold outlier removal, first-seen categorical codes,
//! standard scaling) and then either partitions it into train/test sets or
//! clusters it, optionally alongside a principal-axis projection for plots.
//! Every stage borrows its input and returns a new table together with the
//! parameters it derived.

pub mod cli;
pub mod cluster;
pub mod data;
pub mod encode;
pub mod error;
pub mod impute;
pub mod outliers;
pub mod pipeline;
pub mod projection;
pub mod scale;
pub mod split;
pub mod table;
pub mod viz;

// Re-export public items for easier access
pub use cli::Args;
pub use cluster::{cluster, ClusterAssignment, ClusterModel, Clustering};
pub use encode::{encode, ColumnEncoding, EncodingMap, MISSING_TOKEN};
pub use error::PipelineError;
pub use impute::fill;
pub use outliers::{remove_outliers, Bounds, ThresholdMap};
pub use pipeline::{Pipeline, PipelineConfig, Prepared, SplitConfig};
pub use projection::{project, Projection};
pub use scale::{scale, ColumnScaling, ScalingParams};
pub use split::{split, Split, SplitOptions};
pub use table::{Column, ColumnData, ColumnKind, ColumnSpec, RowId, Table};

/// Result type of the pipeline stages
pub type Result<T> = std::result::Result<T, PipelineError>;
