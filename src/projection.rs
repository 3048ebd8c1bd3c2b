//! Variance-ranked linear projection for cluster inspection
//!
//! The projection is computed from the feature matrix alone and never feeds
//! back into clustering.

use log::debug;
use ndarray::{Array1, Array2, Axis};

use crate::error::PipelineError;
use crate::table::{RowId, Table};

/// Upper bound on Jacobi sweeps over the covariance matrix
const MAX_SWEEPS: usize = 100;

/// Per-row coordinates on the leading principal axes
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    pub row_ids: Vec<RowId>,
    /// Shape `(rows, dims)`
    pub coordinates: Array2<f64>,
    /// Unit axes as rows, shape `(dims, features)`
    pub components: Array2<f64>,
    /// Variance captured by each axis (sample variance, divisor `n - 1`)
    pub explained_variance: Vec<f64>,
    /// Share of the total variance captured by each axis
    pub explained_variance_ratio: Vec<f64>,
}

impl Projection {
    pub fn dims(&self) -> usize {
        self.coordinates.ncols()
    }
}

/// Project the rows of an all-numeric table onto its `dims` leading axes
///
/// # Arguments
/// * `table` - Numeric, complete table
/// * `dims` - Number of axes to keep, `1..=columns`
///
/// # Returns
/// * Coordinates ordered by decreasing captured variance. Each axis is
///   oriented so that its largest absolute loading is positive.
pub fn project(table: &Table, dims: usize) -> crate::Result<Projection> {
    let features = table.to_matrix()?;
    let (n_rows, n_features) = features.dim();

    if dims == 0 || dims > n_features {
        return Err(PipelineError::InvalidArgument(format!(
            "projection needs 1..={} dimensions, got {}",
            n_features, dims
        )));
    }
    if n_rows < 2 {
        return Err(PipelineError::InsufficientData(format!(
            "projection needs at least 2 rows, got {}",
            n_rows
        )));
    }

    let mean = features
        .mean_axis(Axis(0))
        .unwrap_or_else(|| Array1::zeros(n_features));
    let centered = &features - &mean;
    let covariance = centered.t().dot(&centered) / (n_rows - 1) as f64;

    let (eigenvalues, eigenvectors) = symmetric_eigen(covariance);
    let mut order: Vec<usize> = (0..n_features).collect();
    order.sort_by(|&a, &b| eigenvalues[b].total_cmp(&eigenvalues[a]));

    let variances: Vec<f64> = order.iter().map(|&i| eigenvalues[i].max(0.0)).collect();
    let total: f64 = variances.iter().sum();

    let mut components = Array2::zeros((dims, n_features));
    for (axis, &source) in order.iter().take(dims).enumerate() {
        let mut vector = eigenvectors.column(source).to_owned();
        let pivot = vector
            .iter()
            .copied()
            .fold(0.0_f64, |best, x| if x.abs() > best.abs() { x } else { best });
        if pivot < 0.0 {
            vector.mapv_inplace(|x| -x);
        }
        components.row_mut(axis).assign(&vector);
    }

    let coordinates = centered.dot(&components.t());
    let explained_variance: Vec<f64> = variances[..dims].to_vec();
    let explained_variance_ratio = explained_variance
        .iter()
        .map(|&v| if total > 0.0 { v / total } else { 0.0 })
        .collect::<Vec<_>>();
    debug!(
        "projected {} rows onto {} axes, variance ratio {:?}",
        n_rows, dims, explained_variance_ratio
    );

    Ok(Projection {
        row_ids: table.row_ids().to_vec(),
        coordinates,
        components,
        explained_variance,
        explained_variance_ratio,
    })
}

/// Eigen decomposition of a symmetric matrix by cyclic Jacobi rotations.
/// Returns the eigenvalues and the eigenvectors as columns.
fn symmetric_eigen(mut a: Array2<f64>) -> (Vec<f64>, Array2<f64>) {
    let n = a.nrows();
    let mut v = Array2::<f64>::eye(n);
    let norm = a.iter().map(|x| x * x).sum::<f64>().sqrt();

    for _ in 0..MAX_SWEEPS {
        let mut off = 0.0;
        for p in 0..n {
            for q in (p + 1)..n {
                off += a[[p, q]] * a[[p, q]];
            }
        }
        if norm == 0.0 || off.sqrt() <= f64::EPSILON * norm {
            break;
        }

        for p in 0..n {
            for q in (p + 1)..n {
                let apq = a[[p, q]];
                if apq == 0.0 {
                    continue;
                }
                let theta = (a[[q, q]] - a[[p, p]]) / (2.0 * apq);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                for k in 0..n {
                    let (akp, akq) = (a[[k, p]], a[[k, q]]);
                    a[[k, p]] = c * akp - s * akq;
                    a[[k, q]] = s * akp + c * akq;
                }
                for k in 0..n {
                    let (apk, aqk) = (a[[p, k]], a[[q, k]]);
                    a[[p, k]] = c * apk - s * aqk;
                    a[[q, k]] = s * apk + c * aqk;
                }
                for k in 0..n {
                    let (vkp, vkq) = (v[[k, p]], v[[k, q]]);
                    v[[k, p]] = c * vkp - s * vkq;
                    v[[k, q]] = s * vkp + c * vkq;
                }
            }
        }
    }

    ((0..n).map(|i| a[[i, i]]).collect(), v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Column;
    use ndarray::arr2;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-8
    }

    #[test]
    fn test_symmetric_eigen_diagonalizes() {
        let m = arr2(&[[4.0, 1.0, 0.5], [1.0, 3.0, 0.2], [0.5, 0.2, 1.0]]);
        let (values, vectors) = symmetric_eigen(m.clone());
        for (i, &lambda) in values.iter().enumerate() {
            let v = vectors.column(i);
            let mv = m.dot(&v);
            for k in 0..3 {
                assert!(close(mv[k], lambda * v[k]));
            }
        }
        // eigenvalues sum to the trace
        assert!(close(values.iter().sum::<f64>(), 8.0));
    }

    #[test]
    fn test_projection_along_a_line() {
        // points on y = 2x: all variance on one axis
        let xs = [-2.0, -1.0, 0.0, 1.0, 2.0];
        let ys: Vec<f64> = xs.iter().map(|x| 2.0 * x).collect();
        let table = Table::from_columns(vec![Column::from_f64("x", &xs), Column::from_f64("y", &ys)]).unwrap();

        let projection = project(&table, 2).unwrap();
        assert_eq!(projection.coordinates.shape(), &[5, 2]);
        assert!(close(projection.explained_variance_ratio[0], 1.0));
        assert!(close(projection.explained_variance_ratio[1], 0.0));

        let axis = projection.components.row(0);
        assert!(close(axis[0], 1.0 / 5.0_f64.sqrt()));
        assert!(close(axis[1], 2.0 / 5.0_f64.sqrt()));
        // largest point lands on the positive end of the first axis
        assert!(close(projection.coordinates[[4, 0]], 2.0 * 5.0_f64.sqrt()));
    }

    #[test]
    fn test_variance_is_ranked() {
        let table = Table::from_columns(vec![
            Column::from_f64("small", &[0.1, -0.1, 0.2, -0.2, 0.0]),
            Column::from_f64("large", &[10.0, -10.0, 5.0, -5.0, 0.0]),
        ])
        .unwrap();
        let projection = project(&table, 2).unwrap();
        assert!(projection.explained_variance[0] >= projection.explained_variance[1]);
        assert!(projection.components[[0, 1]].abs() > projection.components[[0, 0]].abs());
        assert_eq!(projection.row_ids, table.row_ids());
        assert_eq!(projection.dims(), 2);
    }

    #[test]
    fn test_project_errors() {
        let table = Table::from_columns(vec![Column::from_f64("x", &[1.0, 2.0])]).unwrap();
        assert!(matches!(project(&table, 0), Err(PipelineError::InvalidArgument(_))));
        assert!(matches!(project(&table, 2), Err(PipelineError::InvalidArgument(_))));

        let one_row = Table::from_columns(vec![Column::from_f64("x", &[1.0])]).unwrap();
        assert!(matches!(project(&one_row, 1), Err(PipelineError::InsufficientData(_))));
    }
}
