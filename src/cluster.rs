//! K-Means clustering over a cleaned feature table

use linfa_nn::distance::{Distance, L2Dist};
use log::{debug, warn};
use ndarray::{Array2, ArrayView1, Axis};
use rand::distributions::{Distribution, WeightedIndex};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::error::PipelineError;
use crate::projection::{self, Projection};
use crate::table::{RowId, Table};

/// Hard cap on assign/update rounds
pub const MAX_ITERATIONS: usize = 300;

/// Cluster label of every row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterAssignment {
    row_ids: Vec<RowId>,
    labels: Vec<usize>,
    n_clusters: usize,
}

impl ClusterAssignment {
    pub fn row_ids(&self) -> &[RowId] {
        &self.row_ids
    }

    /// Labels in `0..n_clusters`, aligned with [`row_ids`](Self::row_ids)
    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    pub fn n_clusters(&self) -> usize {
        self.n_clusters
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn label_of(&self, row_id: RowId) -> Option<usize> {
        self.row_ids
            .iter()
            .position(|&id| id == row_id)
            .map(|i| self.labels[i])
    }

    /// Number of rows per cluster
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.n_clusters];
        for &label in &self.labels {
            sizes[label] += 1;
        }
        sizes
    }
}

/// Fitted centroids plus the column order they were fitted on
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterModel {
    centroids: Array2<f64>,
    feature_names: Vec<String>,
    inertia: f64,
    n_iterations: usize,
    converged: bool,
}

impl ClusterModel {
    pub fn n_clusters(&self) -> usize {
        self.centroids.nrows()
    }

    /// Shape `(k, features)`
    pub fn centroids(&self) -> &Array2<f64> {
        &self.centroids
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Within-cluster sum of squared distances on the training rows
    pub fn inertia(&self) -> f64 {
        self.inertia
    }

    pub fn n_iterations(&self) -> usize {
        self.n_iterations
    }

    /// `false` when the iteration cap stopped the fit
    pub fn converged(&self) -> bool {
        self.converged
    }

    /// Label the rows of a table holding the fitted feature columns
    pub fn assign(&self, table: &Table) -> crate::Result<ClusterAssignment> {
        let features = table.select(&self.feature_names)?.to_matrix()?;
        let labels = features
            .outer_iter()
            .map(|row| nearest_centroid(&self.centroids, row).0)
            .collect();
        Ok(ClusterAssignment {
            row_ids: table.row_ids().to_vec(),
            labels,
            n_clusters: self.n_clusters(),
        })
    }

    /// Nearest centroid for one feature vector in fitted column order
    pub fn predict(&self, features: &[f64]) -> crate::Result<usize> {
        if features.len() != self.feature_names.len() {
            return Err(PipelineError::InvalidArgument(format!(
                "feature vector must have {} values, got {}",
                self.feature_names.len(),
                features.len()
            )));
        }
        Ok(nearest_centroid(&self.centroids, ArrayView1::from(features)).0)
    }
}

/// Everything a clustering run produces
#[derive(Debug, Clone, PartialEq)]
pub struct Clustering {
    pub assignment: ClusterAssignment,
    pub model: ClusterModel,
    /// Present when a reduced dimension count was requested
    pub projection: Option<Projection>,
}

/// Partition the rows of `table` into `k` clusters
///
/// Centroids are seeded with k-means++ from a ChaCha8 stream keyed by
/// `seed`, then refined by alternating nearest-centroid assignment (ties go
/// to the lowest centroid index) and centroid recomputation until the
/// assignment stops changing or [`MAX_ITERATIONS`] rounds have run. A cluster
/// that loses all its rows keeps its previous centroid.
///
/// # Arguments
/// * `table` - All-numeric table without missing values
/// * `k` - Number of clusters, `1..=rows`
/// * `seed` - Initialization seed
/// * `reduce_to` - Optional projection dimension count, computed from the
///   same features and independent of the labels
pub fn cluster(table: &Table, k: usize, seed: u64, reduce_to: Option<usize>) -> crate::Result<Clustering> {
    if table.n_cols() == 0 {
        return Err(PipelineError::Schema("no feature columns to cluster on".to_string()));
    }
    let features = table.to_matrix()?;
    let n_rows = features.nrows();
    if k == 0 || k > n_rows {
        return Err(PipelineError::InvalidArgument(format!(
            "number of clusters must be in 1..={}, got {}",
            n_rows, k
        )));
    }

    let projection = reduce_to.map(|dims| projection::project(table, dims)).transpose()?;

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let initial = init_centroids(&features, k, &mut rng);
    let LloydRun {
        labels,
        centroids,
        n_iterations,
        converged,
    } = lloyd(&features, initial, MAX_ITERATIONS);

    let inertia = compute_inertia(&features, &labels, &centroids);
    debug!(
        "k-means with k = {} on {} rows: {} iterations, inertia {:.4}",
        k, n_rows, n_iterations, inertia
    );

    Ok(Clustering {
        assignment: ClusterAssignment {
            row_ids: table.row_ids().to_vec(),
            labels,
            n_clusters: k,
        },
        model: ClusterModel {
            centroids,
            feature_names: table.column_names().into_iter().map(String::from).collect(),
            inertia,
            n_iterations,
            converged,
        },
        projection,
    })
}

/// Outcome of the Lloyd refinement
struct LloydRun {
    labels: Vec<usize>,
    centroids: Array2<f64>,
    n_iterations: usize,
    converged: bool,
}

/// Alternate assignment and centroid updates until the assignment repeats
/// or `max_iterations` updates have run. Labels always match the returned
/// centroids.
fn lloyd(features: &Array2<f64>, mut centroids: Array2<f64>, max_iterations: usize) -> LloydRun {
    let mut labels: Vec<usize> = Vec::new();
    let mut n_iterations = 0;
    let converged = loop {
        let next: Vec<usize> = features
            .outer_iter()
            .map(|row| nearest_centroid(&centroids, row).0)
            .collect();
        if next == labels {
            break true;
        }
        labels = next;
        if n_iterations == max_iterations {
            break false;
        }
        update_centroids(features, &labels, &mut centroids);
        n_iterations += 1;
    };

    if !converged {
        warn!(
            "k-means stopped after {} iterations without a stable assignment",
            max_iterations
        );
    }

    LloydRun {
        labels,
        centroids,
        n_iterations,
        converged,
    }
}

/// k-means++ seeding. Falls back to a uniform draw among unused rows when
/// every remaining row coincides with a chosen centroid.
fn init_centroids(features: &Array2<f64>, k: usize, rng: &mut ChaCha8Rng) -> Array2<f64> {
    let n_rows = features.nrows();
    let mut chosen = vec![rng.gen_range(0..n_rows)];
    let mut min_dist: Vec<f64> = features
        .outer_iter()
        .map(|row| L2Dist.rdistance(row, features.row(chosen[0])))
        .collect();

    while chosen.len() < k {
        let next = match WeightedIndex::new(&min_dist) {
            Ok(weights) => weights.sample(rng),
            Err(_) => {
                let unused: Vec<usize> = (0..n_rows).filter(|i| !chosen.contains(i)).collect();
                unused[rng.gen_range(0..unused.len())]
            }
        };
        chosen.push(next);
        for (i, row) in features.outer_iter().enumerate() {
            let dist = L2Dist.rdistance(row, features.row(next));
            if dist < min_dist[i] {
                min_dist[i] = dist;
            }
        }
    }

    features.select(Axis(0), &chosen)
}

/// Index of the closest centroid and its squared distance
fn nearest_centroid(centroids: &Array2<f64>, point: ArrayView1<f64>) -> (usize, f64) {
    let mut best = (0, f64::INFINITY);
    for (idx, centroid) in centroids.outer_iter().enumerate() {
        let dist = L2Dist.rdistance(point, centroid);
        if dist < best.1 {
            best = (idx, dist);
        }
    }
    best
}

fn update_centroids(features: &Array2<f64>, labels: &[usize], centroids: &mut Array2<f64>) {
    let mut sums = Array2::<f64>::zeros(centroids.raw_dim());
    let mut counts = vec![0usize; centroids.nrows()];
    for (row, &label) in features.outer_iter().zip(labels) {
        let mut sum = sums.row_mut(label);
        sum += &row;
        counts[label] += 1;
    }
    for (cluster, &count) in counts.iter().enumerate() {
        if count > 0 {
            let mean = &sums.row(cluster) / count as f64;
            centroids.row_mut(cluster).assign(&mean);
        }
    }
}

/// Within-cluster sum of squares (inertia)
fn compute_inertia(features: &Array2<f64>, labels: &[usize], centroids: &Array2<f64>) -> f64 {
    features
        .outer_iter()
        .zip(labels)
        .map(|(row, &label)| L2Dist.rdistance(row, centroids.row(label)))
        .sum()
}

/// Mean silhouette coefficient over the first `sample_size` rows
///
/// Cheap quality signal for reports; `0.0` when fewer than two rows are
/// sampled.
pub fn silhouette_sample(features: &Array2<f64>, assignment: &ClusterAssignment, sample_size: usize) -> f64 {
    let n_samples = features.nrows().min(sample_size).min(assignment.len());
    if n_samples < 2 {
        return 0.0;
    }
    let labels = assignment.labels();
    let n_clusters = assignment.n_clusters();

    let mut silhouette_sum = 0.0;
    for i in 0..n_samples {
        let point = features.row(i);
        let mut same_cluster = Vec::new();
        let mut other_clusters: Vec<Vec<f64>> = vec![Vec::new(); n_clusters];

        for j in 0..n_samples {
            if i == j {
                continue;
            }
            let distance = L2Dist.distance(point, features.row(j));
            if labels[j] == labels[i] {
                same_cluster.push(distance);
            } else {
                other_clusters[labels[j]].push(distance);
            }
        }

        let a_i = if same_cluster.is_empty() {
            0.0
        } else {
            same_cluster.iter().sum::<f64>() / same_cluster.len() as f64
        };
        let b_i = other_clusters
            .iter()
            .filter(|distances| !distances.is_empty())
            .map(|distances| distances.iter().sum::<f64>() / distances.len() as f64)
            .fold(f64::INFINITY, f64::min);

        silhouette_sum += if b_i.is_infinite() || (a_i == 0.0 && b_i == 0.0) {
            0.0
        } else {
            (b_i - a_i) / a_i.max(b_i)
        };
    }

    silhouette_sum / n_samples as f64
}
