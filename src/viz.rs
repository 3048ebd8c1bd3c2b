//! Cluster charts rendered with Plotters

use plotters::prelude::*;

use crate::cluster::{ClusterAssignment, ClusterModel};
use crate::projection::Projection;

/// Color palette for different clusters
static CLUSTER_COLORS: [RGBColor; 8] = [
    RED,
    BLUE,
    GREEN,
    MAGENTA,
    CYAN,
    RGBColor(255, 140, 0),
    RGBColor(128, 0, 128),
    RGBColor(139, 69, 19),
];

fn cluster_color(cluster: usize) -> &'static RGBColor {
    CLUSTER_COLORS.get(cluster).unwrap_or(&BLACK)
}

/// Scatter plot of the first two projection axes, colored by cluster
///
/// A one-dimensional projection is drawn on a flat line. Cluster centers are
/// the mean projected coordinates of their members.
///
/// # Arguments
/// * `projection` - Reduced coordinates of the clustered rows
/// * `assignment` - Labels aligned with the projection rows
/// * `output_path` - Path to save the PNG plot
/// * `plot_title` - Title for the plot
pub fn create_cluster_visualization(
    projection: &Projection,
    assignment: &ClusterAssignment,
    output_path: &str,
    plot_title: Option<&str>,
) -> anyhow::Result<()> {
    if projection.row_ids != assignment.row_ids() {
        anyhow::bail!("projection and cluster assignment cover different rows");
    }
    let title = plot_title.unwrap_or("Customer Segments (Principal Components)");

    let coords = &projection.coordinates;
    let points: Vec<(f64, f64)> = coords
        .outer_iter()
        .map(|row| (row[0], if row.len() > 1 { row[1] } else { 0.0 }))
        .collect();

    let x_min = points.iter().map(|p| p.0).fold(f64::INFINITY, f64::min) - 0.5;
    let x_max = points.iter().map(|p| p.0).fold(f64::NEG_INFINITY, f64::max) + 0.5;
    let y_min = points.iter().map(|p| p.1).fold(f64::INFINITY, f64::min) - 0.5;
    let y_max = points.iter().map(|p| p.1).fold(f64::NEG_INFINITY, f64::max) + 0.5;

    let root = BitMapBackend::new(output_path, (800, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(x_min..x_max, y_min..y_max)?;

    chart
        .configure_mesh()
        .x_desc("Component 1")
        .y_desc("Component 2")
        .axis_desc_style(("sans-serif", 15))
        .draw()?;

    for (&point, &cluster) in points.iter().zip(assignment.labels()) {
        chart.draw_series(std::iter::once(Circle::new(
            point,
            4,
            cluster_color(cluster).filled(),
        )))?;
    }

    let n_clusters = assignment.n_clusters();
    let mut sums = vec![(0.0, 0.0, 0usize); n_clusters];
    for (&(x, y), &cluster) in points.iter().zip(assignment.labels()) {
        sums[cluster].0 += x;
        sums[cluster].1 += y;
        sums[cluster].2 += 1;
    }
    for (cluster_id, &(sx, sy, count)) in sums.iter().enumerate() {
        if count == 0 {
            continue;
        }
        let (cx, cy) = (sx / count as f64, sy / count as f64);
        let color = cluster_color(cluster_id);
        chart
            .draw_series(std::iter::once(Rectangle::new(
                [(cx - 0.1, cy - 0.1), (cx + 0.1, cy + 0.1)],
                color.filled(),
            )))?
            .label(format!("Cluster {}", cluster_id))
            .legend(move |(x, y)| Rectangle::new([(x, y), (x + 10, y + 10)], color.filled()));
    }

    chart.configure_series_labels().draw()?;
    root.present()?;
    log::info!("cluster visualization saved to {}", output_path);

    Ok(())
}

/// Bar chart of cluster sizes
pub fn create_cluster_size_chart(assignment: &ClusterAssignment, output_path: &str) -> anyhow::Result<()> {
    let cluster_sizes = assignment.cluster_sizes();
    let max_size = *cluster_sizes.iter().max().unwrap_or(&1) as f64;

    let root = BitMapBackend::new(output_path, (600, 400)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Cluster Sizes", ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(-0.5f64..(assignment.n_clusters() as f64 - 0.5), 0f64..(max_size * 1.1))?;

    chart
        .configure_mesh()
        .x_desc("Cluster ID")
        .y_desc("Number of Customers")
        .axis_desc_style(("sans-serif", 15))
        .draw()?;

    for (cluster_id, &size) in cluster_sizes.iter().enumerate() {
        chart.draw_series(std::iter::once(Rectangle::new(
            [(cluster_id as f64 - 0.4, 0.0), (cluster_id as f64 + 0.4, size as f64)],
            cluster_color(cluster_id).filled(),
        )))?;
    }

    root.present()?;
    log::info!("cluster size chart saved to {}", output_path);

    Ok(())
}

/// Print cluster statistics to the console
pub fn print_cluster_statistics(assignment: &ClusterAssignment, model: &ClusterModel, silhouette: f64) {
    let total = assignment.len();
    println!("\n=== Cluster Statistics ===");
    println!("Number of clusters: {}", model.n_clusters());
    println!("Total customers: {}", total);
    println!("Iterations: {} (converged: {})", model.n_iterations(), model.converged());
    println!("Within-cluster sum of squares (Inertia): {:.2}", model.inertia());
    println!("Silhouette score (sample): {:.3}", silhouette);

    println!("\nCluster sizes:");
    for (i, &size) in assignment.cluster_sizes().iter().enumerate() {
        let percentage = (size as f64 / total.max(1) as f64) * 100.0;
        println!("  Cluster {}: {} customers ({:.1}%)", i, size, percentage);
    }

    println!("\nCluster centroids (scaled):");
    println!("  Cluster | {}", model.feature_names().join(" | "));
    for (i, centroid) in model.centroids().outer_iter().enumerate() {
        let values: Vec<String> = centroid.iter().map(|v| format!("{:.2}", v)).collect();
        println!("  {:7} | {}", i, values.join(" | "));
    }
}

/// Write the scatter plot and, next to it, the `_sizes.png` bar chart
pub fn generate_visualization_report(
    projection: &Projection,
    assignment: &ClusterAssignment,
    base_output_path: &str,
) -> anyhow::Result<()> {
    create_cluster_visualization(projection, assignment, base_output_path, None)?;

    let size_chart_path = sizes_chart_path(base_output_path);
    create_cluster_size_chart(assignment, &size_chart_path)?;

    Ok(())
}

/// Path of the size chart written next to `base_output_path`
pub fn sizes_chart_path(base_output_path: &str) -> String {
    match base_output_path.strip_suffix(".png") {
        Some(stem) => format!("{}_sizes.png", stem),
        None => format!("{}_sizes.png", base_output_path),
    }
}
