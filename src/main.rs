//! ClusterPrep: clean a customer table and segment it with K-Means
//!
//! This is the main entrypoint that orchestrates data loading, the cleaning
//! pipeline, the optional train/test split, clustering and visualization.

use std::time::Instant;

use anyhow::Result;
use clap::Parser;
use clusterprep::{cluster::silhouette_sample, data, viz, Args, Pipeline, PipelineConfig};
use log::info;

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(args.log_filter())).init();
    args.validate()?;

    run_full_pipeline(&args)
}

/// Run load → prepare → split → cluster → report
fn run_full_pipeline(args: &Args) -> Result<()> {
    println!("=== Full Clustering Pipeline ===\n");
    let start_time = Instant::now();

    // Step 1: Load data
    let table = match &args.join {
        Some(join) => data::load_joined(&args.input, join, &args.key)?,
        None => data::load_table(&args.input, &args.key)?,
    };
    println!("✓ Data loaded: {} rows x {} columns", table.n_rows(), table.n_cols());

    // Step 2: Clean
    let config = PipelineConfig::from_file(&args.config)?;
    let pipeline = Pipeline::new(config)?;
    let prepare_start = Instant::now();
    let prepared = pipeline.prepare(&table)?;
    println!(
        "✓ Data prepared: {} rows x {} features ({} removed as outliers)",
        prepared.features.n_rows(),
        prepared.features.n_cols(),
        table.n_rows() - prepared.table.n_rows()
    );
    info!("preparation took {:.2}s", prepare_start.elapsed().as_secs_f64());

    // Step 3: Optional split
    if let Some(split) = pipeline.split(&prepared, args.seed)? {
        println!(
            "✓ Split: {} train / {} test rows",
            split.train_features.n_rows(),
            split.test_features.n_rows()
        );
    }

    // Step 4: Cluster
    let model_start = Instant::now();
    let result = pipeline.cluster(&prepared, args.clusters, args.seed, args.components)?;
    println!("✓ Model fitted successfully");
    info!("fitting took {:.2}s", model_start.elapsed().as_secs_f64());

    let features = prepared.features.to_matrix()?;
    let silhouette = silhouette_sample(&features, &result.assignment, 100);
    viz::print_cluster_statistics(&result.assignment, &result.model, silhouette);

    // Step 5: Charts
    if let Some(projection) = &result.projection {
        viz::generate_visualization_report(projection, &result.assignment, &args.output)?;
        println!("\nMain plot saved to: {}", args.output);
        println!("Cluster sizes saved to: {}", viz::sizes_chart_path(&args.output));
    } else {
        viz::create_cluster_size_chart(&result.assignment, &viz::sizes_chart_path(&args.output))?;
        println!("\nCluster sizes saved to: {}", viz::sizes_chart_path(&args.output));
    }

    println!("\n=== Pipeline Complete ===");
    println!("Total processing time: {:.2}s", start_time.elapsed().as_secs_f64());

    Ok(())
}
