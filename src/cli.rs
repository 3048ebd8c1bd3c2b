//! Command-line interface definitions and argument parsing

use clap::Parser;

/// Clean a customer table and segment it with K-Means
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the input CSV file
    #[arg(short, long, default_value = "data/customers.csv")]
    pub input: String,

    /// Optional second CSV left-joined onto the input by the key column
    #[arg(short, long)]
    pub join: Option<String>,

    /// Column holding the unique integer row id
    #[arg(long, default_value = "Loyalty#")]
    pub key: String,

    /// Pipeline config (JSON): column kinds, thresholds, split
    #[arg(short, long, default_value = "pipeline.json")]
    pub config: String,

    /// Number of clusters for K-Means
    #[arg(short = 'k', long, default_value = "4")]
    pub clusters: usize,

    /// Seed for the split and the centroid initialization
    #[arg(long, default_value = "42")]
    pub seed: u64,

    /// Project the features onto this many principal axes for plotting
    #[arg(long)]
    pub components: Option<usize>,

    /// Output path for the visualization plot
    #[arg(short, long, default_value = "cluster_plot.png")]
    pub output: String,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Reject values clap cannot rule out on its own
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.clusters == 0 {
            anyhow::bail!("Number of clusters must be at least 1");
        }
        if self.components == Some(0) {
            anyhow::bail!("Number of components must be at least 1");
        }
        Ok(())
    }

    /// Default log filter for the chosen verbosity
    pub fn log_filter(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else {
            "info"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_args() {
        let args = Args::parse_from([
            "clusterprep",
            "--input",
            "customers.csv",
            "--join",
            "flights.csv",
            "-k",
            "3",
            "--components",
            "2",
        ]);
        assert_eq!(args.input, "customers.csv");
        assert_eq!(args.join.as_deref(), Some("flights.csv"));
        assert_eq!(args.key, "Loyalty#");
        assert_eq!(args.clusters, 3);
        assert_eq!(args.seed, 42);
        assert_eq!(args.components, Some(2));
        assert_eq!(args.log_filter(), "info");
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validate() {
        let mut args = Args::parse_from(["clusterprep", "-k", "0"]);
        assert!(args.validate().is_err());

        args.clusters = 2;
        args.components = Some(0);
        assert!(args.validate().is_err());

        args.components = None;
        args.verbose = true;
        assert!(args.validate().is_ok());
        assert_eq!(args.log_filter(), "debug");
    }
}
