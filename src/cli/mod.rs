//! Command-line interface for Tributary.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Tributary - lineage and impact analysis for data pipeline catalogs.
#[derive(Parser)]
#[command(name = "tributary")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "TRIBUTARY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Edge observation seed file (JSON array)
    #[arg(short, long, env = "TRIBUTARY_SEED", global = true)]
    pub seed: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(short, long, env = "TRIBUTARY_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Parse arguments from the process environment.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

/// Output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Show what would break downstream if an object changed
    Impact {
        /// Qualified object id, e.g. raw.sales
        object: String,

        /// Maximum hops to follow
        #[arg(short, long, allow_hyphen_values = true)]
        depth: Option<i64>,
    },

    /// Show which upstream objects produced an object's data
    Lineage {
        /// Qualified object id
        object: String,

        /// Maximum hops to follow
        #[arg(short, long, allow_hyphen_values = true)]
        depth: Option<i64>,
    },

    /// Find the shortest derivation path between two objects
    Path {
        /// Upstream object
        from: String,

        /// Downstream object
        to: String,

        /// Maximum hops to follow
        #[arg(short, long, allow_hyphen_values = true)]
        depth: Option<i64>,
    },

    /// Summarize downstream impact by kind, layer and risk
    Summary {
        /// Qualified object id
        object: String,

        /// Maximum hops to follow
        #[arg(short, long, allow_hyphen_values = true)]
        depth: Option<i64>,
    },

    /// Print the full flattened lineage map
    Map,

    /// Rebuild snapshots periodically and evaluate staleness rules
    Serve,

    /// Show version information
    Version,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_impact() {
        let cli = Cli::try_parse_from(["tributary", "--seed", "edges.json", "impact", "raw.sales", "-d", "3"]).unwrap();
        assert_eq!(cli.seed, Some(PathBuf::from("edges.json")));
        match cli.command {
            Commands::Impact { object, depth } => {
                assert_eq!(object, "raw.sales");
                assert_eq!(depth, Some(3));
            }
            _ => panic!("expected impact"),
        }
    }

    #[test]
    fn test_negative_depth_reaches_validation() {
        let cli = Cli::try_parse_from(["tributary", "lineage", "raw.sales", "--depth", "-1"]).unwrap();
        assert!(matches!(cli.command, Commands::Lineage { depth: Some(-1), .. }));
    }

    #[test]
    fn test_log_level_only_when_given() {
        let cli = Cli::try_parse_from(["tributary", "map"]).unwrap();
        assert_eq!(cli.log_level, None);

        let cli = Cli::try_parse_from(["tributary", "--log-level", "debug", "map"]).unwrap();
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_format_flag() {
        let cli = Cli::try_parse_from(["tributary", "map", "--format", "json"]).unwrap();
        assert_eq!(cli.format, OutputFormat::Json);
    }
}
