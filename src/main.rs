//! Tributary CLI - Main entry point.

use tributary::cli::{Cli, Commands, OutputFormat};
use tributary::config::{LineageConfig, ObservabilityConfig};
use tributary::lineage::traversal::depth_from_signed;
use tributary::lineage::{EdgeObservation, LineageEngine, TraversalResult};
use tributary::{observability, ErrorCategory, LineageError};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse_args();

    let mut config = match &cli.config {
        Some(path) => LineageConfig::from_file(path)?,
        None => LineageConfig {
            observability: ObservabilityConfig {
                log_level: "warn".to_string(),
                ..ObservabilityConfig::default()
            },
            ..LineageConfig::default()
        },
    };
    if let Some(level) = &cli.log_level {
        config.observability.log_level = level.clone();
    }
    observability::init(&config.observability)?;

    if let Commands::Version = cli.command {
        println!("Tributary v{}", env!("CARGO_PKG_VERSION"));
        println!("Dependency-graph lineage and impact analysis for data pipelines");
        return Ok(());
    }

    let engine = LineageEngine::new(&config);
    if let Some(seed) = &cli.seed {
        let observations = EdgeObservation::load_file(seed)?;
        let report = engine.ingestor.report_batch(&observations).await;
        for (index, error) in &report.rejected {
            eprintln!("Skipped observation #{}: {}", index, error);
        }
    }

    if let Err(e) = execute(&cli, config, engine).await {
        eprintln!("Error: {}", e);
        std::process::exit(exit_code(&e));
    }
    Ok(())
}

async fn execute(cli: &Cli, config: LineageConfig, engine: LineageEngine) -> tributary::Result<()> {
    match &cli.command {
        Commands::Impact { object, depth } => {
            let result = engine.queries.impact_of(object, resolve(*depth)?).await?;
            print_traversal(&result, cli.format)?;
        }
        Commands::Lineage { object, depth } => {
            let result = engine.queries.lineage_of(object, resolve(*depth)?).await?;
            print_traversal(&result, cli.format)?;
        }
        Commands::Path { from, to, depth } => {
            let path = engine.queries.path_between(from, to, resolve(*depth)?).await?;
            match cli.format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&path)?),
                OutputFormat::Text => match path {
                    Some(path) => println!("{}", path.join(" -> ")),
                    None => println!("No derivation path from {} to {}", from, to),
                },
            }
        }
        Commands::Summary { object, depth } => {
            let summary = engine.queries.impact_summary(object, resolve(*depth)?).await?;
            match cli.format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
                OutputFormat::Text => {
                    println!("{}", summary.summary);
                    println!("  Risk: {:?}", summary.risk_level);
                    for (kind, count) in &summary.by_kind {
                        println!("  {:<20} {}", kind.as_str(), count);
                    }
                }
            }
        }
        Commands::Map => {
            engine.materializer.rebuild().await?;
            let snapshot = engine.queries.full_map().await;
            match cli.format {
                OutputFormat::Json => println!("{}", snapshot.to_json()?),
                OutputFormat::Text => {
                    for row in &snapshot.rows {
                        println!(
                            "{} ({}) -> {} ({})  [{}]",
                            row.source_path, row.source_kind, row.target_path, row.target_kind, row.relation_kind
                        );
                    }
                }
            }
        }
        Commands::Serve => tributary::serve(config, engine).await?,
        Commands::Version => {}
    }
    Ok(())
}

fn resolve(depth: Option<i64>) -> tributary::Result<Option<u32>> {
    depth.map(depth_from_signed).transpose()
}

fn print_traversal(result: &TraversalResult, format: OutputFormat) -> tributary::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(result)?),
        OutputFormat::Text => {
            if result.is_empty() {
                println!("No {} dependencies for {}", result.direction, result.root_id);
            }
            for entry in &result.entries {
                println!(
                    "{}{:<3} {} ({}, {})",
                    "  ".repeat(entry.level.saturating_sub(1) as usize),
                    entry.level,
                    entry.object_id,
                    entry.object_kind,
                    entry.layer
                );
            }
        }
    }
    Ok(())
}

/// Distinct exit codes so scripts can tell bad input from outages.
fn exit_code(error: &LineageError) -> i32 {
    match error.category() {
        ErrorCategory::InvalidInput => 2,
        ErrorCategory::NotFound => 3,
        ErrorCategory::Unavailable => 4,
        ErrorCategory::Cancelled => 5,
        ErrorCategory::Internal => 1,
    }
}
