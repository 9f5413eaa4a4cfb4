//! Tributary - dependency-graph lineage and impact analysis for data pipelines.
//!
//! Tributary keeps a catalog of pipeline objects (raw tables, staging tables,
//! curated facts and dimensions, views, materialized views, ...) and the
//! directed "derived-from" edges between them, and answers two questions:
//!
//! - **Impact**: what would break downstream if this object changed?
//! - **Lineage**: which upstream objects produced the data in this object?
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Collaborators: deployment tooling | catalog watchers       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  EdgeIngestor ──▶ ObjectCatalog + EdgeStore                 │
//! ├─────────────────────────────────────────────────────────────┤
//! │  TraversalEngine (bounded BFS) ──▶ LineageQueryService      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  SnapshotMaterializer (full map) | RuleEngine (staleness)   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```no_run
//! use tributary::config::LineageConfig;
//! use tributary::lineage::{EdgeObservation, LineageEngine, ObjectKind};
//!
//! #[tokio::main]
//! async fn main() -> tributary::Result<()> {
//!     let engine = LineageEngine::new(&LineageConfig::default());
//!
//!     engine
//!         .ingestor
//!         .report(&EdgeObservation::new(
//!             "raw.sales",
//!             ObjectKind::RawTable,
//!             "staging.stg_sales",
//!             ObjectKind::StagingTable,
//!             "stream+task",
//!         ))
//!         .await?;
//!
//!     let impact = engine.queries.impact_of("raw.sales", None).await?;
//!     for entry in &impact.entries {
//!         println!("{} {}", entry.level, entry.object_id);
//!     }
//!     Ok(())
//! }
//! ```

pub mod cancel;
pub mod cli;
pub mod config;
pub mod error;
pub mod lineage;
pub mod observability;
pub mod shutdown;

// Re-exports
pub use error::{ErrorCategory, LineageError, Result};

use chrono::Utc;
use config::LineageConfig;
use lineage::LineageEngine;
use observability::{Rule, RuleContext, RuleEngine, RuleEvent};
use shutdown::{ShutdownCoordinator, SignalHandler};
use tracing::{info, warn};

/// Rebuild the snapshot, then evaluate monitoring rules against it.
///
/// A failed rebuild is logged and the rules still run against the previous
/// snapshot, so staleness keeps being reported.
pub async fn run_maintenance_cycle(engine: &LineageEngine, rules: &RuleEngine) -> Vec<RuleEvent> {
    if let Err(e) = engine.materializer.rebuild().await {
        warn!(error = %e, "Scheduled snapshot rebuild failed");
    }

    let snapshot = engine.materializer.current().await;
    let snapshot_age = snapshot.age();
    if let Some(age) = snapshot_age {
        observability::update_snapshot_age(age.as_secs_f64());
    }

    let ctx = RuleContext {
        now: Utc::now(),
        snapshot_age,
        snapshot_rows: snapshot.len(),
        edge_count: engine.store.len().await,
        object_count: engine.catalog.len().await,
    };
    rules.tick(&ctx).await
}

/// Run the maintenance loop until a shutdown signal arrives.
pub async fn serve(config: LineageConfig, engine: LineageEngine) -> Result<()> {
    let coordinator = ShutdownCoordinator::new();
    let signal_coordinator = coordinator.clone();
    tokio::spawn(async move {
        SignalHandler::new(signal_coordinator).run().await;
    });

    serve_until(config, engine, coordinator).await
}

/// Run the maintenance loop until `coordinator` is tripped.
pub async fn serve_until(
    config: LineageConfig,
    engine: LineageEngine,
    coordinator: ShutdownCoordinator,
) -> Result<()> {
    info!(
        interval = ?config.snapshot.rebuild_interval,
        "Starting lineage maintenance loop"
    );

    let rules = RuleEngine::new();
    rules
        .register(Rule::snapshot_staleness(config.snapshot.staleness_threshold))
        .await;

    let mut interval = tokio::time::interval(config.snapshot.rebuild_interval);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                run_maintenance_cycle(&engine, &rules).await;
            }
            _ = coordinator.wait_for_shutdown() => {
                info!("Maintenance loop shutting down");
                break;
            }
        }
    }

    Ok(())
}
