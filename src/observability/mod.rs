//! Observability module for Tributary.
//!
//! Provides logging setup, metric recording and the rule engine used for
//! staleness monitoring.

pub mod rules;

pub use self::rules::{
    LogAction, Rule, RuleAction, RuleCondition, RuleContext, RuleEngine, RuleEvent, RuleSeverity,
    RuleState, SnapshotStale,
};

use crate::config::ObservabilityConfig;
use crate::error::{LineageError, Result};
use crate::lineage::edges::EdgeWrite;
use crate::lineage::traversal::Direction;
use tracing::info;
use metrics::{counter, gauge};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize logging to stderr, keeping stdout for command output.
pub fn init(config: &ObservabilityConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
            .map_err(|e| LineageError::Internal(format!("Failed to init logging: {}", e)))?;
    } else {
        subscriber
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init()
            .map_err(|e| LineageError::Internal(format!("Failed to init logging: {}", e)))?;
    }

    info!("Observability initialized");
    Ok(())
}

/// Record a stored edge.
pub fn record_edge_observed(write: EdgeWrite) {
    counter!("tributary_edges_observed_total", "write" => write.as_str()).increment(1);
}

/// Record a rejected edge.
pub fn record_edge_rejected(error: &LineageError) {
    counter!(
        "tributary_edges_rejected_total",
        "category" => format!("{:?}", error.category())
    )
    .increment(1);
}

/// Record a completed traversal.
pub fn record_traversal(direction: Direction, found: usize) {
    counter!("tributary_traversals_total", "direction" => direction.as_str()).increment(1);
    gauge!("tributary_traversal_last_result_size", "direction" => direction.as_str()).set(found as f64);
}

/// Record a failed traversal.
pub fn record_traversal_failure(direction: Direction, error: &LineageError) {
    counter!(
        "tributary_traversal_failures_total",
        "direction" => direction.as_str(),
        "category" => format!("{:?}", error.category())
    )
    .increment(1);
}

/// Record a published snapshot.
pub fn record_snapshot_rebuild(rows: usize) {
    counter!("tributary_snapshot_rebuilds_total").increment(1);
    gauge!("tributary_snapshot_rows").set(rows as f64);
}

/// Record a failed snapshot rebuild.
pub fn record_snapshot_failure() {
    counter!("tributary_snapshot_failures_total").increment(1);
}

/// Update the snapshot age gauge.
pub fn update_snapshot_age(age_secs: f64) {
    gauge!("tributary_snapshot_age_seconds").set(age_secs);
}
