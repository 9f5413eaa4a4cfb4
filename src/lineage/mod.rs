//! Dependency-graph lineage and impact analysis.
//!
//! Provides the pieces that answer "what breaks if X changes?" and "where did
//! the data in X come from?":
//! - Object catalog with identity validation
//! - Append/update-only edge store indexed by both endpoints
//! - Bounded, cycle-safe breadth-first traversal
//! - Query service with depth limits, timeouts and cancellation
//! - Atomically published full-map snapshots
//! - Edge ingestion from deployment tooling

pub mod catalog;
pub mod edges;
pub mod ingest;
pub mod query;
pub mod snapshot;
pub mod traversal;

pub use catalog::{Layer, ObjectCatalog, ObjectKind, SchemaObject};
pub use edges::{DependencyEdge, EdgeRef, EdgeSource, EdgeStore, EdgeWrite};
pub use ingest::{BatchReport, EdgeIngestor, EdgeObservation};
pub use query::{ImpactSummary, LineageQueryService, RiskLevel};
pub use snapshot::{LineageSnapshot, SnapshotMaterializer, SnapshotRow};
pub use traversal::{Direction, TraversalEngine, TraversalEntry, TraversalRequest, TraversalResult};

use crate::config::LineageConfig;
use std::sync::Arc;

/// One independent lineage graph with all of its components wired together.
///
/// Nothing is global: separate instances (one per environment, one per test)
/// never share state.
#[derive(Clone)]
pub struct LineageEngine {
    pub catalog: Arc<ObjectCatalog>,
    pub store: Arc<EdgeStore>,
    pub ingestor: Arc<EdgeIngestor>,
    pub materializer: Arc<SnapshotMaterializer>,
    pub queries: LineageQueryService,
}

impl LineageEngine {
    /// Builds an empty in-memory graph.
    pub fn new(config: &LineageConfig) -> Self {
        let catalog = Arc::new(ObjectCatalog::new());
        let store = Arc::new(EdgeStore::new(catalog.clone()));
        let ingestor = Arc::new(EdgeIngestor::new(catalog.clone(), store.clone()));
        let materializer = Arc::new(SnapshotMaterializer::new(catalog.clone(), store.clone()));
        let engine = TraversalEngine::new(catalog.clone(), store.clone());
        let queries = LineageQueryService::new(engine, materializer.clone(), config.traversal.clone());

        Self {
            catalog,
            store,
            ingestor,
            materializer,
            queries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_engines_are_isolated() {
        let config = LineageConfig::default();
        let prod = LineageEngine::new(&config);
        let dev = LineageEngine::new(&config);

        prod.ingestor
            .report(&EdgeObservation::new(
                "raw.sales",
                ObjectKind::RawTable,
                "staging.stg_sales",
                ObjectKind::StagingTable,
                "copy",
            ))
            .await
            .unwrap();

        assert_eq!(prod.store.len().await, 1);
        assert!(dev.store.is_empty().await);
        assert!(dev.catalog.is_empty().await);
    }
}
