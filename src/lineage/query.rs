// Lineage Query Service

use crate::cancel::CancelToken;
use crate::config::TraversalConfig;
use crate::error::{LineageError, Result};
use crate::lineage::catalog::{Layer, ObjectKind};
use crate::lineage::snapshot::{LineageSnapshot, SnapshotMaterializer};
use crate::lineage::traversal::{Direction, TraversalEngine, TraversalRequest, TraversalResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use tracing::{info, warn};

/// Risk level for impact analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Grades the number of affected downstream objects
    pub fn from_affected(count: usize) -> Self {
        match count {
            0..=2 => RiskLevel::Low,
            3..=10 => RiskLevel::Medium,
            11..=50 => RiskLevel::High,
            _ => RiskLevel::Critical,
        }
    }
}

/// Aggregated view of a forward traversal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpactSummary {
    pub object_id: String,
    pub affected: usize,
    pub deepest_level: u32,
    pub by_kind: BTreeMap<ObjectKind, usize>,
    pub by_layer: BTreeMap<Layer, usize>,
    pub risk_level: RiskLevel,
    pub summary: String,
}

impl ImpactSummary {
    fn from_result(result: &TraversalResult) -> Self {
        let mut by_kind = BTreeMap::new();
        let mut by_layer = BTreeMap::new();
        for entry in &result.entries {
            *by_kind.entry(entry.object_kind).or_insert(0) += 1;
            *by_layer.entry(entry.layer).or_insert(0) += 1;
        }

        let affected = result.len();
        Self {
            object_id: result.root_id.clone(),
            affected,
            deepest_level: result.deepest_level(),
            by_kind,
            by_layer,
            risk_level: RiskLevel::from_affected(affected),
            summary: format!(
                "Changes to {} may affect {} downstream objects across {} levels",
                result.root_id,
                affected,
                result.deepest_level()
            ),
        }
    }
}

/// Read-only operations for operators and alerting tooling.
///
/// Depths default to `traversal.default_max_depth` and may not exceed
/// `traversal.max_allowed_depth`. Every traversal runs under
/// `traversal.query_timeout`.
#[derive(Clone)]
pub struct LineageQueryService {
    engine: TraversalEngine,
    materializer: Arc<SnapshotMaterializer>,
    config: TraversalConfig,
}

impl LineageQueryService {
    /// Creates a query service
    pub fn new(engine: TraversalEngine, materializer: Arc<SnapshotMaterializer>, config: TraversalConfig) -> Self {
        Self {
            engine,
            materializer,
            config,
        }
    }

    fn resolve_depth(&self, max_depth: Option<u32>) -> Result<u32> {
        let depth = max_depth.unwrap_or(self.config.default_max_depth);
        if depth > self.config.max_allowed_depth {
            return Err(LineageError::DepthLimitExceeded {
                requested: depth,
                limit: self.config.max_allowed_depth,
            });
        }
        Ok(depth)
    }

    async fn with_timeout<T>(&self, what: &str, fut: impl Future<Output = Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.config.query_timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!(query = what, timeout = ?self.config.query_timeout, "Query timed out");
                Err(LineageError::Cancelled(format!(
                    "{} timed out after {:?}",
                    what, self.config.query_timeout
                )))
            }
        }
    }

    /// Runs a traversal in either direction under a caller-held cancel token
    pub async fn execute(
        &self,
        object_id: &str,
        direction: Direction,
        max_depth: Option<u32>,
        cancel: &CancelToken,
    ) -> Result<TraversalResult> {
        let request = TraversalRequest::new(object_id, direction, self.resolve_depth(max_depth)?);
        let result = self
            .with_timeout("traversal", self.engine.traverse(&request, cancel))
            .await?;
        info!(
            root = object_id,
            direction = %direction,
            depth = request.max_depth,
            found = result.len(),
            "Traversal complete"
        );
        Ok(result)
    }

    /// What breaks downstream if `object_id` changes
    pub async fn impact_of(&self, object_id: &str, max_depth: Option<u32>) -> Result<TraversalResult> {
        self.execute(object_id, Direction::Forward, max_depth, &CancelToken::never())
            .await
    }

    /// Where the data in `object_id` came from
    pub async fn lineage_of(&self, object_id: &str, max_depth: Option<u32>) -> Result<TraversalResult> {
        self.execute(object_id, Direction::Backward, max_depth, &CancelToken::never())
            .await
    }

    /// Latest materialized full map. Never traverses.
    pub async fn full_map(&self) -> Arc<LineageSnapshot> {
        self.materializer.current().await
    }

    /// Shortest forward derivation path between two objects
    pub async fn path_between(&self, from: &str, to: &str, max_depth: Option<u32>) -> Result<Option<Vec<String>>> {
        let depth = self.resolve_depth(max_depth)?;
        self.with_timeout(
            "path",
            self.engine.shortest_path(from, to, depth, &CancelToken::never()),
        )
        .await
    }

    /// Counts and risk grade for everything downstream of `object_id`
    pub async fn impact_summary(&self, object_id: &str, max_depth: Option<u32>) -> Result<ImpactSummary> {
        let result = self.impact_of(object_id, max_depth).await?;
        Ok(ImpactSummary::from_result(&result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::cancel_pair;
    use crate::error::ErrorCategory;
    use crate::lineage::catalog::ObjectCatalog;
    use crate::lineage::edges::{DependencyEdge, EdgeSource, EdgeStore};
    use async_trait::async_trait;
    use std::time::Duration;

    async fn service_with(config: TraversalConfig) -> LineageQueryService {
        let catalog = Arc::new(ObjectCatalog::new());
        catalog.ensure("raw.sales", ObjectKind::RawTable).await.unwrap();
        catalog.ensure("staging.stg_sales", ObjectKind::StagingTable).await.unwrap();
        catalog.ensure("curated.fact_sales", ObjectKind::CuratedFact).await.unwrap();
        let store = Arc::new(EdgeStore::new(catalog.clone()));
        store.add_edge("raw.sales", "staging.stg_sales", "stream+task").await.unwrap();
        store.add_edge("staging.stg_sales", "curated.fact_sales", "merge").await.unwrap();

        let engine = TraversalEngine::new(catalog.clone(), store.clone());
        let materializer = Arc::new(SnapshotMaterializer::new(catalog, store));
        LineageQueryService::new(engine, materializer, config)
    }

    #[tokio::test]
    async fn test_impact_and_lineage() {
        let service = service_with(TraversalConfig::default()).await;

        let impact = service.impact_of("raw.sales", None).await.unwrap();
        assert_eq!(impact.pairs(), vec![(1, "staging.stg_sales"), (2, "curated.fact_sales")]);
        assert_eq!(impact.max_depth, 5);

        let lineage = service.lineage_of("curated.fact_sales", Some(1)).await.unwrap();
        assert_eq!(lineage.pairs(), vec![(1, "staging.stg_sales")]);
    }

    #[tokio::test]
    async fn test_depth_limit_enforced() {
        let service = service_with(TraversalConfig::default()).await;
        let err = service.impact_of("raw.sales", Some(1000)).await.unwrap_err();
        assert!(matches!(err, LineageError::DepthLimitExceeded { requested: 1000, limit: 64 }));
        assert_eq!(err.category(), ErrorCategory::InvalidInput);
    }

    #[tokio::test]
    async fn test_unknown_object_is_not_found() {
        let service = service_with(TraversalConfig::default()).await;
        let err = service.lineage_of("raw.missing", None).await.unwrap_err();
        assert_eq!(err.category(), ErrorCategory::NotFound);
    }

    #[tokio::test]
    async fn test_caller_cancellation() {
        let service = service_with(TraversalConfig::default()).await;
        let (handle, token) = cancel_pair();
        handle.cancel();
        let err = service
            .execute("raw.sales", Direction::Forward, None, &token)
            .await
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Cancelled);
    }

    struct SlowSource;

    #[async_trait]
    impl EdgeSource for SlowSource {
        async fn edges_from(&self, _id: &str) -> Result<Vec<DependencyEdge>> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Vec::new())
        }

        async fn edges_to(&self, _id: &str) -> Result<Vec<DependencyEdge>> {
            Ok(Vec::new())
        }

        async fn all_edges(&self) -> Result<Vec<DependencyEdge>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_timeout_cancels() {
        let catalog = Arc::new(ObjectCatalog::new());
        catalog.ensure("raw.sales", ObjectKind::RawTable).await.unwrap();
        let source: Arc<dyn EdgeSource> = Arc::new(SlowSource);
        let engine = TraversalEngine::new(catalog.clone(), source.clone());
        let materializer = Arc::new(SnapshotMaterializer::new(catalog, source));
        let config = TraversalConfig {
            query_timeout: Duration::from_millis(20),
            ..TraversalConfig::default()
        };
        let service = LineageQueryService::new(engine, materializer, config);

        let err = service.impact_of("raw.sales", None).await.unwrap_err();
        assert!(matches!(err, LineageError::Cancelled(_)));
    }

    #[tokio::test]
    async fn test_caller_cancellation_mid_walk() {
        let catalog = Arc::new(ObjectCatalog::new());
        catalog.ensure("raw.sales", ObjectKind::RawTable).await.unwrap();
        let source: Arc<dyn EdgeSource> = Arc::new(SlowSource);
        let engine = TraversalEngine::new(catalog.clone(), source.clone());
        let materializer = Arc::new(SnapshotMaterializer::new(catalog, source));
        let service = LineageQueryService::new(engine, materializer, TraversalConfig::default());

        let (handle, token) = cancel_pair();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            handle.cancel();
        });

        let started = std::time::Instant::now();
        let err = service
            .execute("raw.sales", Direction::Forward, None, &token)
            .await
            .unwrap_err();
        assert!(matches!(err, LineageError::Cancelled(_)));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_full_map_reads_snapshot() {
        let service = service_with(TraversalConfig::default()).await;
        assert!(service.full_map().await.is_empty());

        service.materializer.rebuild().await.unwrap();
        assert_eq!(service.full_map().await.len(), 2);
    }

    #[tokio::test]
    async fn test_path_between() {
        let service = service_with(TraversalConfig::default()).await;
        let path = service
            .path_between("raw.sales", "curated.fact_sales", None)
            .await
            .unwrap();
        assert_eq!(
            path,
            Some(vec![
                "raw.sales".to_string(),
                "staging.stg_sales".to_string(),
                "curated.fact_sales".to_string()
            ])
        );
    }

    #[tokio::test]
    async fn test_impact_summary() {
        let service = service_with(TraversalConfig::default()).await;
        let summary = service.impact_summary("raw.sales", None).await.unwrap();
        assert_eq!(summary.affected, 2);
        assert_eq!(summary.deepest_level, 2);
        assert_eq!(summary.by_kind.get(&ObjectKind::CuratedFact), Some(&1));
        assert_eq!(summary.by_layer.get(&Layer::Staging), Some(&1));
        assert_eq!(summary.risk_level, RiskLevel::Low);
    }

    #[test]
    fn test_risk_levels() {
        assert_eq!(RiskLevel::from_affected(0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_affected(5), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_affected(20), RiskLevel::High);
        assert_eq!(RiskLevel::from_affected(51), RiskLevel::Critical);
        assert!(RiskLevel::Critical > RiskLevel::High);
    }
}
