// Edge Ingestion from Collaborators

use crate::error::{LineageError, Result};
use crate::lineage::catalog::{validate_identity, ObjectCatalog, ObjectKind};
use crate::lineage::edges::{EdgeRef, EdgeStore};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// A derivation reported by deployment tooling or a catalog watcher
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeObservation {
    pub source_object: String,
    pub source_kind: ObjectKind,
    pub target_object: String,
    pub target_kind: ObjectKind,
    #[serde(default = "default_relation_kind")]
    pub relation_kind: String,
}

fn default_relation_kind() -> String {
    "derived".to_string()
}

impl EdgeObservation {
    /// Creates an observation
    pub fn new(
        source_object: impl Into<String>,
        source_kind: ObjectKind,
        target_object: impl Into<String>,
        target_kind: ObjectKind,
        relation_kind: impl Into<String>,
    ) -> Self {
        Self {
            source_object: source_object.into(),
            source_kind,
            target_object: target_object.into(),
            target_kind,
            relation_kind: relation_kind.into(),
        }
    }

    /// Reads a JSON array of observations
    pub fn load_file(path: &Path) -> Result<Vec<EdgeObservation>> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Outcome of a batch report
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Edges stored
    pub accepted: Vec<EdgeRef>,
    /// Index into the batch and the reason it was rejected
    pub rejected: Vec<(usize, LineageError)>,
}

impl BatchReport {
    /// Whether every observation was stored
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }
}

/// Turns observations into catalog registrations and edges.
pub struct EdgeIngestor {
    catalog: Arc<ObjectCatalog>,
    store: Arc<EdgeStore>,
}

impl EdgeIngestor {
    /// Creates an ingestor
    pub fn new(catalog: Arc<ObjectCatalog>, store: Arc<EdgeStore>) -> Self {
        Self { catalog, store }
    }

    /// Registers both endpoints if needed and records the edge.
    ///
    /// The observation is validated before anything is registered, so a
    /// rejected report leaves the catalog untouched.
    pub async fn report(&self, observation: &EdgeObservation) -> Result<EdgeRef> {
        validate_identity(&observation.source_object)?;
        validate_identity(&observation.target_object)?;
        if observation.source_object == observation.target_object {
            return Err(LineageError::SelfReferential(observation.source_object.clone()));
        }

        self.catalog
            .ensure(&observation.source_object, observation.source_kind)
            .await?;
        self.catalog
            .ensure(&observation.target_object, observation.target_kind)
            .await?;

        self.store
            .add_edge(
                &observation.source_object,
                &observation.target_object,
                &observation.relation_kind,
            )
            .await
    }

    /// Reports every observation, continuing past rejections.
    pub async fn report_batch(&self, observations: &[EdgeObservation]) -> BatchReport {
        let mut report = BatchReport::default();
        for (i, observation) in observations.iter().enumerate() {
            match self.report(observation).await {
                Ok(edge) => report.accepted.push(edge),
                Err(e) => {
                    warn!(
                        index = i,
                        source = %observation.source_object,
                        target = %observation.target_object,
                        error = %e,
                        "Rejected edge observation"
                    );
                    report.rejected.push((i, e));
                }
            }
        }
        info!(
            accepted = report.accepted.len(),
            rejected = report.rejected.len(),
            "Ingested edge observations"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lineage::catalog::Layer;
    use crate::lineage::edges::EdgeSource;
    use std::io::Write;

    fn ingestor() -> (Arc<ObjectCatalog>, Arc<EdgeStore>, EdgeIngestor) {
        let catalog = Arc::new(ObjectCatalog::new());
        let store = Arc::new(EdgeStore::new(catalog.clone()));
        let ingestor = EdgeIngestor::new(catalog.clone(), store.clone());
        (catalog, store, ingestor)
    }

    #[tokio::test]
    async fn test_report_registers_endpoints() {
        let (catalog, store, ingestor) = ingestor();
        ingestor
            .report(&EdgeObservation::new(
                "raw.sales",
                ObjectKind::RawTable,
                "staging.stg_sales",
                ObjectKind::StagingTable,
                "stream+task",
            ))
            .await
            .unwrap();

        let source = catalog.get("raw.sales").await.unwrap();
        assert_eq!(source.layer, Layer::Landing);
        let target = catalog.get("staging.stg_sales").await.unwrap();
        assert_eq!(target.kind, ObjectKind::StagingTable);
        assert_eq!(store.edges_from("raw.sales").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_rejected_report_registers_nothing() {
        let (catalog, _store, ingestor) = ingestor();
        let err = ingestor
            .report(&EdgeObservation::new(
                "raw.sales",
                ObjectKind::RawTable,
                "raw.sales",
                ObjectKind::RawTable,
                "loop",
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, LineageError::SelfReferential(_)));

        let err = ingestor
            .report(&EdgeObservation::new(
                "raw.sales",
                ObjectKind::RawTable,
                "bad id",
                ObjectKind::View,
                "view",
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, LineageError::InvalidIdentity(_)));
        assert!(catalog.is_empty().await);
    }

    #[tokio::test]
    async fn test_report_batch_continues_past_rejections() {
        let (_catalog, store, ingestor) = ingestor();
        let batch = vec![
            EdgeObservation::new("raw.a", ObjectKind::RawTable, "staging.a", ObjectKind::StagingTable, "copy"),
            EdgeObservation::new("staging.a", ObjectKind::StagingTable, "staging.a", ObjectKind::StagingTable, "loop"),
            EdgeObservation::new("staging.a", ObjectKind::StagingTable, "curated.a", ObjectKind::CuratedFact, "merge"),
        ];

        let report = ingestor.report_batch(&batch).await;
        assert_eq!(report.accepted.len(), 2);
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].0, 1);
        assert!(!report.is_clean());
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_report_keeps_dropped_object_inactive() {
        let (catalog, _store, ingestor) = ingestor();
        let observation = EdgeObservation::new(
            "raw.sales",
            ObjectKind::RawTable,
            "staging.stg_sales",
            ObjectKind::StagingTable,
            "copy",
        );
        ingestor.report(&observation).await.unwrap();
        catalog.mark_inactive("staging.stg_sales").await.unwrap();

        ingestor.report(&observation).await.unwrap();
        ingestor
            .report(&EdgeObservation {
                target_kind: ObjectKind::View,
                ..observation.clone()
            })
            .await
            .unwrap();
        assert!(!catalog.get("staging.stg_sales").await.unwrap().active);
    }

    #[test]
    fn test_load_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"source_object": "raw.sales", "source_kind": "raw-table",
                 "target_object": "staging.stg_sales", "target_kind": "staging-table"}}]"#
        )
        .unwrap();

        let observations = EdgeObservation::load_file(file.path()).unwrap();
        assert_eq!(observations.len(), 1);
        assert_eq!(observations[0].relation_kind, "derived");
        assert_eq!(observations[0].target_kind, ObjectKind::StagingTable);
    }
}
