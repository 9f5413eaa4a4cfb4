//! Materialized full-graph lineage map.
//!
//! The materializer flattens the entire edge set into denormalized rows so
//! full-map reads never traverse. A rebuild is assembled off to the side and
//! published with a single pointer swap, so readers see either the previous
//! snapshot or the new one in full. A failed rebuild leaves the previous
//! snapshot in place.

use crate::error::Result;
use crate::lineage::catalog::{Layer, ObjectCatalog, ObjectKind};
use crate::lineage::edges::EdgeSource;
use crate::observability;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

/// One flattened edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotRow {
    pub source_path: String,
    pub source_kind: ObjectKind,
    pub target_path: String,
    pub target_kind: ObjectKind,
    pub source_layer: Layer,
    pub target_layer: Layer,
    pub relation_kind: String,
    pub observed_at: DateTime<Utc>,
}

/// A consistent, point-in-time flattening of the edge set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineageSnapshot {
    /// Monotonic per materializer; 0 means never built.
    pub version: u64,
    /// When the rebuild that produced this snapshot finished.
    pub built_at: Option<DateTime<Utc>>,
    /// Rows ordered by source then target.
    pub rows: Vec<SnapshotRow>,
}

impl LineageSnapshot {
    /// The placeholder published before the first rebuild.
    pub fn empty() -> Self {
        Self {
            version: 0,
            built_at: None,
            rows: Vec::new(),
        }
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the snapshot holds no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows whose source is `source_path`
    pub fn rows_from<'a>(&'a self, source_path: &'a str) -> impl Iterator<Item = &'a SnapshotRow> + 'a {
        self.rows.iter().filter(move |row| row.source_path == source_path)
    }

    /// Rows whose target is `target_path`
    pub fn rows_to<'a>(&'a self, target_path: &'a str) -> impl Iterator<Item = &'a SnapshotRow> + 'a {
        self.rows.iter().filter(move |row| row.target_path == target_path)
    }

    /// Time since the snapshot was built, `None` if it never was
    pub fn age(&self) -> Option<Duration> {
        self.built_at
            .map(|at| (Utc::now() - at).to_std().unwrap_or_default())
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl Default for LineageSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}

/// Rebuilds and publishes [`LineageSnapshot`]s on external demand.
pub struct SnapshotMaterializer {
    catalog: Arc<ObjectCatalog>,
    edges: Arc<dyn EdgeSource>,
    current: RwLock<Arc<LineageSnapshot>>,
    version: AtomicU64,
    /// Serializes rebuilds so versions publish in order.
    rebuild_lock: Mutex<()>,
}

impl SnapshotMaterializer {
    /// Creates a materializer publishing an empty snapshot
    pub fn new(catalog: Arc<ObjectCatalog>, edges: Arc<dyn EdgeSource>) -> Self {
        Self {
            catalog,
            edges,
            current: RwLock::new(Arc::new(LineageSnapshot::empty())),
            version: AtomicU64::new(0),
            rebuild_lock: Mutex::new(()),
        }
    }

    /// Latest published snapshot
    pub async fn current(&self) -> Arc<LineageSnapshot> {
        Arc::clone(&*self.current.read().await)
    }

    /// Finish time of the latest successful rebuild
    pub async fn last_rebuilt_at(&self) -> Option<DateTime<Utc>> {
        self.current.read().await.built_at
    }

    /// Rebuild now and publish the result.
    pub async fn rebuild(&self) -> Result<Arc<LineageSnapshot>> {
        let _guard = self.rebuild_lock.lock().await;

        let snapshot = match self.build().await {
            Ok(snapshot) => Arc::new(snapshot),
            Err(e) => {
                warn!(error = %e, "Snapshot rebuild failed, keeping previous snapshot");
                observability::record_snapshot_failure();
                return Err(e);
            }
        };

        *self.current.write().await = Arc::clone(&snapshot);

        info!(
            version = snapshot.version,
            rows = snapshot.len(),
            "Published lineage snapshot"
        );
        observability::record_snapshot_rebuild(snapshot.len());
        Ok(snapshot)
    }

    async fn build(&self) -> Result<LineageSnapshot> {
        let edges = self.edges.all_edges().await?;
        let objects = self
            .catalog
            .get_many(
                edges
                    .iter()
                    .flat_map(|e| [e.source_id.as_str(), e.target_id.as_str()]),
            )
            .await?;

        let mut rows = Vec::with_capacity(edges.len());
        for edge in edges {
            // get_many already failed on unknown ids
            let (Some(source), Some(target)) = (objects.get(&edge.source_id), objects.get(&edge.target_id)) else {
                continue;
            };
            rows.push(SnapshotRow {
                source_kind: source.kind,
                source_layer: source.layer,
                target_kind: target.kind,
                target_layer: target.layer,
                source_path: edge.source_id,
                target_path: edge.target_id,
                relation_kind: edge.relation_kind,
                observed_at: edge.observed_at,
            });
        }

        Ok(LineageSnapshot {
            version: self.version.fetch_add(1, Ordering::SeqCst) + 1,
            built_at: Some(Utc::now()),
            rows,
        })
    }
}
