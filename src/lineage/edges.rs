// Dependency Edge Store

use crate::error::{LineageError, Result};
use crate::lineage::catalog::{validate_identity, ObjectCatalog};
use crate::observability;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// A directed "target is derived from source" relation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyEdge {
    /// Upstream object
    pub source_id: String,
    /// Downstream object
    pub target_id: String,
    /// How the target is derived, e.g. "stream+task"
    pub relation_kind: String,
    /// Last time the derivation was reported
    pub observed_at: DateTime<Utc>,
}

/// Outcome of an edge write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeWrite {
    /// New pair
    Inserted,
    /// Known pair, relation kind changed
    Updated,
    /// Known pair, only the observation time moved
    Refreshed,
}

impl EdgeWrite {
    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeWrite::Inserted => "inserted",
            EdgeWrite::Updated => "updated",
            EdgeWrite::Refreshed => "refreshed",
        }
    }
}

/// Reference to a stored edge, returned by [`EdgeStore::add_edge`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeRef {
    pub source_id: String,
    pub target_id: String,
    pub observed_at: DateTime<Utc>,
    pub write: EdgeWrite,
}

/// Read access to an edge set.
///
/// The traversal engine and the snapshot materializer only need these reads,
/// so a slower backend can stand in for the in-memory store and surface
/// [`LineageError::StoreUnavailable`] when it cannot be reached.
#[async_trait]
pub trait EdgeSource: Send + Sync {
    /// Outgoing edges: objects derived from `id`, ordered by target.
    async fn edges_from(&self, id: &str) -> Result<Vec<DependencyEdge>>;

    /// Incoming edges: objects `id` was derived from, ordered by source.
    async fn edges_to(&self, id: &str) -> Result<Vec<DependencyEdge>>;

    /// Every edge, ordered by source then target.
    async fn all_edges(&self) -> Result<Vec<DependencyEdge>>;
}

type EdgeKey = (String, String);

/// Edge rows plus both adjacency indexes, guarded together so a reader never
/// sees an edge without its index entries.
#[derive(Debug, Default)]
struct EdgeIndex {
    edges: HashMap<EdgeKey, DependencyEdge>,
    outgoing: HashMap<String, BTreeSet<String>>,
    incoming: HashMap<String, BTreeSet<String>>,
}

impl EdgeIndex {
    fn collect(&self, id: &str, neighbors: &HashMap<String, BTreeSet<String>>, outgoing: bool) -> Vec<DependencyEdge> {
        let Some(ids) = neighbors.get(id) else {
            return Vec::new();
        };
        ids.iter()
            .filter_map(|other| {
                let key = if outgoing {
                    (id.to_string(), other.clone())
                } else {
                    (other.clone(), id.to_string())
                };
                self.edges.get(&key).cloned()
            })
            .collect()
    }
}

/// Append/update-only store of dependency edges, indexed by both endpoints.
pub struct EdgeStore {
    catalog: Arc<ObjectCatalog>,
    index: RwLock<EdgeIndex>,
}

impl EdgeStore {
    /// Creates an empty store validating endpoints against `catalog`
    pub fn new(catalog: Arc<ObjectCatalog>) -> Self {
        Self {
            catalog,
            index: RwLock::new(EdgeIndex::default()),
        }
    }

    /// Records that `target_id` is derived from `source_id`.
    ///
    /// Re-observing a known pair updates its relation kind and observation
    /// time in place.
    pub async fn add_edge(&self, source_id: &str, target_id: &str, relation_kind: &str) -> Result<EdgeRef> {
        if let Err(e) = self.validate(source_id, target_id).await {
            warn!(source = source_id, target = target_id, error = %e, "Rejected edge");
            observability::record_edge_rejected(&e);
            return Err(e);
        }

        let relation_kind = relation_kind.trim();
        let now = Utc::now();
        let key = (source_id.to_string(), target_id.to_string());

        let mut index = self.index.write().await;
        let write = match index.edges.get_mut(&key) {
            Some(edge) => {
                let write = if edge.relation_kind == relation_kind {
                    EdgeWrite::Refreshed
                } else {
                    edge.relation_kind = relation_kind.to_string();
                    EdgeWrite::Updated
                };
                edge.observed_at = now;
                write
            }
            None => {
                index.edges.insert(
                    key,
                    DependencyEdge {
                        source_id: source_id.to_string(),
                        target_id: target_id.to_string(),
                        relation_kind: relation_kind.to_string(),
                        observed_at: now,
                    },
                );
                index
                    .outgoing
                    .entry(source_id.to_string())
                    .or_default()
                    .insert(target_id.to_string());
                index
                    .incoming
                    .entry(target_id.to_string())
                    .or_default()
                    .insert(source_id.to_string());
                EdgeWrite::Inserted
            }
        };
        drop(index);

        debug!(source = source_id, target = target_id, write = write.as_str(), "Stored edge");
        observability::record_edge_observed(write);

        Ok(EdgeRef {
            source_id: source_id.to_string(),
            target_id: target_id.to_string(),
            observed_at: now,
            write,
        })
    }

    async fn validate(&self, source_id: &str, target_id: &str) -> Result<()> {
        validate_identity(source_id)?;
        validate_identity(target_id)?;
        if source_id == target_id {
            return Err(LineageError::SelfReferential(source_id.to_string()));
        }
        for id in [source_id, target_id] {
            if !self.catalog.exists(id).await {
                return Err(LineageError::UnknownObject(id.to_string()));
            }
        }
        Ok(())
    }

    /// Gets the edge for a pair
    pub async fn get(&self, source_id: &str, target_id: &str) -> Option<DependencyEdge> {
        let key = (source_id.to_string(), target_id.to_string());
        self.index.read().await.edges.get(&key).cloned()
    }

    /// Number of stored edges
    pub async fn len(&self) -> usize {
        self.index.read().await.edges.len()
    }

    /// Whether the store is empty
    pub async fn is_empty(&self) -> bool {
        self.index.read().await.edges.is_empty()
    }
}

#[async_trait]
impl EdgeSource for EdgeStore {
    async fn edges_from(&self, id: &str) -> Result<Vec<DependencyEdge>> {
        let index = self.index.read().await;
        Ok(index.collect(id, &index.outgoing, true))
    }

    async fn edges_to(&self, id: &str) -> Result<Vec<DependencyEdge>> {
        let index = self.index.read().await;
        Ok(index.collect(id, &index.incoming, false))
    }

    async fn all_edges(&self) -> Result<Vec<DependencyEdge>> {
        let mut edges: Vec<_> = self.index.read().await.edges.values().cloned().collect();
        edges.sort_by(|a, b| {
            a.source_id
                .cmp(&b.source_id)
                .then_with(|| a.target_id.cmp(&b.target_id))
        });
        Ok(edges)
    }
}
