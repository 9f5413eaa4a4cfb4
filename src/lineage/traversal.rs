// Bounded Graph Traversal

use crate::cancel::CancelToken;
use crate::error::{LineageError, Result};
use crate::lineage::catalog::{Layer, ObjectCatalog, ObjectKind};
use crate::lineage::edges::EdgeSource;
use crate::observability;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Depth used when a caller does not specify one.
pub const DEFAULT_MAX_DEPTH: u32 = 5;

/// Converts a caller-supplied signed depth, rejecting negative values.
pub fn depth_from_signed(depth: i64) -> Result<u32> {
    u32::try_from(depth).map_err(|_| LineageError::InvalidDepth(depth))
}

/// Traversal direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Who depends on me (impact)
    Forward,
    /// What do I depend on (lineage)
    Backward,
}

impl Direction {
    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Forward => "forward",
            Direction::Backward => "backward",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single traversal query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraversalRequest {
    pub root_id: String,
    pub direction: Direction,
    pub max_depth: u32,
}

impl TraversalRequest {
    /// Creates a request
    pub fn new(root_id: impl Into<String>, direction: Direction, max_depth: u32) -> Self {
        Self {
            root_id: root_id.into(),
            direction,
            max_depth,
        }
    }

    /// Forward request with the default depth
    pub fn forward(root_id: impl Into<String>) -> Self {
        Self::new(root_id, Direction::Forward, DEFAULT_MAX_DEPTH)
    }

    /// Backward request with the default depth
    pub fn backward(root_id: impl Into<String>) -> Self {
        Self::new(root_id, Direction::Backward, DEFAULT_MAX_DEPTH)
    }

    /// Overrides the depth
    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }
}

/// One reachable object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraversalEntry {
    /// Shortest hop count from the root
    pub level: u32,
    pub object_id: String,
    pub object_kind: ObjectKind,
    pub layer: Layer,
}

/// Objects reachable from a root, each at its minimum depth, ordered by
/// level and then by discovery order within the level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraversalResult {
    pub root_id: String,
    pub direction: Direction,
    pub max_depth: u32,
    pub entries: Vec<TraversalEntry>,
}

impl TraversalResult {
    fn empty(request: &TraversalRequest) -> Self {
        Self {
            root_id: request.root_id.clone(),
            direction: request.direction,
            max_depth: request.max_depth,
            entries: Vec::new(),
        }
    }

    /// Number of reachable objects
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is reachable
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Level at which an object was reached
    pub fn level_of(&self, object_id: &str) -> Option<u32> {
        self.entries
            .iter()
            .find(|e| e.object_id == object_id)
            .map(|e| e.level)
    }

    /// Whether an object was reached
    pub fn contains(&self, object_id: &str) -> bool {
        self.level_of(object_id).is_some()
    }

    /// `(level, object_id)` pairs in result order
    pub fn pairs(&self) -> Vec<(u32, &str)> {
        self.entries
            .iter()
            .map(|e| (e.level, e.object_id.as_str()))
            .collect()
    }

    /// Entries grouped by level
    pub fn by_level(&self) -> BTreeMap<u32, Vec<&TraversalEntry>> {
        let mut levels: BTreeMap<u32, Vec<&TraversalEntry>> = BTreeMap::new();
        for entry in &self.entries {
            levels.entry(entry.level).or_default().push(entry);
        }
        levels
    }

    /// Deepest level reached, 0 when empty
    pub fn deepest_level(&self) -> u32 {
        self.entries.iter().map(|e| e.level).max().unwrap_or(0)
    }
}

/// Breadth-first walker over an [`EdgeSource`].
///
/// A visited set seeded with the root guarantees every object is reported
/// once, at its shortest distance, and that cycles terminate.
#[derive(Clone)]
pub struct TraversalEngine {
    catalog: Arc<ObjectCatalog>,
    edges: Arc<dyn EdgeSource>,
}

impl TraversalEngine {
    /// Creates an engine reading from `edges` and resolving kinds in `catalog`
    pub fn new(catalog: Arc<ObjectCatalog>, edges: Arc<dyn EdgeSource>) -> Self {
        Self { catalog, edges }
    }

    async fn neighbors(&self, id: &str, direction: Direction) -> Result<Vec<String>> {
        let ids = match direction {
            Direction::Forward => self
                .edges
                .edges_from(id)
                .await?
                .into_iter()
                .map(|e| e.target_id)
                .collect(),
            Direction::Backward => self
                .edges
                .edges_to(id)
                .await?
                .into_iter()
                .map(|e| e.source_id)
                .collect(),
        };
        Ok(ids)
    }

    fn check_cancelled(cancel: &CancelToken, root: &str) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(LineageError::Cancelled(format!("traversal from {} abandoned", root)));
        }
        Ok(())
    }

    /// Runs a traversal. Any store failure or cancellation fails the whole
    /// request; no partial result is returned.
    ///
    /// Cancellation is observed even while an edge lookup is pending.
    pub async fn traverse(&self, request: &TraversalRequest, cancel: &CancelToken) -> Result<TraversalResult> {
        let root = request.root_id.as_str();
        let result = tokio::select! {
            walked = self.walk(request, cancel) => {
                walked.and_then(|found| Self::check_cancelled(cancel, root).map(|_| found))
            }
            _ = cancel.cancelled() => {
                debug!(root, direction = %request.direction, "Traversal cancelled mid-walk");
                Err(LineageError::Cancelled(format!("traversal from {} abandoned", root)))
            }
        };
        match &result {
            Ok(found) => observability::record_traversal(request.direction, found.len()),
            Err(e) => observability::record_traversal_failure(request.direction, e),
        }
        result
    }

    async fn walk(&self, request: &TraversalRequest, cancel: &CancelToken) -> Result<TraversalResult> {
        let root = request.root_id.as_str();
        if !self.catalog.exists(root).await {
            return Err(LineageError::UnknownRoot(root.to_string()));
        }

        let mut visited: HashSet<String> = HashSet::from([root.to_string()]);
        let mut discovered: Vec<(u32, String)> = Vec::new();
        let mut frontier: Vec<String> = vec![root.to_string()];

        for level in 1..=request.max_depth {
            Self::check_cancelled(cancel, root)?;

            let mut next = Vec::new();
            for node in &frontier {
                Self::check_cancelled(cancel, root)?;
                for neighbor in self.neighbors(node, request.direction).await? {
                    if visited.insert(neighbor.clone()) {
                        discovered.push((level, neighbor.clone()));
                        next.push(neighbor);
                    }
                }
            }

            debug!(
                root,
                direction = %request.direction,
                level,
                found = next.len(),
                "Expanded traversal level"
            );

            if next.is_empty() {
                break;
            }
            frontier = next;
        }

        if discovered.is_empty() {
            return Ok(TraversalResult::empty(request));
        }

        let objects = self
            .catalog
            .get_many(discovered.iter().map(|(_, id)| id.as_str()))
            .await?;

        let entries = discovered
            .into_iter()
            .filter_map(|(level, id)| {
                objects.get(&id).map(|object| TraversalEntry {
                    level,
                    object_kind: object.kind,
                    layer: object.layer,
                    object_id: id,
                })
            })
            .collect();

        Ok(TraversalResult {
            entries,
            ..TraversalResult::empty(request)
        })
    }

    /// Shortest forward derivation path from `from` to `to`, inclusive of
    /// both ends, within `max_depth` hops.
    pub async fn shortest_path(
        &self,
        from: &str,
        to: &str,
        max_depth: u32,
        cancel: &CancelToken,
    ) -> Result<Option<Vec<String>>> {
        tokio::select! {
            path = self.search_path(from, to, max_depth, cancel) => {
                path.and_then(|found| Self::check_cancelled(cancel, from).map(|_| found))
            }
            _ = cancel.cancelled() => {
                Err(LineageError::Cancelled(format!("path search from {} abandoned", from)))
            }
        }
    }

    async fn search_path(
        &self,
        from: &str,
        to: &str,
        max_depth: u32,
        cancel: &CancelToken,
    ) -> Result<Option<Vec<String>>> {
        for id in [from, to] {
            if !self.catalog.exists(id).await {
                return Err(LineageError::UnknownRoot(id.to_string()));
            }
        }
        if from == to {
            return Ok(Some(vec![from.to_string()]));
        }

        let mut parents: HashMap<String, String> = HashMap::new();
        let mut visited: HashSet<String> = HashSet::from([from.to_string()]);
        let mut queue: VecDeque<(String, u32)> = VecDeque::from([(from.to_string(), 0)]);

        while let Some((current, depth)) = queue.pop_front() {
            Self::check_cancelled(cancel, from)?;
            if depth >= max_depth {
                continue;
            }

            for next in self.neighbors(&current, Direction::Forward).await? {
                if !visited.insert(next.clone()) {
                    continue;
                }
                parents.insert(next.clone(), current.clone());
                if next == to {
                    let mut path = vec![next.clone()];
                    let mut cursor = next;
                    while let Some(parent) = parents.get(&cursor) {
                        path.push(parent.clone());
                        cursor = parent.clone();
                    }
                    path.reverse();
                    return Ok(Some(path));
                }
                queue.push_back((next, depth + 1));
            }
        }

        Ok(None)
    }
}
