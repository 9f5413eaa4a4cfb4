// Object Catalog for Lineage

use crate::error::{LineageError, Result};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Kind of pipeline object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ObjectKind {
    /// Landing table fed by ingestion
    RawTable,
    /// Cleaned, typed staging table
    StagingTable,
    /// Curated fact table
    CuratedFact,
    /// Curated dimension table
    CuratedDimension,
    /// Plain view
    View,
    /// Materialized view
    MaterializedView,
    /// Scheduled aggregate table
    AggregateTable,
    /// Continuous ingestion pipe
    Pipe,
    /// Scheduled task
    Task,
    /// Stored procedure
    Procedure,
    /// External stage or bucket
    ExternalStorage,
}

impl ObjectKind {
    /// All kinds, in declaration order.
    pub const ALL: [ObjectKind; 11] = [
        ObjectKind::RawTable,
        ObjectKind::StagingTable,
        ObjectKind::CuratedFact,
        ObjectKind::CuratedDimension,
        ObjectKind::View,
        ObjectKind::MaterializedView,
        ObjectKind::AggregateTable,
        ObjectKind::Pipe,
        ObjectKind::Task,
        ObjectKind::Procedure,
        ObjectKind::ExternalStorage,
    ];

    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::RawTable => "raw-table",
            ObjectKind::StagingTable => "staging-table",
            ObjectKind::CuratedFact => "curated-fact",
            ObjectKind::CuratedDimension => "curated-dimension",
            ObjectKind::View => "view",
            ObjectKind::MaterializedView => "materialized-view",
            ObjectKind::AggregateTable => "aggregate-table",
            ObjectKind::Pipe => "pipe",
            ObjectKind::Task => "task",
            ObjectKind::Procedure => "procedure",
            ObjectKind::ExternalStorage => "external-storage",
        }
    }

    /// Layer an object of this kind usually lives in.
    pub fn default_layer(&self) -> Layer {
        match self {
            ObjectKind::RawTable | ObjectKind::Pipe => Layer::Landing,
            ObjectKind::StagingTable => Layer::Staging,
            ObjectKind::CuratedFact | ObjectKind::CuratedDimension => Layer::Curated,
            ObjectKind::View | ObjectKind::MaterializedView | ObjectKind::AggregateTable => {
                Layer::Analytics
            }
            ObjectKind::Task | ObjectKind::Procedure | ObjectKind::ExternalStorage => {
                Layer::External
            }
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectKind {
    type Err = LineageError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        ObjectKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| LineageError::InvalidIdentity(format!("unknown object kind {}", s)))
    }
}

/// Coarse pipeline stage, used for presentation grouping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    Landing,
    Staging,
    Curated,
    Analytics,
    External,
}

impl Layer {
    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Layer::Landing => "landing",
            Layer::Staging => "staging",
            Layer::Curated => "curated",
            Layer::Analytics => "analytics",
            Layer::External => "external",
        }
    }

    /// Infers the layer from the namespace prefix of a qualified id,
    /// falling back to the kind's usual layer.
    pub fn infer(id: &str, kind: ObjectKind) -> Layer {
        let prefix = id.split('.').next().unwrap_or_default().to_ascii_lowercase();
        match prefix.as_str() {
            "raw" | "landing" => Layer::Landing,
            "staging" | "stg" => Layer::Staging,
            "curated" => Layer::Curated,
            "analytics" | "reporting" => Layer::Analytics,
            "external" | "ext" => Layer::External,
            _ => kind.default_layer(),
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Layer {
    type Err = LineageError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "landing" => Ok(Layer::Landing),
            "staging" => Ok(Layer::Staging),
            "curated" => Ok(Layer::Curated),
            "analytics" => Ok(Layer::Analytics),
            "external" => Ok(Layer::External),
            other => Err(LineageError::InvalidIdentity(format!("unknown layer {}", other))),
        }
    }
}

fn identity_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^[A-Za-z0-9_$-]+(\.[A-Za-z0-9_$-]+)+$").ok())
        .as_ref()
}

/// Checks that `id` is a qualified name such as `raw.sales` or `db.curated.fact_sales`.
pub fn validate_identity(id: &str) -> Result<()> {
    match identity_pattern() {
        Some(re) if !id.is_empty() && re.is_match(id) => Ok(()),
        _ => Err(LineageError::InvalidIdentity(id.to_string())),
    }
}

/// A registered pipeline object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaObject {
    /// Qualified name
    pub id: String,
    /// Object kind
    pub kind: ObjectKind,
    /// Pipeline layer
    pub layer: Layer,
    /// False once the underlying object has been dropped
    pub active: bool,
    /// First registration time
    pub registered_at: DateTime<Utc>,
    /// Last change time
    pub updated_at: DateTime<Utc>,
}

impl SchemaObject {
    /// Creates a new active object
    pub fn new(id: impl Into<String>, kind: ObjectKind, layer: Layer) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            kind,
            layer,
            active: true,
            registered_at: now,
            updated_at: now,
        }
    }
}

/// Registry of known pipeline objects.
///
/// Objects are never removed; dropped objects are marked inactive so that
/// historical edges keep resolving.
#[derive(Debug, Default)]
pub struct ObjectCatalog {
    objects: RwLock<HashMap<String, SchemaObject>>,
}

impl ObjectCatalog {
    /// Creates an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an object, or updates its kind and layer if it already exists.
    ///
    /// Registering an inactive object reactivates it.
    pub async fn register(&self, id: &str, kind: ObjectKind, layer: Layer) -> Result<SchemaObject> {
        validate_identity(id)?;

        let mut objects = self.objects.write().await;
        match objects.get_mut(id) {
            Some(existing) => {
                if existing.kind != kind || existing.layer != layer || !existing.active {
                    existing.kind = kind;
                    existing.layer = layer;
                    existing.active = true;
                    existing.updated_at = Utc::now();
                    debug!(id, kind = %kind, layer = %layer, "Updated catalog object");
                }
                Ok(existing.clone())
            }
            None => {
                let object = SchemaObject::new(id, kind, layer);
                info!(id, kind = %kind, layer = %layer, "Registered catalog object");
                objects.insert(id.to_string(), object.clone());
                Ok(object)
            }
        }
    }

    /// Registers an object with an inferred layer if it is unknown.
    ///
    /// A known object keeps its layer and its active flag; only the kind
    /// follows the report. Reactivation goes through [`register`](Self::register).
    pub async fn ensure(&self, id: &str, kind: ObjectKind) -> Result<SchemaObject> {
        validate_identity(id)?;

        let mut objects = self.objects.write().await;
        match objects.get_mut(id) {
            Some(existing) => {
                if existing.kind != kind {
                    existing.kind = kind;
                    existing.updated_at = Utc::now();
                    debug!(id, kind = %kind, "Updated catalog object kind");
                }
                Ok(existing.clone())
            }
            None => {
                let layer = Layer::infer(id, kind);
                let object = SchemaObject::new(id, kind, layer);
                info!(id, kind = %kind, layer = %layer, "Registered catalog object");
                objects.insert(id.to_string(), object.clone());
                Ok(object)
            }
        }
    }

    /// Checks whether an object is registered (active or not)
    pub async fn exists(&self, id: &str) -> bool {
        self.objects.read().await.contains_key(id)
    }

    /// Gets an object
    pub async fn get(&self, id: &str) -> Result<SchemaObject> {
        self.objects
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| LineageError::NotFound(id.to_string()))
    }

    /// Resolves several objects under one read lock, failing on the first unknown id
    pub async fn get_many<'a, I>(&self, ids: I) -> Result<HashMap<String, SchemaObject>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let objects = self.objects.read().await;
        let mut found = HashMap::new();
        for id in ids {
            let object = objects
                .get(id)
                .ok_or_else(|| LineageError::UnknownObject(id.to_string()))?;
            found.insert(id.to_string(), object.clone());
        }
        Ok(found)
    }

    /// Marks an object as dropped. Its edges are kept for historical lineage.
    pub async fn mark_inactive(&self, id: &str) -> Result<()> {
        let mut objects = self.objects.write().await;
        let object = objects
            .get_mut(id)
            .ok_or_else(|| LineageError::NotFound(id.to_string()))?;
        if object.active {
            object.active = false;
            object.updated_at = Utc::now();
            info!(id, "Marked catalog object inactive");
        }
        Ok(())
    }

    /// Lists all objects sorted by id
    pub async fn list(&self) -> Vec<SchemaObject> {
        let mut objects: Vec<_> = self.objects.read().await.values().cloned().collect();
        objects.sort_by(|a, b| a.id.cmp(&b.id));
        objects
    }

    /// Number of registered objects
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    /// Whether the catalog is empty
    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}
