//! Configuration module for Tributary.

use crate::error::{LineageError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main configuration for a lineage engine instance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LineageConfig {
    /// Traversal limits.
    #[serde(default)]
    pub traversal: TraversalConfig,
    /// Snapshot materialization settings.
    #[serde(default)]
    pub snapshot: SnapshotConfig,
    /// Observability configuration.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl LineageConfig {
    /// Load configuration from a file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            LineageError::Config(format!("Failed to read config file: {}", e))
        })?;

        let config: Self = serde_json::from_str(&content).map_err(|e| {
            LineageError::Config(format!("Failed to parse config: {}", e))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        if self.traversal.max_allowed_depth == 0 {
            return Err(LineageError::InvalidConfig {
                field: "traversal.max_allowed_depth".to_string(),
                reason: "Depth limit must be non-zero".to_string(),
            });
        }

        if self.traversal.default_max_depth > self.traversal.max_allowed_depth {
            return Err(LineageError::InvalidConfig {
                field: "traversal.default_max_depth".to_string(),
                reason: format!(
                    "Default depth {} exceeds the limit of {}",
                    self.traversal.default_max_depth, self.traversal.max_allowed_depth
                ),
            });
        }

        if self.traversal.query_timeout.is_zero() {
            return Err(LineageError::InvalidConfig {
                field: "traversal.query_timeout".to_string(),
                reason: "Query timeout must be non-zero".to_string(),
            });
        }

        if self.snapshot.rebuild_interval.is_zero() {
            return Err(LineageError::InvalidConfig {
                field: "snapshot.rebuild_interval".to_string(),
                reason: "Rebuild interval must be non-zero".to_string(),
            });
        }

        Ok(())
    }

    /// Create a configuration with short intervals for local runs.
    pub fn development() -> Self {
        Self {
            traversal: TraversalConfig {
                default_max_depth: 5,
                max_allowed_depth: 64,
                query_timeout: Duration::from_secs(5),
            },
            snapshot: SnapshotConfig {
                rebuild_interval: Duration::from_secs(10),
                staleness_threshold: Duration::from_secs(60),
            },
            observability: ObservabilityConfig {
                log_level: "debug".to_string(),
                json_logs: false,
            },
        }
    }
}

/// Traversal limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraversalConfig {
    /// Depth used when the caller does not ask for one.
    pub default_max_depth: u32,
    /// Hard ceiling on any requested depth.
    pub max_allowed_depth: u32,
    /// Time budget for a single query.
    #[serde(with = "humantime_serde")]
    pub query_timeout: Duration,
}

impl Default for TraversalConfig {
    fn default() -> Self {
        Self {
            default_max_depth: 5,
            max_allowed_depth: 64,
            query_timeout: Duration::from_secs(30),
        }
    }
}

/// Snapshot materialization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotConfig {
    /// How often the serve loop rebuilds the full map.
    #[serde(with = "humantime_serde")]
    pub rebuild_interval: Duration,
    /// Snapshot age beyond which the staleness rule fires.
    #[serde(with = "humantime_serde")]
    pub staleness_threshold: Duration,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            rebuild_interval: Duration::from_secs(5 * 60),
            staleness_threshold: Duration::from_secs(15 * 60),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level.
    pub log_level: String,
    /// Enable JSON logging.
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

/// Serde helper for Duration using humantime format.
pub mod humantime_serde {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{}ms", duration.as_millis()))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(serde::de::Error::custom)
    }

    fn scaled_secs(value: &str, unit: u64, original: &str) -> Result<Duration, String> {
        let v = value.parse::<u64>().map_err(|e| e.to_string())?;
        v.checked_mul(unit)
            .map(Duration::from_secs)
            .ok_or_else(|| format!("duration {} is too large", original))
    }

    pub(crate) fn parse_duration(s: &str) -> Result<Duration, String> {
        let s = s.trim();
        if let Some(ms) = s.strip_suffix("ms") {
            ms.parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|e| e.to_string())
        } else if let Some(s_val) = s.strip_suffix('s') {
            s_val
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|e| e.to_string())
        } else if let Some(m) = s.strip_suffix('m') {
            scaled_secs(m, 60, s)
        } else if let Some(h) = s.strip_suffix('h') {
            scaled_secs(h, 3600, s)
        } else {
            s.parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|e| e.to_string())
        }
    }
}
