//! Error types for the Tributary lineage engine.
//!
//! This module provides a unified error type [`LineageError`] for all catalog,
//! edge-store and traversal operations, along with a convenient [`Result`]
//! type alias.
//!
//! # Error Categories
//!
//! Callers usually care less about the exact variant than about what to do
//! next, so every error maps onto an [`ErrorCategory`]:
//!
//! - **InvalidInput**: malformed identities, self-referential edges, bad depths.
//!   Fix the request.
//! - **NotFound**: the referenced object is not registered.
//! - **Unavailable**: the backing edge store could not be reached. Retry.
//! - **Cancelled**: the caller abandoned the query or it timed out.
//! - **Internal**: configuration, I/O and serialization failures. Alert.
//!
//! # Example
//!
//! ```rust
//! use tributary::error::{ErrorCategory, LineageError};
//!
//! let err = LineageError::SelfReferential("raw.sales".into());
//! assert_eq!(err.category(), ErrorCategory::InvalidInput);
//! assert!(!err.is_retryable());
//! ```

use serde::{Deserialize, Serialize};
use std::io;
use thiserror::Error;

/// Main error type for lineage operations.
#[derive(Error, Debug)]
pub enum LineageError {
    // Validation errors
    #[error("Invalid object identity: {0:?}")]
    InvalidIdentity(String),

    #[error("Edge from {0} to itself is not allowed")]
    SelfReferential(String),

    #[error("Invalid traversal depth: {0}")]
    InvalidDepth(i64),

    #[error("Traversal depth {requested} exceeds the limit of {limit}")]
    DepthLimitExceeded { requested: u32, limit: u32 },

    // Lookup errors
    #[error("Unknown object: {0}")]
    UnknownObject(String),

    #[error("Unknown traversal root: {0}")]
    UnknownRoot(String),

    #[error("Not found: {0}")]
    NotFound(String),

    // Runtime errors
    #[error("Traversal cancelled: {0}")]
    Cancelled(String),

    #[error("Edge store unavailable: {0}")]
    StoreUnavailable(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration: {field}: {reason}")]
    InvalidConfig { field: String, reason: String },

    // External errors
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification used by operator tooling to choose a reaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// The request itself does not make sense.
    InvalidInput,
    /// The request references something that does not exist.
    NotFound,
    /// The system could not serve the request right now.
    Unavailable,
    /// The caller abandoned the request.
    Cancelled,
    /// Anything else.
    Internal,
}

impl LineageError {
    /// Classify the error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            LineageError::InvalidIdentity(_)
            | LineageError::SelfReferential(_)
            | LineageError::InvalidDepth(_)
            | LineageError::DepthLimitExceeded { .. } => ErrorCategory::InvalidInput,
            LineageError::UnknownObject(_)
            | LineageError::UnknownRoot(_)
            | LineageError::NotFound(_) => ErrorCategory::NotFound,
            LineageError::StoreUnavailable(_) => ErrorCategory::Unavailable,
            LineageError::Cancelled(_) => ErrorCategory::Cancelled,
            LineageError::Config(_)
            | LineageError::InvalidConfig { .. }
            | LineageError::Io(_)
            | LineageError::Serialization(_)
            | LineageError::Internal(_) => ErrorCategory::Internal,
        }
    }

    /// Check if error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LineageError::StoreUnavailable(_))
    }
}

impl From<serde_json::Error> for LineageError {
    fn from(e: serde_json::Error) -> Self {
        LineageError::Serialization(e.to_string())
    }
}

/// Result type alias for lineage operations.
pub type Result<T> = std::result::Result<T, LineageError>;
