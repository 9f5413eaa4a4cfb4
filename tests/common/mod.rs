//! Common test utilities for integration tests.

pub mod fixtures;

pub use fixtures::*;

use tributary::config::LineageConfig;
use tributary::lineage::LineageEngine;

/// Fresh engine with default configuration.
pub fn engine() -> LineageEngine {
    LineageEngine::new(&LineageConfig::default())
}

/// Test concurrency utilities
pub mod concurrency {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Counter for tracking concurrent operations
    #[derive(Clone, Default)]
    pub struct ConcurrencyTracker {
        current: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    impl ConcurrencyTracker {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn enter(&self) -> ConcurrencyGuard {
            let current = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(current, Ordering::SeqCst);
            ConcurrencyGuard {
                tracker: self.clone(),
            }
        }

        pub fn peak(&self) -> usize {
            self.peak.load(Ordering::SeqCst)
        }
    }

    pub struct ConcurrencyGuard {
        tracker: ConcurrencyTracker,
    }

    impl Drop for ConcurrencyGuard {
        fn drop(&mut self) {
            self.tracker.current.fetch_sub(1, Ordering::SeqCst);
        }
    }
}
