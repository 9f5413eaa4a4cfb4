//! Stop signal for the `serve` maintenance loop.
//!
//! The loop waits on a [`ShutdownCoordinator`]; a [`SignalHandler`] trips it
//! on SIGTERM/SIGINT (Ctrl+C on Windows).

use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};

/// Shared stop flag. Clones observe the same flag.
#[derive(Clone)]
pub struct ShutdownCoordinator {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownCoordinator {
    /// Create a coordinator that has not been tripped.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Trip the flag. Only the first call logs.
    pub fn shutdown(&self) {
        let first = self.tx.send_if_modified(|stopping| !std::mem::replace(stopping, true));
        if first {
            info!("Stopping maintenance loop");
        }
    }

    /// Resolve once [`shutdown`](Self::shutdown) has been called, including
    /// calls made before this future was created.
    pub async fn wait_for_shutdown(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this cannot fail here
        let _ = rx.wait_for(|stopping| *stopping).await;
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// Trips a coordinator when the process is asked to stop.
pub struct SignalHandler {
    coordinator: ShutdownCoordinator,
}

impl SignalHandler {
    pub fn new(coordinator: ShutdownCoordinator) -> Self {
        Self { coordinator }
    }

    /// Wait for SIGTERM or SIGINT, then trip the coordinator.
    #[cfg(unix)]
    pub async fn run(self) {
        use tokio::signal::unix::{signal, SignalKind};

        let (mut sigterm, mut sigint) = match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(term), Ok(int)) => (term, int),
            (Err(e), _) | (_, Err(e)) => {
                error!(error = %e, "Failed to install signal handlers");
                return;
            }
        };

        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM"),
            _ = sigint.recv() => info!("Received SIGINT"),
        }

        self.coordinator.shutdown();
    }

    /// Wait for Ctrl+C, then trip the coordinator.
    #[cfg(windows)]
    pub async fn run(self) {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            return;
        }
        info!("Received Ctrl+C");
        self.coordinator.shutdown();
    }
}
