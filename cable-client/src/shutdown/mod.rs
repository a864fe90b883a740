//! Stop signal for the client's background loops

use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{info, warn};

/// Shutdown state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownState {
    Running,
    Shutdown,
}

/// Broadcasts a single stop signal to every subscribed loop
#[derive(Clone)]
pub struct ShutdownCoordinator {
    state: Arc<RwLock<ShutdownState>>,
    shutdown_tx: broadcast::Sender<()>,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        let (shutdown_tx, _) = broadcast::channel(4);

        Self {
            state: Arc::new(RwLock::new(ShutdownState::Running)),
            shutdown_tx,
        }
    }

    /// Subscribe to the stop signal
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Signal every loop to stop. Later calls are no-ops.
    pub async fn shutdown(&self) {
        let mut state = self.state.write().await;
        if *state == ShutdownState::Shutdown {
            warn!("Shutdown already signalled");
            return;
        }
        *state = ShutdownState::Shutdown;
        drop(state);

        info!("Stopping background loops");
        // No receivers just means nothing was running
        let _ = self.shutdown_tx.send(());
    }

    pub async fn is_shut_down(&self) -> bool {
        *self.state.read().await == ShutdownState::Shutdown
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_shutdown_reaches_subscribers() {
        let coordinator = ShutdownCoordinator::new();
        let mut rx = coordinator.subscribe();

        assert!(!coordinator.is_shut_down().await);
        coordinator.shutdown().await;
        assert!(coordinator.is_shut_down().await);

        let signal = tokio::time::timeout(Duration::from_millis(100), rx.recv()).await;
        assert!(matches!(signal, Ok(Ok(()))));
    }

    #[tokio::test]
    async fn test_shutdown_is_idempotent() {
        let coordinator = ShutdownCoordinator::new();
        let mut rx = coordinator.subscribe();
        coordinator.shutdown().await;
        coordinator.shutdown().await;

        assert!(rx.recv().await.is_ok());
        assert!(rx.try_recv().is_err());
    }
}
