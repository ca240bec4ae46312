//! Signal handling for SIGTERM and SIGINT.
//!
//! A signal cancels the shared token. The backup step kills its child
//! process and removes the partial target; the retention step is not
//! interrupted once it has started.

use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Shutdown coordinator
pub struct ShutdownCoordinator {
    cancel_token: CancellationToken,
}

impl ShutdownCoordinator {
    /// Create a coordinator cancelling `cancel_token` on signal
    pub fn new(cancel_token: CancellationToken) -> Self {
        Self { cancel_token }
    }

    /// Token observed by the running job
    pub fn token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Wait for SIGTERM or SIGINT, then cancel the run
    pub async fn wait_for_signal(&self) {
        let ctrl_c = async {
            if signal::ctrl_c().await.is_err() {
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                }
                Err(_) => std::future::pending::<()>().await,
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                info!("Received SIGINT (Ctrl+C), cancelling run...");
            }
            _ = terminate => {
                info!("Received SIGTERM, cancelling run...");
            }
            _ = self.cancel_token.cancelled() => return,
        }

        self.cancel_token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_wait_returns_once_cancelled_elsewhere() {
        let token = CancellationToken::new();
        let coordinator = ShutdownCoordinator::new(token.clone());

        let handle = tokio::spawn(async move {
            coordinator.wait_for_signal().await;
        });

        token.cancel();

        // Task should complete
        handle.await.unwrap();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_token_is_shared() {
        let coordinator = ShutdownCoordinator::new(CancellationToken::new());
        let token = coordinator.token();
        coordinator.cancel_token.cancel();
        assert!(token.is_cancelled());
    }
}
