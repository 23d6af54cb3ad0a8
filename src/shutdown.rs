use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::observability::workflow_metrics;
use crate::store::RemarkRepository;

/// Resolves on SIGINT or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Graceful shutdown steps run after the server stops accepting requests
pub struct ShutdownCoordinator {
    repository: Arc<dyn RemarkRepository>,
}

impl ShutdownCoordinator {
    pub fn new(repository: Arc<dyn RemarkRepository>) -> Self {
        Self { repository }
    }

    /// Close storage and log final workflow statistics
    pub async fn shutdown_all_services(self) -> Result<()> {
        info!("Initiating graceful shutdown of all services...");

        if let Err(e) = close_repository(self.repository.as_ref()).await {
            warn!("Remark storage did not close cleanly: {}", e);
        }

        workflow_metrics().log_stats();

        info!("Graceful shutdown completed successfully");
        Ok(())
    }
}

async fn close_repository(repository: &dyn RemarkRepository) -> Result<()> {
    info!("Closing remark storage...");

    timeout(Duration::from_secs(5), repository.close())
        .await
        .map_err(|_| anyhow::anyhow!("Timeout waiting for remark storage to close"))?;

    info!("Remark storage closed");
    Ok(())
}
