//! HTTP Server implementation

use anyhow::{Context, Result};
use tracing::info;

use harbor_api::{create_router, AppState};
use harbor_core::ServerConfig;

pub struct Server {
    config: ServerConfig,
    state: AppState,
}

impl Server {
    pub fn new(config: ServerConfig, state: AppState) -> Self {
        Self { config, state }
    }

    pub async fn run(self) -> Result<()> {
        let addr = self.config.address();
        let app = create_router(self.state);

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind HTTP server to {}", addr))?;
        info!("HTTP server listening on {}", addr);

        axum::serve(listener, app.into_make_service())
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("HTTP server error")?;

        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
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

    info!("Shutdown signal received");
}
