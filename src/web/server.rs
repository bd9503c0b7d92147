//! HTTP server for Filedrop.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;

use crate::config::Config;
use crate::storage::{Storage, UploadPolicy};
use crate::{FiledropError, Result};

use super::handlers::AppState;
use super::router::create_router;

/// HTTP server for the upload API.
pub struct WebServer {
    /// Server address.
    addr: SocketAddr,
    /// Application state.
    app_state: Arc<AppState>,
    /// Full configuration.
    config: Config,
}

impl WebServer {
    /// Create a new server from configuration.
    ///
    /// Opens (and if needed creates) the upload root.
    pub fn new(config: &Config) -> Result<Self> {
        let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
            .parse()
            .map_err(|e| {
                FiledropError::Config(format!(
                    "invalid listen address {}:{}: {}",
                    config.server.host, config.server.port, e
                ))
            })?;

        let storage = Storage::new(&config.storage.upload_directory)?;
        tracing::info!(root = %storage.root().display(), "Upload storage ready");

        let policy = UploadPolicy::new(
            &config.storage.allowed_extensions,
            config.storage.max_upload_size,
        );
        if policy.is_empty() {
            tracing::warn!("No allowed extensions configured; every upload will be rejected");
        }

        let app_state = AppState::new(
            storage,
            policy,
            Duration::from_secs(config.server.io_timeout_secs),
        );

        Ok(Self {
            addr,
            app_state: Arc::new(app_state),
            config: config.clone(),
        })
    }

    /// Get the configured server address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Run the server until `shutdown` completes.
    pub async fn run<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let router = create_router(self.app_state, &self.config.web);

        let listener = TcpListener::bind(self.addr).await?;
        let local_addr = listener.local_addr()?;

        tracing::info!("Web server listening on http://{}", local_addr);

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("Web server stopped");
        Ok(())
    }

    /// Run the server in the background and return the actual bound address.
    ///
    /// This is useful for testing when binding to port 0.
    pub async fn run_with_addr(self) -> Result<SocketAddr> {
        let router = create_router(self.app_state, &self.config.web);

        let listener = TcpListener::bind(self.addr).await?;
        let local_addr = listener.local_addr()?;

        tracing::info!("Web server listening on http://{}", local_addr);

        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                tracing::error!("Web server error: {}", e);
            }
        });

        Ok(local_addr)
    }
}

/// Resolve when the process receives Ctrl-C.
pub async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown signal received, starting graceful shutdown"),
        Err(e) => tracing::error!("Failed to listen for shutdown signal: {}", e),
    }
}
