//! Taskdesk Web Server
//!
//! Binds the listener and serves the router until Ctrl-C or SIGTERM.

use crate::{config::Environment, create_app, AppState, WebConfig, WebError, WebResult};
use axum::serve;
use tokio::net::TcpListener;
use tracing::{error, info};

/// Main Taskdesk web server
pub struct TaskdeskServer {
    config: WebConfig,
    state: AppState,
}

impl TaskdeskServer {
    /// Validate `config`, then open storage and cache
    pub async fn new(config: WebConfig) -> WebResult<Self> {
        config.ensure_valid()?;
        let state = AppState::new(config.clone()).await?;
        Ok(Self { config, state })
    }

    /// Bind the configured address and serve until shutdown
    pub async fn start(self) -> WebResult<()> {
        let address = self.config.address();
        let listener = TcpListener::bind(&address)
            .await
            .map_err(WebError::Server)?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener until shutdown
    pub async fn serve(self, listener: TcpListener) -> WebResult<()> {
        let address = listener.local_addr().map_err(WebError::Server)?;
        info!(
            environment = %self.config.environment,
            cache = self.state.cache.backend_name(),
            "Server listening on http://{}",
            address
        );

        let app = create_app(self.state);
        if let Err(e) = serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
        {
            error!("Server error: {}", e);
            return Err(WebError::Server(e));
        }

        info!("Server shut down gracefully");
        Ok(())
    }

    /// Get server configuration
    pub fn config(&self) -> &WebConfig {
        &self.config
    }

    /// Get application state
    pub fn state(&self) -> &AppState {
        &self.state
    }
}

/// Builder for TaskdeskServer
pub struct TaskdeskServerBuilder {
    config: WebConfig,
}

impl TaskdeskServerBuilder {
    /// Start from configuration, usually [`WebConfig::from_env`]
    pub fn new(config: WebConfig) -> Self {
        Self { config }
    }

    pub fn host<S: Into<String>>(mut self, host: S) -> Self {
        self.config.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Force development mode (detailed 500 bodies, lax cookies)
    pub fn dev_mode(mut self, dev_mode: bool) -> Self {
        if dev_mode {
            self.config.environment = Environment::Development;
        }
        self
    }

    pub fn database_url<S: Into<String>>(mut self, database_url: S) -> Self {
        self.config.database_url = database_url.into();
        self
    }

    pub fn redis_url<S: Into<String>>(mut self, redis_url: S) -> Self {
        self.config.redis_url = Some(redis_url.into());
        self
    }

    pub fn config(&self) -> &WebConfig {
        &self.config
    }

    /// Build the server
    pub async fn build(self) -> WebResult<TaskdeskServer> {
        TaskdeskServer::new(self.config).await
    }
}

impl Default for TaskdeskServerBuilder {
    fn default() -> Self {
        Self::new(WebConfig::default())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
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
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl-C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
