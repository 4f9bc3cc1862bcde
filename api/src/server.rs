use crate::{create_router, middleware_hooks::PublicPaths, AppState};
use std::sync::Arc;
use tracing::{info, warn};
use user::UserManager;

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Port to listen on
    pub port: u16,
    /// Origins allowed to send credentialed requests. Empty means permissive CORS.
    pub cors_allowed_origins: Vec<String>,
    /// Paths that bypass the authentication gate
    pub public_paths: PublicPaths,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            cors_allowed_origins: Vec::new(),
            public_paths: PublicPaths::default(),
        }
    }
}

impl ApiConfig {
    /// Create a new API configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads `API_PORT` and `CORS_ALLOWED_ORIGINS` (comma separated).
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(raw) = std::env::var("API_PORT") {
            match raw.trim().parse() {
                Ok(port) => config.port = port,
                Err(e) => warn!("Ignoring invalid API_PORT '{}': {}", raw, e),
            }
        }

        if let Ok(raw) = std::env::var("CORS_ALLOWED_ORIGINS") {
            config.cors_allowed_origins = raw
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(String::from)
                .collect();
        }

        config
    }

    /// Set the port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_cors_origins<I, S>(mut self, origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cors_allowed_origins = origins.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_public_paths(mut self, public_paths: PublicPaths) -> Self {
        self.public_paths = public_paths;
        self
    }
}

/// Start the API server with the given configuration
///
/// Returns once the listener is closed by Ctrl-C.
pub async fn start_server_with_config(
    user_manager: Arc<UserManager>,
    config: ApiConfig,
) -> std::io::Result<()> {
    let port = config.port;
    let state = AppState {
        user_manager,
        config: Arc::new(config),
    };
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("API server listening on {}", addr);
    info!("OpenAPI document available at http://localhost:{}/api/public/openapi.json", port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("API server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
