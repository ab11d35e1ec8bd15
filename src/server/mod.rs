//! HTTP front-end: upload page, JSON prediction endpoint and health check.

mod api;
mod error;
mod handlers;
mod state;

pub use api::{create_router, origin_allowed};
pub use error::ApiError;
pub use handlers::{HealthResponse, PredictResponse, PredictionBody};
pub use state::AppState;

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{info, warn};

use crate::service::{Classifier, DEFAULT_TOP_K};

pub const DEFAULT_MAX_UPLOAD_SIZE: usize = 10 * 1024 * 1024;

const DEFAULT_ORIGINS: [&str; 4] = [
    "http://localhost:8080",
    "http://localhost:3000",
    "http://127.0.0.1:8080",
    "https://*.github.io",
];

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
    pub max_upload_size: usize,
    pub top_k: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            allowed_origins: Self::default_origins(),
            max_upload_size: DEFAULT_MAX_UPLOAD_SIZE,
            top_k: DEFAULT_TOP_K,
        }
    }
}

impl ServerConfig {
    pub fn default_origins() -> Vec<String> {
        DEFAULT_ORIGINS.iter().map(|o| o.to_string()).collect()
    }

    /// Splits a comma-separated origin list, dropping blanks.
    pub fn parse_origins(list: &str) -> Vec<String> {
        list.split(',')
            .map(|o| o.trim().trim_end_matches('/').to_string())
            .filter(|o| !o.is_empty())
            .collect()
    }
}

/// Start the server with an already loaded classifier
pub async fn run_server(config: ServerConfig, classifier: Arc<Classifier>) -> anyhow::Result<()> {
    let state = Arc::new(AppState::new(config.clone(), classifier));
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!(
        allowed_origins = %config.allowed_origins.join(", "),
        "CORS configured"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(address = %addr, url = %format!("http://{}", addr), "Server listening");

    let shutdown_signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for ctrl+c");
            std::future::pending::<()>().await;
        }
        info!("Shutdown signal received, stopping server gracefully");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("Server shut down cleanly");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.max_upload_size, 10 * 1024 * 1024);
        assert_eq!(config.allowed_origins.len(), 4);
    }

    #[test]
    fn test_parse_origins() {
        assert_eq!(
            ServerConfig::parse_origins(" https://a.example/ ,, http://localhost:3000"),
            vec!["https://a.example", "http://localhost:3000"]
        );
        assert!(ServerConfig::parse_origins(" , ").is_empty());
    }
}
