//! Application state management

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::service::Classifier;

use super::ServerConfig;

/// Application state shared across handlers; read-only after startup.
pub struct AppState {
    pub config: ServerConfig,
    pub classifier: Arc<Classifier>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(config: ServerConfig, classifier: Arc<Classifier>) -> Self {
        Self {
            config,
            classifier,
            started_at: Utc::now(),
        }
    }
}
