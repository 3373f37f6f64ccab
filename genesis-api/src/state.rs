//! Application state for the API server

use std::sync::Arc;

use genesis_smart::ContractEngine;

/// API server state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ContractEngine>,
    pub jwt_secret: String,
    pub version: String,
}

impl AppState {
    pub fn new(engine: Arc<ContractEngine>, jwt_secret: impl Into<String>) -> Self {
        Self {
            engine,
            jwt_secret: jwt_secret.into(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    pub enable_cors: bool,
    pub jwt_secret: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 7079,
            enable_cors: true,
            jwt_secret: "genesis-dev-secret-change-in-production".to_string(),
        }
    }
}
