//! Application-wide configuration

use serde::{Deserialize, Serialize};

/// Application-wide settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Tracing filter directive (e.g. "info,gapless_providers=debug")
    pub log_filter: String,

    /// Emit log records as JSON instead of human-readable lines
    pub log_json: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_filter: "info".to_string(),
            log_json: false,
        }
    }
}
