//! Bulk CDN data source configuration

use serde::{Deserialize, Serialize};

/// Bulk CDN data source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Base URL for the bulk file distribution
    pub base_url: String,

    /// Request timeout in seconds for archive downloads
    pub request_timeout_secs: u64,

    /// Verify SHA-256 checksum sidecars for every download
    pub verify_checksums: bool,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            base_url: "https://data.binance.vision".to_string(),
            request_timeout_secs: 30,
            verify_checksums: true,
        }
    }
}
