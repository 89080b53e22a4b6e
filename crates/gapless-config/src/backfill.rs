//! REST backfill configuration

use serde::{Deserialize, Serialize};

/// REST backfill configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackfillConfig {
    /// Spot REST API root
    pub spot_base_url: String,

    /// USDT-margined futures REST API root
    pub futures_base_url: String,

    /// Candles requested per call (API ceiling: 1000)
    pub max_candles_per_request: u32,

    /// Request timeout in seconds per chunk call
    pub request_timeout_secs: u64,

    /// Total attempts per chunk before it is dropped
    pub retry_attempts: u32,

    /// Base backoff delay between retries in milliseconds
    pub retry_delay_ms: u64,

    /// Backoff delay ceiling in milliseconds
    pub retry_max_delay_ms: u64,

    /// Concurrent in-flight chunk fetches
    pub max_concurrent_chunks: usize,
}

impl Default for BackfillConfig {
    fn default() -> Self {
        Self {
            spot_base_url: "https://api.binance.com".to_string(),
            futures_base_url: "https://fapi.binance.com".to_string(),
            max_candles_per_request: 1000,
            request_timeout_secs: 30,
            retry_attempts: 4,
            retry_delay_ms: 250,
            retry_max_delay_ms: 5_000,
            max_concurrent_chunks: 4,
        }
    }
}
