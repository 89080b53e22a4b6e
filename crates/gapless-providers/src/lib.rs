//! Data provider integrations
//!
//! Source-specific adapters for fetching candle series data.
//!
//! ## Supported Sources
//!
//! | Source | Module | Role |
//! |--------|--------|------|
//! | Binance Vision bulk CDN | `binance::bulk` | Primary: pre-zipped monthly/daily kline files |
//! | Binance REST API | `binance::rest` | Fallback: chunked backfill of detected gaps |
//!
//! ## Design Principles
//!
//! 1. **Adapter pattern**: every source converts to the canonical `Candle`
//! 2. **Degraded success is data**: dropped days/chunks are counted in the
//!    result, not raised as errors
//! 3. **Stateless**: no caching inside providers
//! 4. **Format resolved once**: wire variant and precision are detected up
//!    front and carried as data, never re-sniffed per field

pub mod binance;

// Re-export commonly used types
pub use binance::bulk::{month_days, parse_klines_csv, BulkError, BulkKlinesLoader, MonthLoad};
pub use binance::checksum::{sha256_hex, ChecksumError, Verification};
pub use binance::rest::{
    plan_chunks, BackfillResult, ChunkError, RestClientConfig, RestKlinesClient,
};
