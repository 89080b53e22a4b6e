//! Gapless OHLCV candle ingestion
//!
//! Ingests candle series for crypto trading pairs from a bulk CDN
//! distribution with a REST-API fallback, and guarantees the stored series
//! has no missing intervals per (symbol, timeframe, instrument-type) key.
//!
//! ## Meta-Crate
//!
//! This crate re-exports the sub-crates; new code can also depend on them
//! directly:
//!
//! - `gapless-core` - timeframe registry, format detection, gap detection,
//!   version hashing
//! - `gapless-providers` - bulk CDN loader and chunked REST backfill
//! - `gapless-config` - layered configuration
//! - `gapless-ingest` - sink boundary and the ingestion orchestrator
//!
//! ## Basic Usage
//!
//! ```rust,ignore
//! use gapless::{
//!     BulkKlinesLoader, InstrumentType, MemorySink, Orchestrator,
//!     RestClientConfig, RestKlinesClient, SeriesKey, Timeframe,
//! };
//!
//! let key = SeriesKey::new("BTCUSDT", Timeframe::M1, InstrumentType::Spot);
//! let loader = BulkKlinesLoader::new(key.clone());
//! let rest = RestKlinesClient::new(RestClientConfig::default());
//! let orchestrator = Orchestrator::new(MemorySink::new(), rest);
//!
//! let outcome = orchestrator.ingest_month(&loader, 2024, 1).await?;
//! println!("completeness: {}%", outcome.completeness_percent);
//! ```

pub use gapless_config;
pub use gapless_core;
pub use gapless_ingest;
pub use gapless_providers;

// Flat re-exports of the common surface
pub use gapless_config::{AppConfig, BackfillConfig, DataConfig, Settings};
pub use gapless_core::{
    detect_format, detect_gaps, normalize, stamp_version, version_of, Candle, DataSource,
    FetchChunk, FixedPoint, Gap, InstrumentType, RecordFormat, SeriesKey, Timeframe,
    TimestampPrecision, WireVariant,
};
pub use gapless_ingest::{
    init_tracing, BackfillSource, CandleSink, IngestOutcome, IngestStatus, MemorySink,
    Orchestrator,
};
pub use gapless_providers::{
    BackfillResult, BulkKlinesLoader, MonthLoad, RestClientConfig, RestKlinesClient,
};
