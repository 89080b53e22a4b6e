//! Core candle reconciliation primitives
//!
//! Pure, CPU-bound building blocks for gapless OHLCV series ingestion:
//!
//! - Canonical timeframe registry (explicit label → interval table)
//! - Wire format detection (spot vs futures CSV, ms vs µs timestamps)
//! - Lossless timestamp normalization to microseconds
//! - Gap detection over observed timestamp sequences
//! - Deterministic 64-bit row version derivation for merge-on-read stores
//!
//! Everything in this crate is a pure function over its inputs; network and
//! sink I/O live in `gapless-providers` and `gapless-ingest`.

pub mod fixed_point;
pub mod format;
pub mod gaps;
pub mod timeframe;
pub mod timestamp;
pub mod types;
pub mod version;

// Re-export commonly used types
pub use fixed_point::{FixedPoint, FixedPointError};
pub use format::{detect_format, FormatError, RecordFormat, WireVariant};
pub use gaps::detect_gaps;
pub use timeframe::{Timeframe, TimeframeError};
pub use timestamp::{
    detect_precision, detect_precision_value, normalize, validate_timestamp, TimestampError,
    TimestampPrecision,
};
pub use types::{Candle, CandleError, DataSource, FetchChunk, Gap, InstrumentType, SeriesKey};
pub use version::{stamp_version, version_of};
