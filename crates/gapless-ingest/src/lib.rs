//! Ingestion orchestration for gapless candle series
//!
//! Sequences the pipeline per (symbol, timeframe, instrument-type) key:
//! bulk acquisition → gap scan against the sink → chunked REST backfill →
//! version stamping → sink write → verification, reporting a structured
//! outcome with a completeness percentage. Degraded success (chunks or days
//! the upstream cannot supply) is an outcome, not an error.
//!
//! The external merge store and the live API are reached only through the
//! [`CandleSink`] and [`BackfillSource`] seams, which keeps the state machine
//! testable against in-process doubles.

pub mod orchestrator;
pub mod sink;
pub mod telemetry;

// Re-export commonly used types
pub use orchestrator::{
    rest_client_config, BackfillSource, IngestError, IngestOutcome, IngestStatus, Orchestrator,
};
pub use sink::{CandleSink, MemorySink, SinkError};
pub use telemetry::init_tracing;
