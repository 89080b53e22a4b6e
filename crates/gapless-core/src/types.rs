//! Canonical row and reconciliation type definitions

use crate::fixed_point::FixedPoint;
use crate::timeframe::Timeframe;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Instrument type of a trading pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InstrumentType {
    /// Spot market pair
    #[serde(rename = "spot")]
    Spot,
    /// USDT-margined perpetual futures pair
    #[serde(rename = "futures-perpetual")]
    PerpetualFutures,
}

impl InstrumentType {
    /// Stable wire label, also the version-hash field value
    pub fn as_str(&self) -> &'static str {
        match self {
            InstrumentType::Spot => "spot",
            InstrumentType::PerpetualFutures => "futures-perpetual",
        }
    }

    /// Path segment under the bulk CDN data root
    pub fn market_path(&self) -> &'static str {
        match self {
            InstrumentType::Spot => "spot",
            InstrumentType::PerpetualFutures => "futures/um",
        }
    }
}

impl fmt::Display for InstrumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which collaborator a candle was obtained from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataSource {
    /// Pre-zipped monthly/daily bulk file distribution
    #[serde(rename = "bulk-cdn")]
    BulkCdn,
    /// Live REST API backfill
    #[serde(rename = "rest-api")]
    RestApi,
}

impl DataSource {
    /// Stable wire label, also the version-hash field value
    pub fn as_str(&self) -> &'static str {
        match self {
            DataSource::BulkCdn => "bulk-cdn",
            DataSource::RestApi => "rest-api",
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of one candle series
///
/// The full identity key of a row is this plus the candle timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SeriesKey {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub instrument_type: InstrumentType,
}

impl SeriesKey {
    pub fn new(symbol: impl Into<String>, timeframe: Timeframe, instrument_type: InstrumentType) -> Self {
        Self {
            symbol: symbol.into().to_uppercase(),
            timeframe,
            instrument_type,
        }
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.symbol, self.timeframe, self.instrument_type)
    }
}

/// OHLC invariant violations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CandleError {
    /// `high` must dominate open, low and close
    #[error("high {high} below another price field (open {open}, low {low}, close {close})")]
    HighNotMaximal {
        open: FixedPoint,
        high: FixedPoint,
        low: FixedPoint,
        close: FixedPoint,
    },

    /// `low` must be dominated by open, high and close
    #[error("low {low} above another price field (open {open}, high {high}, close {close})")]
    LowNotMinimal {
        open: FixedPoint,
        high: FixedPoint,
        low: FixedPoint,
        close: FixedPoint,
    },

    /// Volumes cannot be negative
    #[error("negative volume {volume}")]
    NegativeVolume { volume: FixedPoint },
}

/// One OHLCV observation in canonical form
///
/// Timestamps are microseconds. `version` is the deterministic content hash
/// handed to the external merge store as its tiebreak column; `sign` is the
/// store's liveness marker (+1 for live rows, -1 reserved for tombstones
/// written by external compaction, never by this core).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: i64,
    pub open: FixedPoint,
    pub high: FixedPoint,
    pub low: FixedPoint,
    pub close: FixedPoint,
    pub volume: FixedPoint,
    pub close_time: i64,
    pub quote_volume: FixedPoint,
    pub trade_count: u64,
    pub taker_buy_base_volume: FixedPoint,
    pub taker_buy_quote_volume: FixedPoint,
    /// Present only for perpetual-futures instruments
    #[serde(skip_serializing_if = "Option::is_none")]
    pub funding_rate: Option<FixedPoint>,
    pub symbol: String,
    pub timeframe: Timeframe,
    pub instrument_type: InstrumentType,
    pub data_source: DataSource,
    pub version: u64,
    pub sign: i8,
}

impl Candle {
    /// Series this candle belongs to
    pub fn series_key(&self) -> SeriesKey {
        SeriesKey {
            symbol: self.symbol.clone(),
            timeframe: self.timeframe,
            instrument_type: self.instrument_type,
        }
    }

    /// Check the OHLC bound invariants required before any sink write
    pub fn validate(&self) -> Result<(), CandleError> {
        let price_max = self.open.max(self.low).max(self.close);
        if self.high < price_max {
            return Err(CandleError::HighNotMaximal {
                open: self.open,
                high: self.high,
                low: self.low,
                close: self.close,
            });
        }
        let price_min = self.open.min(self.high).min(self.close);
        if self.low > price_min {
            return Err(CandleError::LowNotMinimal {
                open: self.open,
                high: self.high,
                low: self.low,
                close: self.close,
            });
        }
        for volume in [
            self.volume,
            self.quote_volume,
            self.taker_buy_base_volume,
            self.taker_buy_quote_volume,
        ] {
            if volume.is_negative() {
                return Err(CandleError::NegativeVolume { volume });
            }
        }
        Ok(())
    }
}

/// A detected hole in an observed candle sequence
///
/// `start_time` is the last known-good timestamp before the hole and
/// `end_time` the first known-good one after it; the missing candles lie in
/// the open interval between them. Created transiently by the gap detector
/// and consumed immediately by backfill, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gap {
    pub start_time: i64,
    pub end_time: i64,
    pub interval_us: i64,
}

impl Gap {
    /// Wall-clock span of the hole
    pub fn duration_us(&self) -> i64 {
        self.end_time - self.start_time
    }

    /// Number of candles missing inside the hole
    pub fn missing_count(&self) -> i64 {
        self.duration_us() / self.interval_us - 1
    }
}

/// One bounded sub-request of a backfill
///
/// Produced when a gap's `missing_count` exceeds the API per-request limit;
/// consumed and discarded after the corresponding HTTP round-trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchChunk {
    /// Inclusive chunk start, microseconds
    pub start_time: i64,
    /// Exclusive chunk end, microseconds
    pub end_time: i64,
    /// Source-API per-request candle limit
    pub max_candles: u32,
}
