//! Bulk CDN kline loader with monthly→daily fallback
//!
//! Downloads pre-zipped kline files from the Vision CDN, the preferred
//! low-cost source. A month is fetched as a single monthly ZIP when
//! available; when that fails the month is decomposed into per-day fetches
//! against the same CDN and the surviving days are merged in order. Partial
//! coverage is a degraded success, reported as `days_retrieved/days_expected`
//! and left to the gap detector and REST backfill to repair.
//!
//! File naming: `{SYMBOL}-{timeframe}-{YYYY}-{MM}.zip` (monthly) and
//! `{SYMBOL}-{timeframe}-{YYYY}-{MM}-{DD}.zip` (daily), each containing one
//! CSV in either the spot (11 fields, no header) or futures (12 fields,
//! headered) shape.

use std::io::{Cursor, Read};
use std::time::Duration;

use chrono::{Datelike, NaiveDate};
use csv::ReaderBuilder;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use zip::ZipArchive;

use gapless_core::format::{detect_format, FormatError, WireVariant};
use gapless_core::timestamp::{normalize, validate_timestamp};
use gapless_core::{Candle, DataSource, FixedPoint, SeriesKey};

use super::checksum;

/// Default bulk CDN root
pub const DEFAULT_BASE_URL: &str = "https://data.binance.vision";

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Bulk loading errors
#[derive(Debug, Error)]
pub enum BulkError {
    /// Non-404 HTTP failure
    #[error("HTTP error for {url}: {message}")]
    Http { url: String, message: String },

    /// File absent from the CDN
    #[error("bulk file not found: {url}")]
    NotFound { url: String },

    /// Per-request timeout elapsed
    #[error("request timeout for {url}")]
    Timeout { url: String },

    /// Archive does not decode
    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// CSV payload does not decode
    #[error("CSV parse error: {0}")]
    Csv(#[from] csv::Error),

    /// Reading the archived file failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Payload matches neither known wire shape
    #[error(transparent)]
    Format(#[from] FormatError),

    /// Downloaded bytes contradict the published checksum
    #[error("checksum verification failed for {url}: {source}")]
    Checksum {
        url: String,
        source: checksum::ChecksumError,
    },

    /// Month outside the calendar
    #[error("invalid calendar month {year}-{month:02}")]
    InvalidMonth { year: i32, month: u32 },
}

/// Parsed rows of one CSV payload
#[derive(Debug, Default)]
pub struct ParsedKlines {
    pub candles: Vec<Candle>,
    /// Rows dropped for failing timestamp or OHLC validation
    pub rows_rejected: u32,
}

/// Result of loading one calendar month
#[derive(Debug)]
pub struct MonthLoad {
    /// Candles in timestamp order, tagged `data_source = bulk-cdn`
    pub candles: Vec<Candle>,
    /// Source files that were actually retrieved
    pub files_retrieved: u32,
    /// Source files the month decomposed into (1 for a monthly hit)
    pub files_expected: u32,
    /// Rows dropped during parsing across all files
    pub rows_rejected: u32,
}

/// Every calendar day of a month, leap-year aware
pub fn month_days(year: i32, month: u32) -> Result<Vec<NaiveDate>, BulkError> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or(BulkError::InvalidMonth { year, month })?;
    let mut days = Vec::with_capacity(31);
    let mut date = first;
    while date.month() == month {
        days.push(date);
        date = match date.succ_opt() {
            Some(next) => next,
            None => break,
        };
    }
    Ok(days)
}

/// Parse one CSV payload into canonical candles
///
/// The wire variant and timestamp precision are detected once from the
/// leading records; every row then flows through the normalizer and the
/// OHLC/timestamp validators. Rows failing validation are dropped with a
/// warning and counted, leaving the decision visible in the result.
pub fn parse_klines_csv(
    payload: &str,
    key: &SeriesKey,
    source: DataSource,
) -> Result<ParsedKlines, BulkError> {
    if payload.lines().all(|line| line.trim().is_empty()) {
        return Ok(ParsedKlines::default());
    }

    let format = detect_format(payload)?;
    let mut reader = ReaderBuilder::new()
        .has_headers(format.variant.has_header())
        .from_reader(payload.as_bytes());

    let mut parsed = ParsedKlines::default();
    match format.variant {
        WireVariant::Spot => {
            for row in reader.deserialize() {
                let row: SpotRow = row?;
                push_row(&mut parsed, row.fields(), key, format.precision, source);
            }
        }
        WireVariant::Futures => {
            for row in reader.deserialize() {
                let row: FuturesRow = row?;
                push_row(&mut parsed, row.fields(), key, format.precision, source);
            }
        }
    }

    parsed.candles.sort_by_key(|candle| candle.timestamp);
    Ok(parsed)
}

/// Bulk kline loader for one candle series
#[derive(Debug, Clone)]
pub struct BulkKlinesLoader {
    client: Client,
    key: SeriesKey,
    base_url: String,
    request_timeout: Duration,
    verify_checksums: bool,
}

impl BulkKlinesLoader {
    pub fn new(key: SeriesKey) -> Self {
        Self {
            client: Client::new(),
            key,
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            verify_checksums: true,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_checksum_verification(mut self, verify: bool) -> Self {
        self.verify_checksums = verify;
        self
    }

    /// Series this loader fetches
    pub fn key(&self) -> &SeriesKey {
        &self.key
    }

    fn monthly_url(&self, year: i32, month: u32) -> String {
        format!(
            "{base}/data/{market}/monthly/klines/{symbol}/{tf}/{symbol}-{tf}-{year:04}-{month:02}.zip",
            base = self.base_url,
            market = self.key.instrument_type.market_path(),
            symbol = self.key.symbol,
            tf = self.key.timeframe.label(),
        )
    }

    fn daily_url(&self, date: NaiveDate) -> String {
        format!(
            "{base}/data/{market}/daily/klines/{symbol}/{tf}/{symbol}-{tf}-{date}.zip",
            base = self.base_url,
            market = self.key.instrument_type.market_path(),
            symbol = self.key.symbol,
            tf = self.key.timeframe.label(),
            date = date.format("%Y-%m-%d"),
        )
    }

    /// Load one calendar month, falling back to per-day files when the
    /// monthly archive is unavailable
    pub async fn load_month(&self, year: i32, month: u32) -> Result<MonthLoad, BulkError> {
        let url = self.monthly_url(year, month);
        debug!(
            event_type = "bulk_month_start",
            series = %self.key,
            year,
            month,
            "Loading bulk month"
        );

        match self.fetch_and_parse(&url).await {
            Ok(parsed) => {
                info!(
                    event_type = "bulk_month_complete",
                    series = %self.key,
                    year,
                    month,
                    candle_count = parsed.candles.len(),
                    rows_rejected = parsed.rows_rejected,
                    "Monthly archive loaded"
                );
                Ok(MonthLoad {
                    candles: parsed.candles,
                    files_retrieved: 1,
                    files_expected: 1,
                    rows_rejected: parsed.rows_rejected,
                })
            }
            Err(BulkError::Checksum { url, source }) => {
                // Corruption is never silently degraded
                Err(BulkError::Checksum { url, source })
            }
            Err(e) => {
                warn!(
                    event_type = "bulk_monthly_unavailable",
                    series = %self.key,
                    year,
                    month,
                    error = %e,
                    "Monthly archive unavailable, decomposing into daily files"
                );
                self.load_month_daily(year, month).await
            }
        }
    }

    /// Per-day decomposition of a month
    ///
    /// A day whose fetch fails is dropped and reflected only in the
    /// retrieved/expected counts; the gap detector will pick up whatever is
    /// still missing.
    async fn load_month_daily(&self, year: i32, month: u32) -> Result<MonthLoad, BulkError> {
        let days = month_days(year, month)?;
        let mut load = MonthLoad {
            candles: Vec::new(),
            files_retrieved: 0,
            files_expected: days.len() as u32,
            rows_rejected: 0,
        };

        for day in days {
            let url = self.daily_url(day);
            match self.fetch_and_parse(&url).await {
                Ok(mut parsed) => {
                    load.files_retrieved += 1;
                    load.rows_rejected += parsed.rows_rejected;
                    load.candles.append(&mut parsed.candles);
                }
                Err(BulkError::Checksum { url, source }) => {
                    return Err(BulkError::Checksum { url, source });
                }
                Err(e) => {
                    warn!(
                        event_type = "bulk_daily_dropped",
                        series = %self.key,
                        date = %day,
                        error = %e,
                        "Daily file dropped"
                    );
                }
            }
        }

        info!(
            event_type = "bulk_daily_fallback_complete",
            series = %self.key,
            year,
            month,
            files_retrieved = load.files_retrieved,
            files_expected = load.files_expected,
            candle_count = load.candles.len(),
            "Daily fallback finished"
        );
        load.candles.sort_by_key(|candle| candle.timestamp);
        Ok(load)
    }

    async fn fetch_and_parse(&self, url: &str) -> Result<ParsedKlines, BulkError> {
        let bytes = self.fetch_archive(url).await?;
        let payload = extract_archived_csv(&bytes)?;
        parse_klines_csv(&payload, &self.key, DataSource::BulkCdn)
    }

    async fn fetch_archive(&self, url: &str) -> Result<Vec<u8>, BulkError> {
        let response = tokio::time::timeout(self.request_timeout, self.client.get(url).send())
            .await
            .map_err(|_| BulkError::Timeout {
                url: url.to_string(),
            })?
            .map_err(|e| BulkError::Http {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        if response.status().as_u16() == 404 {
            return Err(BulkError::NotFound {
                url: url.to_string(),
            });
        }
        if !response.status().is_success() {
            return Err(BulkError::Http {
                url: url.to_string(),
                message: format!("HTTP {}", response.status()),
            });
        }

        let bytes = response.bytes().await.map_err(|e| BulkError::Http {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        if self.verify_checksums {
            checksum::verify_download(&self.client, url, &bytes)
                .await
                .map_err(|source| BulkError::Checksum {
                    url: url.to_string(),
                    source,
                })?;
        }

        Ok(bytes.to_vec())
    }
}

/// Un-headered spot record: 11 comma-separated fields
#[derive(Debug, Deserialize)]
struct SpotRow(
    i64,    // open time
    String, // open
    String, // high
    String, // low
    String, // close
    String, // volume
    i64,    // close time
    String, // quote volume
    u64,    // trade count
    String, // taker buy base volume
    String, // taker buy quote volume
);

/// Headered futures record: 12 fields, the trailing "ignore" field discarded
#[derive(Debug, Deserialize)]
struct FuturesRow(
    i64,
    String,
    String,
    String,
    String,
    String,
    i64,
    String,
    u64,
    String,
    String,
    String, // ignore
);

/// Field view shared by both row shapes
struct RowFields<'a> {
    open_time: i64,
    open: &'a str,
    high: &'a str,
    low: &'a str,
    close: &'a str,
    volume: &'a str,
    close_time: i64,
    quote_volume: &'a str,
    trade_count: u64,
    taker_buy_base_volume: &'a str,
    taker_buy_quote_volume: &'a str,
}

impl SpotRow {
    fn fields(&self) -> RowFields<'_> {
        RowFields {
            open_time: self.0,
            open: &self.1,
            high: &self.2,
            low: &self.3,
            close: &self.4,
            volume: &self.5,
            close_time: self.6,
            quote_volume: &self.7,
            trade_count: self.8,
            taker_buy_base_volume: &self.9,
            taker_buy_quote_volume: &self.10,
        }
    }
}

impl FuturesRow {
    fn fields(&self) -> RowFields<'_> {
        RowFields {
            open_time: self.0,
            open: &self.1,
            high: &self.2,
            low: &self.3,
            close: &self.4,
            volume: &self.5,
            close_time: self.6,
            quote_volume: &self.7,
            trade_count: self.8,
            taker_buy_base_volume: &self.9,
            taker_buy_quote_volume: &self.10,
        }
    }
}

fn push_row(
    parsed: &mut ParsedKlines,
    fields: RowFields<'_>,
    key: &SeriesKey,
    precision: gapless_core::TimestampPrecision,
    source: DataSource,
) {
    match build_candle(fields, key, precision, source) {
        Ok(candle) => parsed.candles.push(candle),
        Err(reason) => {
            parsed.rows_rejected += 1;
            warn!(
                event_type = "bulk_row_rejected",
                series = %key,
                reason = %reason,
                "Dropped malformed row"
            );
        }
    }
}

fn build_candle(
    fields: RowFields<'_>,
    key: &SeriesKey,
    precision: gapless_core::TimestampPrecision,
    source: DataSource,
) -> Result<Candle, String> {
    let timestamp = normalize(fields.open_time, precision);
    let close_time = normalize(fields.close_time, precision);
    if !validate_timestamp(timestamp) {
        return Err(format!("open time {timestamp} outside plausible range"));
    }

    let decimal = |field: &str, name: &str| {
        FixedPoint::parse(field).map_err(|e| format!("{name}: {e}"))
    };

    let candle = Candle {
        timestamp,
        open: decimal(fields.open, "open")?,
        high: decimal(fields.high, "high")?,
        low: decimal(fields.low, "low")?,
        close: decimal(fields.close, "close")?,
        volume: decimal(fields.volume, "volume")?,
        close_time,
        quote_volume: decimal(fields.quote_volume, "quote_volume")?,
        trade_count: fields.trade_count,
        taker_buy_base_volume: decimal(fields.taker_buy_base_volume, "taker_buy_base_volume")?,
        taker_buy_quote_volume: decimal(fields.taker_buy_quote_volume, "taker_buy_quote_volume")?,
        funding_rate: None,
        symbol: key.symbol.clone(),
        timeframe: key.timeframe,
        instrument_type: key.instrument_type,
        data_source: source,
        version: 0,
        sign: 1,
    };
    candle.validate().map_err(|e| e.to_string())?;
    Ok(candle)
}

fn extract_archived_csv(zip_bytes: &[u8]) -> Result<String, BulkError> {
    let mut archive = ZipArchive::new(Cursor::new(zip_bytes))?;
    // Each CDN archive contains exactly one CSV
    let mut file = archive.by_index(0)?;
    let mut payload = String::with_capacity(file.size() as usize);
    file.read_to_string(&mut payload)?;
    Ok(payload)
}
