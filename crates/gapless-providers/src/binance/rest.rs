//! Chunked gap backfill against the live klines REST API
//!
//! A missing-interval request may span far more candles than the API allows
//! per call, so it is split into limit-sized chunks over disjoint time
//! windows. Chunks fetch with bounded parallelism and are reassembled by
//! sorting on timestamp, so no ordering guarantee is needed from the network
//! layer. A chunk that times out or errors is retried with jittered
//! exponential backoff up to an attempt ceiling, after which it is dropped
//! and counted; a chunk the API answers with no data contributes zero
//! candles. Both are degraded success, not failure; the remaining holes
//! surface in the caller's completeness accounting.

use std::time::Duration;

use futures_util::stream::{self, StreamExt};
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use gapless_core::timestamp::{detect_precision_value, normalize};
use gapless_core::{Candle, DataSource, FetchChunk, FixedPoint, InstrumentType, SeriesKey};

/// Default spot REST root
pub const DEFAULT_SPOT_BASE_URL: &str = "https://api.binance.com";

/// Default USDT-margined futures REST root
pub const DEFAULT_FUTURES_BASE_URL: &str = "https://fapi.binance.com";

/// Hard API ceiling on candles per request
pub const MAX_CANDLES_PER_REQUEST: u32 = 1000;

/// Chunk fetch errors (transient; retried, then dropped)
#[derive(Debug, Error)]
pub enum ChunkError {
    /// Transport-level failure
    #[error("HTTP error for {url}: {message}")]
    Http { url: String, message: String },

    /// Per-call timeout elapsed
    #[error("request timeout for {url}")]
    Timeout { url: String },

    /// Non-success status code
    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    /// Response body does not decode into kline rows
    #[error("undecodable kline payload: {0}")]
    Decode(String),
}

/// REST client tuning
#[derive(Debug, Clone)]
pub struct RestClientConfig {
    pub spot_base_url: String,
    pub futures_base_url: String,
    /// Candles per request, clamped to the API ceiling
    pub max_candles_per_request: u32,
    pub request_timeout: Duration,
    /// Total attempts per chunk before it is dropped
    pub retry_attempts: u32,
    pub retry_base_delay: Duration,
    pub retry_max_delay: Duration,
    /// Jitter fraction applied to each backoff delay (0.0 disables)
    pub retry_jitter: f64,
    /// Concurrent in-flight chunk fetches
    pub max_concurrent_chunks: usize,
}

impl Default for RestClientConfig {
    fn default() -> Self {
        Self {
            spot_base_url: DEFAULT_SPOT_BASE_URL.to_string(),
            futures_base_url: DEFAULT_FUTURES_BASE_URL.to_string(),
            max_candles_per_request: MAX_CANDLES_PER_REQUEST,
            request_timeout: Duration::from_secs(30),
            retry_attempts: 4,
            retry_base_delay: Duration::from_millis(250),
            retry_max_delay: Duration::from_secs(5),
            retry_jitter: 0.25,
            max_concurrent_chunks: 4,
        }
    }
}

impl RestClientConfig {
    /// Backoff delay before retrying after `attempt` failures
    ///
    /// Doubles from the base, caps at the maximum, then applies the
    /// configured jitter fraction.
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let exp = 2_u64.saturating_pow(attempt);
        let base_ms = self.retry_base_delay.as_millis() as u64;
        let capped_ms = base_ms
            .saturating_mul(exp)
            .min(self.retry_max_delay.as_millis() as u64);
        let jittered_ms = if self.retry_jitter > 0.0 {
            use rand::Rng;
            let spread = (capped_ms as f64 * self.retry_jitter) as i64;
            let delta = rand::thread_rng().gen_range(-spread..=spread.max(1));
            capped_ms.saturating_add_signed(delta)
        } else {
            capped_ms
        };
        Duration::from_millis(jittered_ms)
    }
}

/// Outcome of one backfill range fetch
///
/// Dropped chunks are data, not errors: they reduce the caller's
/// gaps-filled ratio instead of aborting the pipeline.
#[derive(Debug, Default)]
pub struct BackfillResult {
    /// Candles in timestamp order, tagged `data_source = rest-api`
    pub candles: Vec<Candle>,
    pub chunks_total: u32,
    pub chunks_fetched: u32,
    pub chunks_dropped: u32,
}

/// Split a half-open backfill window into API-limit-sized chunks
pub fn plan_chunks(
    start_us: i64,
    end_us: i64,
    interval_us: i64,
    max_candles: u32,
) -> Vec<FetchChunk> {
    assert!(interval_us > 0, "interval must be positive");
    assert!(max_candles > 0, "chunk capacity must be positive");

    let span = interval_us * max_candles as i64;
    let mut chunks = Vec::new();
    let mut cursor = start_us;
    while cursor < end_us {
        let chunk_end = (cursor + span).min(end_us);
        chunks.push(FetchChunk {
            start_time: cursor,
            end_time: chunk_end,
            max_candles,
        });
        cursor = chunk_end;
    }
    chunks
}

/// Live klines REST client
#[derive(Debug, Clone)]
pub struct RestKlinesClient {
    client: Client,
    config: RestClientConfig,
}

impl RestKlinesClient {
    pub fn new(config: RestClientConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    pub fn config(&self) -> &RestClientConfig {
        &self.config
    }

    /// Fetch all candles in the half-open window `[start_us, end_us)`
    ///
    /// Chunks target disjoint windows, so bounded-parallel fetching is safe;
    /// results are reassembled by timestamp sort, not arrival order.
    pub async fn fetch_range(
        &self,
        key: &SeriesKey,
        start_us: i64,
        end_us: i64,
    ) -> BackfillResult {
        let limit = self
            .config
            .max_candles_per_request
            .min(MAX_CANDLES_PER_REQUEST);
        let chunks = plan_chunks(start_us, end_us, key.timeframe.interval_us(), limit);

        debug!(
            event_type = "backfill_start",
            series = %key,
            start_us,
            end_us,
            chunk_count = chunks.len(),
            "Backfilling range"
        );

        let mut result = BackfillResult {
            chunks_total: chunks.len() as u32,
            ..BackfillResult::default()
        };

        let fetches = chunks
            .into_iter()
            .map(|chunk| self.fetch_chunk_with_retry(key, chunk));
        let outcomes: Vec<(FetchChunk, Result<Vec<Candle>, ChunkError>)> = stream::iter(fetches)
            .buffer_unordered(self.config.max_concurrent_chunks.max(1))
            .collect()
            .await;

        for (chunk, outcome) in outcomes {
            match outcome {
                Ok(mut candles) => {
                    result.chunks_fetched += 1;
                    result.candles.append(&mut candles);
                }
                Err(e) => {
                    result.chunks_dropped += 1;
                    warn!(
                        event_type = "backfill_chunk_dropped",
                        series = %key,
                        chunk_start = chunk.start_time,
                        chunk_end = chunk.end_time,
                        error = %e,
                        "Chunk dropped after retry ceiling"
                    );
                }
            }
        }

        result.candles.sort_by_key(|candle| candle.timestamp);
        result.candles.dedup_by_key(|candle| candle.timestamp);

        info!(
            event_type = "backfill_complete",
            series = %key,
            candle_count = result.candles.len(),
            chunks_fetched = result.chunks_fetched,
            chunks_dropped = result.chunks_dropped,
            "Backfill range finished"
        );
        result
    }

    async fn fetch_chunk_with_retry(
        &self,
        key: &SeriesKey,
        chunk: FetchChunk,
    ) -> (FetchChunk, Result<Vec<Candle>, ChunkError>) {
        let attempts = self.config.retry_attempts.max(1);
        let mut last_error = None;
        for attempt in 0..attempts {
            if attempt > 0 {
                let delay = self.config.backoff_delay(attempt - 1);
                warn!(
                    event_type = "backfill_chunk_retry",
                    series = %key,
                    chunk_start = chunk.start_time,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying chunk fetch"
                );
                tokio::time::sleep(delay).await;
            }
            match self.fetch_chunk_once(key, chunk).await {
                Ok(candles) => return (chunk, Ok(candles)),
                Err(e) => last_error = Some(e),
            }
        }
        // attempts >= 1 guarantees last_error is populated here
        (
            chunk,
            Err(last_error.unwrap_or_else(|| ChunkError::Decode("no attempt made".to_string()))),
        )
    }

    async fn fetch_chunk_once(
        &self,
        key: &SeriesKey,
        chunk: FetchChunk,
    ) -> Result<Vec<Candle>, ChunkError> {
        let url = self.klines_url(key.instrument_type);
        // The API takes millisecond bounds with an inclusive end; subtracting
        // one keeps the chunk window half-open.
        let start_ms = chunk.start_time / 1_000;
        let end_ms = chunk.end_time / 1_000 - 1;

        let start_param = start_ms.to_string();
        let end_param = end_ms.to_string();
        let limit_param = chunk.max_candles.to_string();
        let request = self
            .client
            .get(&url)
            .query(&[
                ("symbol", key.symbol.as_str()),
                ("interval", key.timeframe.label()),
                ("startTime", start_param.as_str()),
                ("endTime", end_param.as_str()),
                ("limit", limit_param.as_str()),
            ])
            .send();

        let response = tokio::time::timeout(self.config.request_timeout, request)
            .await
            .map_err(|_| ChunkError::Timeout { url: url.clone() })?
            .map_err(|e| ChunkError::Http {
                url: url.clone(),
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(ChunkError::Status {
                url,
                status: response.status().as_u16(),
            });
        }

        let rows: Vec<RestKline> = response
            .json()
            .await
            .map_err(|e| ChunkError::Decode(e.to_string()))?;

        let mut candles = Vec::with_capacity(rows.len());
        for row in rows {
            let candle = row.into_candle(key)?;
            // Defensive window clamp keeps chunk results disjoint even if
            // the API returns edge candles outside the requested bounds.
            if candle.timestamp >= chunk.start_time && candle.timestamp < chunk.end_time {
                candles.push(candle);
            }
        }
        Ok(candles)
    }

    fn klines_url(&self, instrument_type: InstrumentType) -> String {
        match instrument_type {
            InstrumentType::Spot => format!("{}/api/v3/klines", self.config.spot_base_url),
            InstrumentType::PerpetualFutures => {
                format!("{}/fapi/v1/klines", self.config.futures_base_url)
            }
        }
    }
}

/// One kline row as returned by the REST API
#[derive(Debug, Deserialize)]
struct RestKline(
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
    #[serde(default)] serde_json::Value, // ignore
);

impl RestKline {
    fn into_candle(self, key: &SeriesKey) -> Result<Candle, ChunkError> {
        let precision =
            detect_precision_value(self.0).map_err(|e| ChunkError::Decode(e.to_string()))?;
        let close_precision =
            detect_precision_value(self.6).map_err(|e| ChunkError::Decode(e.to_string()))?;

        let decimal = |field: &str| {
            FixedPoint::parse(field).map_err(|e| ChunkError::Decode(e.to_string()))
        };

        let candle = Candle {
            timestamp: normalize(self.0, precision),
            open: decimal(&self.1)?,
            high: decimal(&self.2)?,
            low: decimal(&self.3)?,
            close: decimal(&self.4)?,
            volume: decimal(&self.5)?,
            close_time: normalize(self.6, close_precision),
            quote_volume: decimal(&self.7)?,
            trade_count: self.8,
            taker_buy_base_volume: decimal(&self.9)?,
            taker_buy_quote_volume: decimal(&self.10)?,
            funding_rate: None,
            symbol: key.symbol.clone(),
            timeframe: key.timeframe,
            instrument_type: key.instrument_type,
            data_source: DataSource::RestApi,
            version: 0,
            sign: 1,
        };
        candle
            .validate()
            .map_err(|e| ChunkError::Decode(e.to_string()))?;
        Ok(candle)
    }
}
