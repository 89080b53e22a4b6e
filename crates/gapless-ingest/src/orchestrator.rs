//! Ingestion orchestrator state machine
//!
//! Per (symbol, timeframe, instrument-type) key the pipeline is sequential:
//! `Idle → Scanning → {GapsFound → Backfilling → Verifying, NoGaps} →
//! Complete | Failed`. Across independent keys the orchestrator may run
//! concurrently from multiple workers: deterministic versions make writes
//! commutative and idempotent, so no cross-key locking exists. There is no
//! internal retry loop: callers re-invoke the whole state machine, which is
//! a no-op for everything already ingested.
//!
//! Verification compares missing-candle totals, not raw gap counts: a
//! partially repaired hole splits into smaller holes, which would read as
//! "more gaps" while real progress was made.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use gapless_config::BackfillConfig;
use gapless_core::{detect_gaps, stamp_version, Gap, SeriesKey};
use gapless_providers::binance::bulk::{BulkError, BulkKlinesLoader};
use gapless_providers::binance::rest::{BackfillResult, RestClientConfig, RestKlinesClient};

use crate::sink::{CandleSink, SinkError};

/// Orchestrator errors
///
/// Only genuinely unrecoverable conditions surface here; upstream data
/// unavailability is reported through the outcome instead.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Sink failures are never swallowed
    #[error(transparent)]
    Sink(#[from] SinkError),

    /// Bulk acquisition failed beyond the daily fallback
    #[error(transparent)]
    Bulk(#[from] BulkError),
}

/// Terminal run status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestStatus {
    Complete,
    Failed,
}

/// Structured outcome of one orchestrator run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestOutcome {
    pub gaps_detected: u32,
    pub gaps_filled: u32,
    pub rows_inserted: u64,
    pub completeness_percent: f64,
    pub status: IngestStatus,
}

/// Pipeline states, logged at every transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IngestState {
    Idle,
    Scanning,
    GapsFound,
    NoGaps,
    Backfilling,
    Verifying,
    Complete,
    Failed,
}

/// Gap repair seam
///
/// Implemented by the live REST client; test doubles script it.
#[async_trait]
pub trait BackfillSource: Send + Sync {
    /// Fetch all candles in the half-open window `[start_us, end_us)`
    async fn fetch_range(&self, key: &SeriesKey, start_us: i64, end_us: i64) -> BackfillResult;
}

#[async_trait]
impl BackfillSource for RestKlinesClient {
    async fn fetch_range(&self, key: &SeriesKey, start_us: i64, end_us: i64) -> BackfillResult {
        RestKlinesClient::fetch_range(self, key, start_us, end_us).await
    }
}

/// Build the REST client tuning from layered settings
pub fn rest_client_config(config: &BackfillConfig) -> RestClientConfig {
    RestClientConfig {
        spot_base_url: config.spot_base_url.clone(),
        futures_base_url: config.futures_base_url.clone(),
        max_candles_per_request: config.max_candles_per_request,
        request_timeout: Duration::from_secs(config.request_timeout_secs),
        retry_attempts: config.retry_attempts,
        retry_base_delay: Duration::from_millis(config.retry_delay_ms),
        retry_max_delay: Duration::from_millis(config.retry_max_delay_ms),
        retry_jitter: 0.25,
        max_concurrent_chunks: config.max_concurrent_chunks,
    }
}

/// Sequences bulk acquisition, gap scan, backfill and verification for one
/// series at a time
pub struct Orchestrator<S, B> {
    sink: S,
    backfill: B,
    cancel: CancellationToken,
}

impl<S: CandleSink, B: BackfillSource> Orchestrator<S, B> {
    pub fn new(sink: S, backfill: B) -> Self {
        Self {
            sink,
            backfill,
            cancel: CancellationToken::new(),
        }
    }

    /// Attach an external cancellation token
    ///
    /// Cancellation abandons outstanding chunk fetches; sink state stays
    /// consistent because a chunk's candles are only written after its fetch
    /// fully completes.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Ingest one calendar month: bulk acquire (monthly → daily fallback),
    /// then reconcile the month window
    pub async fn ingest_month(
        &self,
        loader: &BulkKlinesLoader,
        year: i32,
        month: u32,
    ) -> Result<IngestOutcome, IngestError> {
        let key = loader.key().clone();
        let load = loader.load_month(year, month).await?;

        info!(
            event_type = "bulk_acquired",
            series = %key,
            year,
            month,
            candle_count = load.candles.len(),
            files_retrieved = load.files_retrieved,
            files_expected = load.files_expected,
            rows_rejected = load.rows_rejected,
            "Bulk month acquired"
        );

        let mut rows = load.candles;
        for candle in &mut rows {
            stamp_version(candle);
        }
        let mut bulk_inserted = 0u64;
        if !rows.is_empty() {
            bulk_inserted = self.sink.write_batch(rows).await? as u64;
        }

        let (start_us, end_us) = month_window_us(year, month)?;
        let mut outcome = self.reconcile(&key, start_us, end_us).await?;
        outcome.rows_inserted += bulk_inserted;
        Ok(outcome)
    }

    /// Scan → backfill → verify over a half-open window of one series
    pub async fn reconcile(
        &self,
        key: &SeriesKey,
        start_us: i64,
        end_us: i64,
    ) -> Result<IngestOutcome, IngestError> {
        let interval = key.timeframe.interval_us();
        let mut state = IngestState::Idle;
        state = self.transition(key, state, IngestState::Scanning);

        let observed = self.sink.series_timestamps(key, start_us, end_us).await?;
        let gaps = detect_gaps(&observed, interval);
        let gaps_detected = gaps.len() as u32;
        let missing_before: i64 = gaps.iter().map(Gap::missing_count).sum();

        if gaps.is_empty() {
            state = self.transition(key, state, IngestState::NoGaps);
            self.transition(key, state, IngestState::Complete);
            let outcome = IngestOutcome {
                gaps_detected: 0,
                gaps_filled: 0,
                rows_inserted: 0,
                completeness_percent: 100.0,
                status: IngestStatus::Complete,
            };
            self.report(key, &outcome);
            return Ok(outcome);
        }

        state = self.transition(key, state, IngestState::GapsFound);
        state = self.transition(key, state, IngestState::Backfilling);

        let mut rows_inserted = 0u64;
        for gap in &gaps {
            if self.cancel.is_cancelled() {
                warn!(
                    event_type = "ingest_cancelled",
                    series = %key,
                    "Cancellation requested, abandoning remaining gaps"
                );
                break;
            }

            // The missing candles lie strictly inside the gap
            let fill_start = gap.start_time + interval;
            let fill_end = gap.end_time;

            let result = tokio::select! {
                _ = self.cancel.cancelled() => {
                    warn!(
                        event_type = "ingest_cancelled",
                        series = %key,
                        "Cancellation requested, abandoning in-flight fetch"
                    );
                    break;
                }
                result = self.backfill.fetch_range(key, fill_start, fill_end) => result,
            };

            let mut candles = result.candles;
            for candle in &mut candles {
                stamp_version(candle);
            }
            if !candles.is_empty() {
                rows_inserted += self.sink.write_batch(candles).await? as u64;
            }
        }

        state = self.transition(key, state, IngestState::Verifying);

        let observed = self.sink.series_timestamps(key, start_us, end_us).await?;
        let remaining = detect_gaps(&observed, interval);
        let missing_after: i64 = remaining.iter().map(Gap::missing_count).sum();

        let gaps_filled = gaps_detected.saturating_sub(remaining.len() as u32);
        let completeness_percent = if missing_before == 0 {
            100.0
        } else {
            ((missing_before - missing_after).max(0) as f64 / missing_before as f64) * 100.0
        };

        let status = if missing_after == 0 {
            IngestStatus::Complete
        } else if missing_after < missing_before {
            // Remaining holes reflect data the upstream sources themselves
            // cannot supply; partial repair still terminates as Complete
            IngestStatus::Complete
        } else {
            IngestStatus::Failed
        };

        match status {
            IngestStatus::Complete => self.transition(key, state, IngestState::Complete),
            IngestStatus::Failed => self.transition(key, state, IngestState::Failed),
        };

        let outcome = IngestOutcome {
            gaps_detected,
            gaps_filled,
            rows_inserted,
            completeness_percent,
            status,
        };
        self.report(key, &outcome);
        Ok(outcome)
    }

    fn transition(&self, key: &SeriesKey, from: IngestState, to: IngestState) -> IngestState {
        debug!(
            event_type = "state_transition",
            series = %key,
            from = ?from,
            to = ?to,
            "Orchestrator state change"
        );
        to
    }

    fn report(&self, key: &SeriesKey, outcome: &IngestOutcome) {
        info!(
            event_type = "ingest_outcome",
            series = %key,
            gaps_detected = outcome.gaps_detected,
            gaps_filled = outcome.gaps_filled,
            rows_inserted = outcome.rows_inserted,
            completeness_percent = outcome.completeness_percent,
            status = ?outcome.status,
            "Ingestion run finished"
        );
    }
}

/// Half-open microsecond window covering one calendar month
fn month_window_us(year: i32, month: u32) -> Result<(i64, i64), IngestError> {
    let start = first_of_month_us(year, month)?;
    let end = if month == 12 {
        first_of_month_us(year + 1, 1)?
    } else {
        first_of_month_us(year, month + 1)?
    };
    Ok((start, end))
}

fn first_of_month_us(year: i32, month: u32) -> Result<i64, IngestError> {
    let date = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or(BulkError::InvalidMonth { year, month })?;
    // Midnight always exists
    let midnight = date.and_hms_opt(0, 0, 0).ok_or(BulkError::InvalidMonth { year, month })?;
    Ok(midnight.and_utc().timestamp_micros())
}
