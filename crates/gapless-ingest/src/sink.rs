//! Sink interface boundary
//!
//! The durable store is an external merge-on-read collaborator: rows carry a
//! `version`/`sign` pair and the store keeps, per identity key, the row with
//! the numerically highest version when queried with deduplication. This
//! core never implements that merge; it only guarantees the inputs are
//! correct (deterministic versions, normalized timestamps, validated OHLC
//! bounds). Writes are append/upsert only; rows are never deleted or
//! mutated in place.

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

use gapless_core::{Candle, SeriesKey};

/// Sink write/read errors
///
/// Fatal by design: a silently lost write would violate the zero-gap
/// guarantee, so sink failures propagate to the caller unswallowed.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The store rejected the batch
    #[error("sink rejected batch: {0}")]
    Rejected(String),

    /// The store could not be reached
    #[error("sink unavailable: {0}")]
    Unavailable(String),
}

/// External merge store boundary
#[async_trait]
pub trait CandleSink: Send + Sync {
    /// Append a batch of versioned rows; returns the number accepted
    async fn write_batch(&self, rows: Vec<Candle>) -> Result<usize, SinkError>;

    /// Deduplicated observed timestamps for a series within the half-open
    /// window `[start_us, end_us)`, in ascending order
    async fn series_timestamps(
        &self,
        key: &SeriesKey,
        start_us: i64,
        end_us: i64,
    ) -> Result<Vec<i64>, SinkError>;
}

/// In-memory merge double
///
/// Implements the store's highest-version-wins semantics per identity key so
/// ingestion idempotence is observable in-process. Test and development use
/// only; the production sink lives outside this crate.
#[derive(Default)]
pub struct MemorySink {
    rows: RwLock<HashMap<(SeriesKey, i64), Candle>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Surviving rows for a series after deduplicating merge, in
    /// timestamp order
    pub async fn merged_rows(&self, key: &SeriesKey) -> Vec<Candle> {
        let rows = self.rows.read().await;
        let mut merged: Vec<Candle> = rows
            .iter()
            .filter(|((row_key, _), _)| row_key == key)
            .map(|(_, candle)| candle.clone())
            .collect();
        merged.sort_by_key(|candle| candle.timestamp);
        merged
    }

    /// Total surviving rows across all series
    pub async fn row_count(&self) -> usize {
        self.rows.read().await.len()
    }
}

#[async_trait]
impl CandleSink for MemorySink {
    async fn write_batch(&self, batch: Vec<Candle>) -> Result<usize, SinkError> {
        let accepted = batch.len();
        let mut rows = self.rows.write().await;
        for candle in batch {
            let identity = (candle.series_key(), candle.timestamp);
            match rows.get(&identity) {
                // Highest version survives; equal versions are the
                // re-ingestion no-op case
                Some(existing) if existing.version >= candle.version => {}
                _ => {
                    rows.insert(identity, candle);
                }
            }
        }
        Ok(accepted)
    }

    async fn series_timestamps(
        &self,
        key: &SeriesKey,
        start_us: i64,
        end_us: i64,
    ) -> Result<Vec<i64>, SinkError> {
        let rows = self.rows.read().await;
        let mut timestamps: Vec<i64> = rows
            .keys()
            .filter(|(row_key, timestamp)| {
                row_key == key && (start_us..end_us).contains(timestamp)
            })
            .map(|(_, timestamp)| *timestamp)
            .collect();
        timestamps.sort_unstable();
        Ok(timestamps)
    }
}
