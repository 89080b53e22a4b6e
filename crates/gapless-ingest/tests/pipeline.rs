// End-to-end pipeline tests against in-process doubles: scan → backfill →
// verify with the memory merge sink and a scripted backfill source.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use gapless_core::{
    stamp_version, Candle, DataSource, FixedPoint, InstrumentType, SeriesKey, Timeframe,
};
use gapless_ingest::{
    BackfillSource, CandleSink, IngestStatus, MemorySink, Orchestrator,
};
use gapless_providers::binance::rest::BackfillResult;
use gapless_providers::parse_klines_csv;

const T0: i64 = 1_704_067_200_000_000; // 2024-01-01 00:00:00 UTC
const M1: i64 = 60_000_000;

fn series_key() -> SeriesKey {
    SeriesKey::new("BTCUSDT", Timeframe::M1, InstrumentType::Spot)
}

fn minute_candle(timestamp: i64, source: DataSource) -> Candle {
    let mut candle = Candle {
        timestamp,
        open: FixedPoint::parse("42000.0").unwrap(),
        high: FixedPoint::parse("42100.0").unwrap(),
        low: FixedPoint::parse("41900.0").unwrap(),
        close: FixedPoint::parse("42050.0").unwrap(),
        volume: FixedPoint::parse("10.0").unwrap(),
        close_time: timestamp + M1 - 1,
        quote_volume: FixedPoint::parse("420000.0").unwrap(),
        trade_count: 100,
        taker_buy_base_volume: FixedPoint::parse("5.0").unwrap(),
        taker_buy_quote_volume: FixedPoint::parse("210000.0").unwrap(),
        funding_rate: None,
        symbol: "BTCUSDT".to_string(),
        timeframe: Timeframe::M1,
        instrument_type: InstrumentType::Spot,
        data_source: source,
        version: 0,
        sign: 1,
    };
    stamp_version(&mut candle);
    candle
}

/// Backfill double answering from a fixed candle inventory
struct ScriptedSource {
    available: Vec<Candle>,
}

impl ScriptedSource {
    fn empty() -> Self {
        Self { available: Vec::new() }
    }

    fn with_minutes(offsets: &[i64]) -> Self {
        Self {
            available: offsets
                .iter()
                .map(|i| minute_candle(T0 + i * M1, DataSource::RestApi))
                .collect(),
        }
    }
}

#[async_trait]
impl BackfillSource for ScriptedSource {
    async fn fetch_range(&self, _key: &SeriesKey, start_us: i64, end_us: i64) -> BackfillResult {
        let candles: Vec<Candle> = self
            .available
            .iter()
            .filter(|candle| candle.timestamp >= start_us && candle.timestamp < end_us)
            .cloned()
            .collect();
        BackfillResult {
            candles,
            chunks_total: 1,
            chunks_fetched: 1,
            chunks_dropped: 0,
        }
    }
}

async fn preload(sink: &MemorySink, offsets: &[i64]) {
    let rows: Vec<Candle> = offsets
        .iter()
        .map(|i| minute_candle(T0 + i * M1, DataSource::BulkCdn))
        .collect();
    sink.write_batch(rows).await.unwrap();
}

#[tokio::test]
async fn contiguous_series_completes_without_backfill() {
    let sink = MemorySink::new();
    preload(&sink, &[0, 1, 2, 3, 4]).await;

    let orchestrator = Orchestrator::new(sink, ScriptedSource::empty());
    let outcome = orchestrator
        .reconcile(&series_key(), T0, T0 + 5 * M1)
        .await
        .unwrap();

    assert_eq!(outcome.status, IngestStatus::Complete);
    assert_eq!(outcome.gaps_detected, 0);
    assert_eq!(outcome.gaps_filled, 0);
    assert_eq!(outcome.rows_inserted, 0);
    assert_eq!(outcome.completeness_percent, 100.0);
}

#[tokio::test]
async fn single_missing_candle_is_backfilled() {
    let sink = MemorySink::new();
    preload(&sink, &[0, 1, 3, 4]).await; // minute 2 missing

    let orchestrator = Orchestrator::new(sink, ScriptedSource::with_minutes(&[2]));
    let outcome = orchestrator
        .reconcile(&series_key(), T0, T0 + 5 * M1)
        .await
        .unwrap();

    assert_eq!(outcome.status, IngestStatus::Complete);
    assert_eq!(outcome.gaps_detected, 1);
    assert_eq!(outcome.gaps_filled, 1);
    assert_eq!(outcome.rows_inserted, 1);
    assert_eq!(outcome.completeness_percent, 100.0);

    let merged = orchestrator.sink().merged_rows(&series_key()).await;
    assert_eq!(merged.len(), 5);
    let repaired = merged
        .iter()
        .find(|candle| candle.timestamp == T0 + 2 * M1)
        .unwrap();
    assert_eq!(repaired.data_source, DataSource::RestApi);
}

#[tokio::test]
async fn partial_repair_is_degraded_success() {
    let sink = MemorySink::new();
    preload(&sink, &[0, 4]).await; // minutes 1..=3 missing

    // The source can only supply two of the three missing candles
    let orchestrator = Orchestrator::new(sink, ScriptedSource::with_minutes(&[1, 3]));
    let outcome = orchestrator
        .reconcile(&series_key(), T0, T0 + 5 * M1)
        .await
        .unwrap();

    assert_eq!(outcome.status, IngestStatus::Complete);
    assert_eq!(outcome.gaps_detected, 1);
    assert_eq!(outcome.rows_inserted, 2);
    assert!(outcome.completeness_percent > 60.0 && outcome.completeness_percent < 70.0);
}

#[tokio::test]
async fn unfillable_gap_fails_the_run() {
    let sink = MemorySink::new();
    preload(&sink, &[0, 3]).await;

    let orchestrator = Orchestrator::new(sink, ScriptedSource::empty());
    let outcome = orchestrator
        .reconcile(&series_key(), T0, T0 + 4 * M1)
        .await
        .unwrap();

    assert_eq!(outcome.status, IngestStatus::Failed);
    assert_eq!(outcome.gaps_detected, 1);
    assert_eq!(outcome.gaps_filled, 0);
    assert_eq!(outcome.rows_inserted, 0);
    assert_eq!(outcome.completeness_percent, 0.0);
}

#[tokio::test]
async fn cancellation_leaves_sink_state_consistent() {
    let sink = MemorySink::new();
    preload(&sink, &[0, 2]).await;

    let cancel = CancellationToken::new();
    cancel.cancel();
    let orchestrator = Orchestrator::new(sink, ScriptedSource::with_minutes(&[1]))
        .with_cancellation(cancel);
    let outcome = orchestrator
        .reconcile(&series_key(), T0, T0 + 3 * M1)
        .await
        .unwrap();

    // Nothing was written mid-flight and the run reports honestly
    assert_eq!(outcome.status, IngestStatus::Failed);
    assert_eq!(outcome.rows_inserted, 0);
    assert_eq!(orchestrator.sink().row_count().await, 2);
}

#[tokio::test]
async fn reingesting_the_same_file_is_a_no_op() {
    const PAYLOAD: &str = "\
1704067200000,42000.0,42100.5,41900.0,42050.25,10.5,1704067259999,441525.0,1200,5.1,214200.0
1704067260000,42050.25,42080.0,42000.0,42010.0,8.2,1704067319999,344738.0,900,4.0,168200.0
1704067320000,42010.0,42060.0,41990.0,42030.0,6.1,1704067379999,256383.0,700,3.2,134500.0
";
    let key = series_key();
    let sink = MemorySink::new();

    for _ in 0..2 {
        let mut parsed = parse_klines_csv(PAYLOAD, &key, DataSource::BulkCdn).unwrap();
        for candle in &mut parsed.candles {
            stamp_version(candle);
        }
        sink.write_batch(parsed.candles).await.unwrap();
    }

    // Deterministic versions make the second ingestion a true no-op
    assert_eq!(sink.row_count().await, 3);
    let merged = sink.merged_rows(&key).await;
    assert_eq!(merged.len(), 3);
    for candle in &merged {
        assert_ne!(candle.version, 0);
    }
}
