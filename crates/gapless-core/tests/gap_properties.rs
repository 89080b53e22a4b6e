// Property tests for the gap detector: deleting a contiguous run of candles
// from a perfectly regular series must surface as exactly one gap whose
// missing_count equals the number of deleted candles, at every supported
// timeframe.

use gapless_core::{detect_gaps, Timeframe};
use proptest::prelude::*;

fn regular_series(interval_us: i64, len: usize) -> Vec<i64> {
    let base = 1_704_067_200_000_000_i64; // 2024-01-01 00:00:00 UTC
    (0..len as i64).map(|i| base + i * interval_us).collect()
}

proptest! {
    #[test]
    fn removing_one_run_yields_one_gap(
        tf_index in 0usize..13,
        len in 4usize..120,
        start in 1usize..118,
        removed in 1usize..6,
    ) {
        // The removed run must leave at least one observation on each side.
        prop_assume!(start + removed <= len - 1);

        let tf = Timeframe::ALL[tf_index];
        let interval = tf.interval_us();
        let mut series = regular_series(interval, len);
        series.drain(start..start + removed);

        let gaps = detect_gaps(&series, interval);
        prop_assert_eq!(gaps.len(), 1);
        prop_assert_eq!(gaps[0].missing_count(), removed as i64);
        prop_assert_eq!(gaps[0].duration_us(), (removed as i64 + 1) * interval);
    }

    #[test]
    fn intact_series_never_reports_gaps(
        tf_index in 0usize..13,
        len in 0usize..120,
    ) {
        let tf = Timeframe::ALL[tf_index];
        let series = regular_series(tf.interval_us(), len);
        prop_assert!(detect_gaps(&series, tf.interval_us()).is_empty());
    }

    #[test]
    fn shuffled_input_matches_sorted_input(
        len in 4usize..60,
        start in 1usize..58,
        removed in 1usize..4,
        seed in any::<u64>(),
    ) {
        prop_assume!(start + removed <= len - 1);

        let interval = Timeframe::M1.interval_us();
        let mut series = regular_series(interval, len);
        series.drain(start..start + removed);

        // Deterministic pseudo-shuffle driven by the seed
        let mut shuffled = series.clone();
        let n = shuffled.len();
        let mut state = seed | 1;
        for i in (1..n).rev() {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            shuffled.swap(i, (state % (i as u64 + 1)) as usize);
        }

        prop_assert_eq!(detect_gaps(&shuffled, interval), detect_gaps(&series, interval));
    }
}
