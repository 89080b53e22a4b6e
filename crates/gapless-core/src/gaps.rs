//! Gap detection over observed candle timestamps
//!
//! Walks a sorted, deduplicated timestamp sequence pairwise and emits a
//! [`Gap`] whenever two neighbours are more than one interval apart. The
//! input is defensively re-sorted: an unsorted scan would silently fabricate
//! spurious gaps, and duplicates are not gaps.

use crate::types::Gap;
use tracing::debug;

/// Detect all holes in an observed timestamp sequence
///
/// `interval_us` is the expected cadence from the timeframe registry.
/// Empty and single-element sequences yield no gaps. Linear after the
/// defensive sort.
pub fn detect_gaps(timestamps: &[i64], interval_us: i64) -> Vec<Gap> {
    assert!(interval_us > 0, "interval must be positive");

    let mut observed = timestamps.to_vec();
    observed.sort_unstable();
    observed.dedup();

    let mut gaps = Vec::new();
    for pair in observed.windows(2) {
        let (current, next) = (pair[0], pair[1]);
        if next - current > interval_us {
            gaps.push(Gap {
                start_time: current,
                end_time: next,
                interval_us,
            });
        }
    }

    if !gaps.is_empty() {
        debug!(
            event_type = "gaps_detected",
            gap_count = gaps.len(),
            missing_candles = gaps.iter().map(|g| g.missing_count()).sum::<i64>(),
            interval_us,
            "Observed sequence has holes"
        );
    }
    gaps
}

/// Number of candles expected in the half-open window `[start, end)`
pub fn expected_count(start_us: i64, end_us: i64, interval_us: i64) -> i64 {
    assert!(interval_us > 0, "interval must be positive");
    if end_us <= start_us {
        return 0;
    }
    (end_us - start_us + interval_us - 1) / interval_us
}

#[cfg(test)]
mod tests {
    use super::*;

    const H2: i64 = 7_200_000_000;

    #[test]
    fn empty_and_singleton_sequences_have_no_gaps() {
        assert!(detect_gaps(&[], H2).is_empty());
        assert!(detect_gaps(&[0], H2).is_empty());
    }

    #[test]
    fn contiguous_sequence_has_no_gaps() {
        let ts: Vec<i64> = (0..48).map(|i| i * H2).collect();
        assert!(detect_gaps(&ts, H2).is_empty());
    }

    #[test]
    fn detects_single_missing_candle_at_two_hours() {
        // 00:00, 02:00, 06:00: the 04:00 candle is missing
        let ts = [0, H2, 3 * H2];
        let gaps = detect_gaps(&ts, H2);
        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].start_time, H2);
        assert_eq!(gaps[0].end_time, 3 * H2);
        assert_eq!(gaps[0].missing_count(), 1);
    }

    #[test]
    fn detects_multiple_gaps_in_order() {
        let ts = [0, H2, 4 * H2, 5 * H2, 9 * H2];
        let gaps = detect_gaps(&ts, H2);
        assert_eq!(gaps.len(), 2);
        assert_eq!((gaps[0].start_time, gaps[0].end_time), (H2, 4 * H2));
        assert_eq!(gaps[0].missing_count(), 2);
        assert_eq!((gaps[1].start_time, gaps[1].end_time), (5 * H2, 9 * H2));
        assert_eq!(gaps[1].missing_count(), 3);
    }

    #[test]
    fn duplicates_are_not_gaps() {
        let ts = [0, H2, H2, H2, 2 * H2];
        assert!(detect_gaps(&ts, H2).is_empty());
    }

    #[test]
    fn unsorted_input_is_resorted_before_scanning() {
        let ts = [3 * H2, 0, H2];
        let gaps = detect_gaps(&ts, H2);
        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].missing_count(), 1);
    }

    #[test]
    fn multi_day_holes_are_true_gaps() {
        // Daily candles with a weekend-sized hole: still a gap, crypto
        // trades 24/7 and no tolerance window applies.
        const D1: i64 = 86_400_000_000;
        let ts = [0, D1, 4 * D1];
        let gaps = detect_gaps(&ts, D1);
        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].missing_count(), 2);
    }

    #[test]
    fn expected_count_covers_half_open_window() {
        assert_eq!(expected_count(0, 10 * H2, H2), 10);
        assert_eq!(expected_count(0, 0, H2), 0);
        assert_eq!(expected_count(0, H2 + 1, H2), 2);
    }
}
