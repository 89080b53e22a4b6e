//! Timestamp precision detection and normalization
//!
//! The upstream CDN switched spot-data timestamps from 13-digit milliseconds
//! to 16-digit microseconds at a fixed historical date while leaving futures
//! data unchanged, so precision is detected per payload and carried as data
//! rather than inferred from the wire variant. The canonical representation
//! everywhere downstream is microseconds.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Minimum digit count for a classifiable epoch timestamp
const MIN_TIMESTAMP_DIGITS: usize = 10;

/// Digit count at which a value is already microseconds
const MICROSECOND_DIGITS: usize = 16;

/// Timestamp classification errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimestampError {
    /// Field does not consist of decimal digits
    #[error("timestamp field is not numeric: {0:?}")]
    NotNumeric(String),

    /// Too few digits to be an epoch timestamp in ms or µs
    #[error("timestamp {0:?} has fewer than {MIN_TIMESTAMP_DIGITS} digits")]
    TooFewDigits(String),
}

/// Wire precision of a raw timestamp value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimestampPrecision {
    /// 13-digit epoch milliseconds
    Millis,
    /// 16-digit epoch microseconds
    Micros,
}

/// Classify a raw timestamp field by digit count
///
/// ≥16 digits → microseconds, 10–15 digits → milliseconds, anything else
/// fails closed.
pub fn detect_precision(field: &str) -> Result<TimestampPrecision, TimestampError> {
    let trimmed = field.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(TimestampError::NotNumeric(field.to_string()));
    }
    match trimmed.len() {
        n if n >= MICROSECOND_DIGITS => Ok(TimestampPrecision::Micros),
        n if n >= MIN_TIMESTAMP_DIGITS => Ok(TimestampPrecision::Millis),
        _ => Err(TimestampError::TooFewDigits(field.to_string())),
    }
}

/// Classify an already-parsed timestamp value by decimal digit count
pub fn detect_precision_value(raw: i64) -> Result<TimestampPrecision, TimestampError> {
    if raw <= 0 {
        return Err(TimestampError::NotNumeric(raw.to_string()));
    }
    let digits = raw.ilog10() as usize + 1;
    match digits {
        n if n >= MICROSECOND_DIGITS => Ok(TimestampPrecision::Micros),
        n if n >= MIN_TIMESTAMP_DIGITS => Ok(TimestampPrecision::Millis),
        _ => Err(TimestampError::TooFewDigits(raw.to_string())),
    }
}

/// Normalize a raw timestamp to canonical microseconds
///
/// Lossless and idempotent: a microsecond value passes through unchanged,
/// so normalizing an already-normalized value is a no-op.
pub fn normalize(raw: i64, precision: TimestampPrecision) -> i64 {
    match precision {
        TimestampPrecision::Millis => raw * 1_000,
        TimestampPrecision::Micros => raw,
    }
}

/// Plausibility bounds for normalized timestamps
///
/// 2000-01-01 .. 2035-01-01 in microseconds. Covers every crypto venue's
/// history while rejecting epoch-zero and far-future values that indicate a
/// precision bug upstream.
pub fn validate_timestamp(timestamp_us: i64) -> bool {
    const MIN_TIMESTAMP: i64 = 946_684_800_000_000; // 2000-01-01 00:00:00 UTC
    const MAX_TIMESTAMP: i64 = 2_051_222_400_000_000; // 2035-01-01 00:00:00 UTC
    (MIN_TIMESTAMP..=MAX_TIMESTAMP).contains(&timestamp_us)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn millisecond_input_normalizes_to_microseconds() {
        // 2024-01-01 00:00:00 UTC
        assert_eq!(
            normalize(1_704_067_200_000, TimestampPrecision::Millis),
            1_704_067_200_000_000,
        );
    }

    #[test]
    fn microsecond_input_passes_through() {
        assert_eq!(
            normalize(1_704_067_200_000_000, TimestampPrecision::Micros),
            1_704_067_200_000_000,
        );
    }

    #[test]
    fn normalization_is_idempotent() {
        let once = normalize(1_704_067_200_000, TimestampPrecision::Millis);
        let twice = normalize(once, TimestampPrecision::Micros);
        assert_eq!(once, twice);
    }

    #[test]
    fn detects_precision_by_digit_count() {
        assert_eq!(
            detect_precision("1704067200000").unwrap(),
            TimestampPrecision::Millis,
        );
        assert_eq!(
            detect_precision("1704067200000000").unwrap(),
            TimestampPrecision::Micros,
        );
        // 10 digits (epoch seconds territory) still classifies as millis
        // per the digit-count contract; range validation catches the rest.
        assert_eq!(
            detect_precision("1704067200").unwrap(),
            TimestampPrecision::Millis,
        );
    }

    #[test]
    fn short_or_non_numeric_fields_fail_closed() {
        assert_eq!(
            detect_precision("170406720"),
            Err(TimestampError::TooFewDigits("170406720".to_string())),
        );
        assert_eq!(
            detect_precision("open_time"),
            Err(TimestampError::NotNumeric("open_time".to_string())),
        );
        assert_eq!(
            detect_precision("-1704067200000"),
            Err(TimestampError::NotNumeric("-1704067200000".to_string())),
        );
        assert!(detect_precision_value(999_999_999).is_err());
        assert!(detect_precision_value(-5).is_err());
    }

    #[test]
    fn value_detection_matches_string_detection() {
        assert_eq!(
            detect_precision_value(1_704_067_200_000).unwrap(),
            TimestampPrecision::Millis,
        );
        assert_eq!(
            detect_precision_value(1_704_067_200_000_000).unwrap(),
            TimestampPrecision::Micros,
        );
    }

    #[test]
    fn validates_plausible_range() {
        assert!(validate_timestamp(1_704_067_200_000_000)); // 2024
        assert!(!validate_timestamp(1_704_067_200_000)); // ms value leaked through
        assert!(!validate_timestamp(2_524_608_000_000_000)); // 2050
    }
}
