//! Fixed-point arithmetic for precise decimal values without floating point errors
//!
//! All prices and volumes are stored as `i64` scaled by 1e8. Besides avoiding
//! float rounding, the fixed 8-decimal rendering gives every value exactly one
//! string representation, which the version hasher relies on.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Scale factor for 8 decimal places (100,000,000)
pub const SCALE: i64 = 100_000_000;

/// Fixed-point parse errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FixedPointError {
    /// Not a decimal number
    #[error("invalid decimal format: {0:?}")]
    InvalidFormat(String),

    /// More than 8 fractional digits
    #[error("too many decimal places in {0:?} (max 8)")]
    TooManyDecimals(String),
}

/// Fixed-point decimal with 8 fractional digits
///
/// Example:
/// - `50000.12345678` → `FixedPoint(5000012345678)`
/// - `1.5` → `FixedPoint(150000000)`
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct FixedPoint(pub i64);

impl FixedPoint {
    /// Zero value
    pub const ZERO: FixedPoint = FixedPoint(0);

    /// Parse a decimal string such as `"42000.5"` or `"-0.00012300"`
    pub fn parse(s: &str) -> Result<Self, FixedPointError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(FixedPointError::InvalidFormat(s.to_string()));
        }

        // Sign is taken from the string, not the parsed integer part, so
        // "-0.5" keeps its sign.
        let (negative, unsigned) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };

        let mut parts = unsigned.splitn(2, '.');
        let int_str = parts.next().unwrap_or("");
        let frac_str = parts.next();

        if int_str.is_empty() || !int_str.bytes().all(|b| b.is_ascii_digit()) {
            return Err(FixedPointError::InvalidFormat(s.to_string()));
        }
        let integer_part: i64 = int_str
            .parse()
            .map_err(|_| FixedPointError::InvalidFormat(s.to_string()))?;

        // Fractional digits parse directly and scale by 10^(8 - len),
        // no intermediate string padding.
        let fractional_part = match frac_str {
            None => 0,
            Some("") => return Err(FixedPointError::InvalidFormat(s.to_string())),
            Some(frac) => {
                if frac.len() > 8 {
                    return Err(FixedPointError::TooManyDecimals(s.to_string()));
                }
                if !frac.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(FixedPointError::InvalidFormat(s.to_string()));
                }
                let digits: i64 = frac
                    .parse()
                    .map_err(|_| FixedPointError::InvalidFormat(s.to_string()))?;
                const POWERS: [i64; 9] = [
                    100_000_000,
                    10_000_000,
                    1_000_000,
                    100_000,
                    10_000,
                    1_000,
                    100,
                    10,
                    1,
                ];
                digits * POWERS[frac.len()]
            }
        };

        let magnitude = integer_part * SCALE + fractional_part;
        Ok(FixedPoint(if negative { -magnitude } else { magnitude }))
    }

    /// Lossy conversion for diagnostics and ratio computations
    pub fn to_f64(&self) -> f64 {
        self.0 as f64 / SCALE as f64
    }

    /// Whether the value is strictly below zero
    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }
}

impl fmt::Display for FixedPoint {
    /// Canonical fixed-width rendering with exactly 8 decimal places
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let abs = self.0.unsigned_abs();
        let integer_part = abs / SCALE as u64;
        let fractional_part = abs % SCALE as u64;
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{sign}{integer_part}.{fractional_part:08}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_renders_canonically() {
        let cases = [
            ("50000.12345678", 5_000_012_345_678, "50000.12345678"),
            ("1.5", 150_000_000, "1.50000000"),
            ("0", 0, "0.00000000"),
            ("42000", 4_200_000_000_000, "42000.00000000"),
            ("0.00000001", 1, "0.00000001"),
        ];
        for (input, raw, rendered) in cases {
            let fp = FixedPoint::parse(input).unwrap();
            assert_eq!(fp.0, raw, "raw value for {input}");
            assert_eq!(fp.to_string(), rendered, "rendering for {input}");
        }
    }

    #[test]
    fn negative_values_keep_their_sign() {
        assert_eq!(FixedPoint::parse("-0.5").unwrap().0, -50_000_000);
        assert_eq!(FixedPoint::parse("-0.5").unwrap().to_string(), "-0.50000000");
        assert_eq!(FixedPoint::parse("-12.25").unwrap().0, -1_225_000_000);
        assert!(FixedPoint::parse("-0.00000001").unwrap().is_negative());
    }

    #[test]
    fn rejects_malformed_input() {
        for bad in ["", " ", "abc", "1.2.3", "1.", ".5", "--1", "1,5"] {
            assert!(FixedPoint::parse(bad).is_err(), "{bad:?} should not parse");
        }
        assert_eq!(
            FixedPoint::parse("0.123456789"),
            Err(FixedPointError::TooManyDecimals("0.123456789".to_string())),
        );
    }

    #[test]
    fn rendering_is_stable_across_reparses() {
        let fp = FixedPoint::parse("42000.10000000").unwrap();
        let reparsed = FixedPoint::parse(&fp.to_string()).unwrap();
        assert_eq!(fp, reparsed);
        assert_eq!(fp.to_string(), reparsed.to_string());
    }
}
