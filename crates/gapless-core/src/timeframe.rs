//! Canonical timeframe registry
//!
//! Single source of truth for the label → interval mapping. Every supported
//! label maps through an explicit literal table; durations are never derived
//! by parsing the numeric prefix of a label and dropping the unit suffix.
//! A registry that read `"2h"` as "2 minutes" would corrupt every downstream
//! gap calculation, which is why the table is closed and tested exhaustively.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Timeframe registry errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimeframeError {
    /// Label is not one of the 13 supported timeframes
    #[error("unsupported timeframe label: {0:?}")]
    UnsupportedLabel(String),
}

/// Supported candle timeframes
///
/// Closed set: the 13 intervals the upstream distribution publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1s")]
    S1,
    #[serde(rename = "1m")]
    M1,
    #[serde(rename = "3m")]
    M3,
    #[serde(rename = "5m")]
    M5,
    #[serde(rename = "15m")]
    M15,
    #[serde(rename = "30m")]
    M30,
    #[serde(rename = "1h")]
    H1,
    #[serde(rename = "2h")]
    H2,
    #[serde(rename = "4h")]
    H4,
    #[serde(rename = "6h")]
    H6,
    #[serde(rename = "8h")]
    H8,
    #[serde(rename = "12h")]
    H12,
    #[serde(rename = "1d")]
    D1,
}

impl Timeframe {
    /// Every supported timeframe, in ascending interval order
    pub const ALL: [Timeframe; 13] = [
        Timeframe::S1,
        Timeframe::M1,
        Timeframe::M3,
        Timeframe::M5,
        Timeframe::M15,
        Timeframe::M30,
        Timeframe::H1,
        Timeframe::H2,
        Timeframe::H4,
        Timeframe::H6,
        Timeframe::H8,
        Timeframe::H12,
        Timeframe::D1,
    ];

    /// Candle interval in microseconds
    ///
    /// Explicit literal table, total over the enum.
    pub fn interval_us(&self) -> i64 {
        match self {
            Timeframe::S1 => 1_000_000,
            Timeframe::M1 => 60_000_000,
            Timeframe::M3 => 180_000_000,
            Timeframe::M5 => 300_000_000,
            Timeframe::M15 => 900_000_000,
            Timeframe::M30 => 1_800_000_000,
            Timeframe::H1 => 3_600_000_000,
            Timeframe::H2 => 7_200_000_000,
            Timeframe::H4 => 14_400_000_000,
            Timeframe::H6 => 21_600_000_000,
            Timeframe::H8 => 28_800_000_000,
            Timeframe::H12 => 43_200_000_000,
            Timeframe::D1 => 86_400_000_000,
        }
    }

    /// Wire label as used in CDN file names and REST requests
    pub fn label(&self) -> &'static str {
        match self {
            Timeframe::S1 => "1s",
            Timeframe::M1 => "1m",
            Timeframe::M3 => "3m",
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::M30 => "30m",
            Timeframe::H1 => "1h",
            Timeframe::H2 => "2h",
            Timeframe::H4 => "4h",
            Timeframe::H6 => "6h",
            Timeframe::H8 => "8h",
            Timeframe::H12 => "12h",
            Timeframe::D1 => "1d",
        }
    }
}

impl FromStr for Timeframe {
    type Err = TimeframeError;

    fn from_str(label: &str) -> Result<Self, Self::Err> {
        match label {
            "1s" => Ok(Timeframe::S1),
            "1m" => Ok(Timeframe::M1),
            "3m" => Ok(Timeframe::M3),
            "5m" => Ok(Timeframe::M5),
            "15m" => Ok(Timeframe::M15),
            "30m" => Ok(Timeframe::M30),
            "1h" => Ok(Timeframe::H1),
            "2h" => Ok(Timeframe::H2),
            "4h" => Ok(Timeframe::H4),
            "6h" => Ok(Timeframe::H6),
            "8h" => Ok(Timeframe::H8),
            "12h" => Ok(Timeframe::H12),
            "1d" => Ok(Timeframe::D1),
            other => Err(TimeframeError::UnsupportedLabel(other.to_string())),
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
