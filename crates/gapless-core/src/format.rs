//! Wire format detection for bulk CSV payloads
//!
//! The CDN ships two incompatible shapes: spot files are 11 comma-separated
//! fields with no header row, futures files are 12 fields behind a header row
//! whose first cell is the literal `open_time` token. Timestamp precision is
//! orthogonal to the variant (the spot feed changed precision at a fixed
//! historical date while futures did not), so both are detected here once and
//! carried through the pipeline as data instead of re-sniffed per field.

use crate::timestamp::{detect_precision, TimestampError, TimestampPrecision};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Header token identifying a futures file
pub const FUTURES_HEADER_TOKEN: &str = "open_time";

/// Field count of an un-headered spot record
pub const SPOT_FIELD_COUNT: usize = 11;

/// Field count of a headered futures record (12th field is discarded)
pub const FUTURES_FIELD_COUNT: usize = 12;

/// Format detection errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormatError {
    /// Payload contains no lines at all
    #[error("empty payload, nothing to classify")]
    EmptyPayload,

    /// Futures header present but no data row follows
    #[error("header row without any data rows")]
    HeaderOnly,

    /// Record does not carry the field count its variant requires
    #[error("{variant:?} record has {found} fields, expected {expected}")]
    FieldCount {
        variant: WireVariant,
        expected: usize,
        found: usize,
    },

    /// First field is neither the header token nor a numeric timestamp
    #[error(transparent)]
    Timestamp(#[from] TimestampError),
}

/// The two known CSV shapes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireVariant {
    /// 11 fields, no header
    Spot,
    /// 12 fields, header row present
    Futures,
}

impl WireVariant {
    /// Required comma-separated field count for this variant
    pub fn field_count(&self) -> usize {
        match self {
            WireVariant::Spot => SPOT_FIELD_COUNT,
            WireVariant::Futures => FUTURES_FIELD_COUNT,
        }
    }

    /// Whether the payload carries a header row to skip
    pub fn has_header(&self) -> bool {
        matches!(self, WireVariant::Futures)
    }
}

/// Resolved wire format, carried explicitly through the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFormat {
    pub variant: WireVariant,
    pub precision: TimestampPrecision,
}

/// Classify a raw CSV payload by its leading records
///
/// The first line decides the variant (header token vs numeric timestamp);
/// precision is decided independently from the digit count of the first
/// data-row timestamp.
pub fn detect_format(payload: &str) -> Result<RecordFormat, FormatError> {
    let mut lines = payload.lines().filter(|line| !line.trim().is_empty());
    let first = lines.next().ok_or(FormatError::EmptyPayload)?;
    let first_fields: Vec<&str> = first.split(',').collect();

    let (variant, timestamp_field) = if first_fields[0].trim() == FUTURES_HEADER_TOKEN {
        let data = lines.next().ok_or(FormatError::HeaderOnly)?;
        check_field_count(WireVariant::Futures, first_fields.len())?;
        let data_fields: Vec<&str> = data.split(',').collect();
        check_field_count(WireVariant::Futures, data_fields.len())?;
        (WireVariant::Futures, data_fields[0].to_string())
    } else {
        check_field_count(WireVariant::Spot, first_fields.len())?;
        (WireVariant::Spot, first_fields[0].to_string())
    };

    let precision = detect_precision(&timestamp_field)?;
    Ok(RecordFormat { variant, precision })
}

fn check_field_count(variant: WireVariant, found: usize) -> Result<(), FormatError> {
    let expected = variant.field_count();
    if found != expected {
        return Err(FormatError::FieldCount {
            variant,
            expected,
            found,
        });
    }
    Ok(())
}
