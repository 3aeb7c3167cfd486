//! Timestamp normalization
//!
//! Stores report dates either as epoch seconds or as preformatted text.
//! Plausible epoch values become `YYYY-MM-DD` (UTC); everything else
//! passes through untouched.

use chrono::DateTime;

use crate::model::DATE_FORMAT;
use crate::traits::DateValue;

/// Epoch values at or below this are not treated as timestamps
/// (1_000_000_000 is September 2001)
pub const EPOCH_SANITY_THRESHOLD: i64 = 1_000_000_000;

/// Normalize a store date value
///
/// Never fails: an epoch value that chrono cannot represent is returned
/// unchanged like any other non-timestamp value.
pub fn normalize(value: &DateValue) -> DateValue {
    match value {
        DateValue::Epoch(secs) if *secs > EPOCH_SANITY_THRESHOLD => {
            match DateTime::from_timestamp(*secs, 0) {
                Some(utc) => DateValue::Text(utc.format(DATE_FORMAT).to_string()),
                None => value.clone(),
            }
        }
        _ => value.clone(),
    }
}

/// Normalize an optional value, keeping absence as absence
pub fn normalize_opt(value: Option<&DateValue>) -> Option<DateValue> {
    value.map(normalize)
}
