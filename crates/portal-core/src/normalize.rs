//! Identifier and date normalization.

use chrono::NaiveDate;
use polars::prelude::DataFrame;

use portal_ingest::frame_utils::{column_strings, string_column};
use portal_model::{MRN_WIDTH, Result};

/// Left-pad a medical-record number with zeros to `width`.
///
/// Empty input stays empty; values already at or beyond the width pass
/// through unchanged.
pub fn zero_pad(value: &str, width: usize) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    format!("{trimmed:0>width$}")
}

/// Replace a frame column with its zero-padded form (default width 8).
///
/// Returns a new frame; inputs are never mutated.
pub fn zero_pad_mrn(frame: &DataFrame, column: &str, width: Option<usize>) -> Result<DataFrame> {
    let width = width.unwrap_or(MRN_WIDTH);
    let padded: Vec<Option<String>> = column_strings(frame, column)?
        .iter()
        .map(|value| {
            let padded = zero_pad(value, width);
            if padded.is_empty() { None } else { Some(padded) }
        })
        .collect();
    let mut out = frame.clone();
    out.with_column(string_column(column, padded))
        .map_err(|error| portal_model::PortalError::storage(format!("pad {column}: {error}")))?;
    Ok(out)
}

/// Parse a calendar date from warehouse text, dropping any time component
/// and timezone. Failures are `None`, never errors.
///
/// Accepted shapes: `YYYY-MM-DD` (optionally followed by a time, `T` or
/// space separated, with or without an offset), `YYYY/MM/DD`, `MM/DD/YYYY`.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    // The date is always the leading ten characters in ISO-like shapes;
    // peeling it off drops time-of-day and timezone in one move.
    let head = trimmed.get(..10).unwrap_or(trimmed);
    if let Ok(date) = NaiveDate::parse_from_str(head, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(date) = NaiveDate::parse_from_str(head, "%Y/%m/%d") {
        return Some(date);
    }
    NaiveDate::parse_from_str(trimmed, "%m/%d/%Y").ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::Column;

    #[test]
    fn pads_to_eight_by_default() {
        assert_eq!(zero_pad("1234", 8), "00001234");
        assert_eq!(zero_pad(" 1234 ", 8), "00001234");
        assert_eq!(zero_pad("", 8), "");
        assert_eq!(zero_pad("123456789", 8), "123456789");
    }

    #[test]
    fn zero_pad_mrn_leaves_input_frame_untouched() {
        let frame = DataFrame::new(vec![Column::new("MRN".into(), ["42", ""])]).unwrap();
        let padded = zero_pad_mrn(&frame, "MRN", None).unwrap();
        let values = column_strings(&padded, "MRN").unwrap();
        assert_eq!(values, vec!["00000042".to_string(), String::new()]);
        let original = column_strings(&frame, "MRN").unwrap();
        assert_eq!(original, vec!["42".to_string(), String::new()]);
    }

    #[test]
    fn parses_iso_dates_and_drops_time() {
        let expected = NaiveDate::from_ymd_opt(2020, 1, 10).unwrap();
        assert_eq!(parse_date("2020-01-10"), Some(expected));
        assert_eq!(parse_date("2020-01-10T14:30:00"), Some(expected));
        assert_eq!(parse_date("2020-01-10T14:30:00.123Z"), Some(expected));
        assert_eq!(parse_date("2020-01-10 14:30:00-05:00"), Some(expected));
        assert_eq!(parse_date("2020/01/10"), Some(expected));
        assert_eq!(parse_date("01/10/2020"), Some(expected));
    }

    #[test]
    fn failures_are_none_not_errors() {
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("not-a-date"), None);
        assert_eq!(parse_date("2020-13-01"), None);
    }
}
