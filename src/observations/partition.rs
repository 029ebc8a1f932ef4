//! Splits a requested date range into per-request partitions.
//!
//! The CDO API caps a single response at 1000 items and a single request at
//! one year of daily data, so every request covers at most one calendar
//! year: the first partition runs from `begin` to Dec 31, each intervening
//! year is requested whole, and the last partition runs from Jan 1 to `end`.

use crate::observations::error::FetchError;
use crate::types::period::DateSpan;
use chrono::{Datelike, NaiveDate};

/// Validates `begin <= end` and returns the requested span.
pub fn requested_span(begin: NaiveDate, end: NaiveDate) -> Result<DateSpan, FetchError> {
    DateSpan::new(begin, end).ok_or(FetchError::InvalidRange { begin, end })
}

/// Calendar-year partitions of `span`, clipped to it, in chronological order.
///
/// The partitions are contiguous, do not overlap, and their union is `span`.
pub fn year_partitions(span: DateSpan) -> Vec<DateSpan> {
    (span.start.year()..=span.end.year())
        .filter_map(|year| DateSpan::year(year)?.clip(&span))
        .collect()
}
