//! Defines the resampling cadence used to aggregate daily anomalies into
//! stripes.

use crate::types::period::{days_in_month, DateSpan};
use chrono::{Datelike, Duration, NaiveDate};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Largest accepted `NDays` window (exclusive).
pub const MAX_N_DAYS: u32 = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unsupported resampling frequency '{0}': expected Y, M, W or a day count between 1 and 999")]
pub struct UnsupportedFrequency(pub String);

/// The cadence at which daily data is aggregated into buckets.
///
/// Calendar cadences are aligned to calendar boundaries. `NDays` windows are
/// aligned to the first record of the series instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Frequency {
    /// One bucket per calendar year.
    Yearly,
    /// One bucket per calendar month.
    Monthly,
    /// One bucket per ISO week (Monday to Sunday).
    Weekly,
    /// Fixed windows of `n` days, `1 <= n < 1000`.
    NDays(u32),
}

impl Frequency {
    /// Checked constructor for `NDays`.
    pub fn n_days(n: u32) -> Result<Self, UnsupportedFrequency> {
        let frequency = Frequency::NDays(n);
        frequency.validate()?;
        Ok(frequency)
    }

    /// `NDays` can be built directly with any `n`; this rejects out-of-range windows.
    pub fn validate(&self) -> Result<(), UnsupportedFrequency> {
        match self {
            Frequency::NDays(n) if *n == 0 || *n >= MAX_N_DAYS => {
                Err(UnsupportedFrequency(n.to_string()))
            }
            _ => Ok(()),
        }
    }

    /// The period containing `date`. `origin` anchors `NDays` windows and is
    /// ignored by the calendar cadences; it must not be after `date`.
    pub(crate) fn period_of(&self, date: NaiveDate, origin: NaiveDate) -> Option<DateSpan> {
        match self {
            Frequency::Yearly => DateSpan::year(date.year()),
            Frequency::Monthly => {
                let last = days_in_month(date.year(), date.month())?;
                DateSpan::new(
                    NaiveDate::from_ymd_opt(date.year(), date.month(), 1)?,
                    NaiveDate::from_ymd_opt(date.year(), date.month(), last)?,
                )
            }
            Frequency::Weekly => {
                let monday =
                    date - Duration::days(i64::from(date.weekday().num_days_from_monday()));
                DateSpan::new(monday, monday + Duration::days(6))
            }
            Frequency::NDays(n) => {
                let n = i64::from(*n);
                let offset = (date - origin).num_days();
                if n == 0 || offset < 0 {
                    return None;
                }
                let start = origin + Duration::days(offset / n * n);
                DateSpan::new(start, start + Duration::days(n - 1))
            }
        }
    }
}

/// Accepts `Y`, `M`, `W` (case-insensitive), a plain day count such as `10`,
/// or a pandas-style `10D`.
impl FromStr for Frequency {
    type Err = UnsupportedFrequency;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.to_ascii_uppercase().as_str() {
            "Y" | "A" => Ok(Frequency::Yearly),
            "M" => Ok(Frequency::Monthly),
            "W" => Ok(Frequency::Weekly),
            other => {
                let digits = other.strip_suffix('D').unwrap_or(other);
                digits
                    .parse::<u32>()
                    .ok()
                    .and_then(|n| Frequency::n_days(n).ok())
                    .ok_or_else(|| UnsupportedFrequency(trimmed.to_string()))
            }
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frequency::Yearly => write!(f, "yearly"),
            Frequency::Monthly => write!(f, "monthly"),
            Frequency::Weekly => write!(f, "weekly"),
            Frequency::NDays(n) => write!(f, "{n}-day"),
        }
    }
}
