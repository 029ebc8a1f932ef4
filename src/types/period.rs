use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::{Display, Formatter};

/// An inclusive range of calendar days.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct DateSpan {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateSpan {
    /// Creates a span, returning `None` when `start` is after `end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    /// The full calendar year `year`.
    pub fn year(year: i32) -> Option<Self> {
        Some(Self {
            start: NaiveDate::from_ymd_opt(year, 1, 1)?,
            end: NaiveDate::from_ymd_opt(year, 12, 31)?,
        })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Number of days covered, both ends included.
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    /// Clips this span to `bounds`, `None` when they do not overlap.
    pub fn clip(&self, bounds: &DateSpan) -> Option<DateSpan> {
        DateSpan::new(self.start.max(bounds.start), self.end.min(bounds.end))
    }
}

impl Display for DateSpan {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

pub(crate) fn days_in_month(year: i32, month: u32) -> Option<u32> {
    if !(1..=12).contains(&month) {
        return None;
    }
    let (next_month_year, next_month) = if month == 12 {
        (year.checked_add(1)?, 1)
    } else {
        (year, month + 1)
    };
    let first_day_of_next_month = NaiveDate::from_ymd_opt(next_month_year, next_month, 1)?;
    let last_day_of_current_month = first_day_of_next_month - Duration::days(1);
    Some(last_day_of_current_month.day())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn rejects_reversed_span() {
        assert!(DateSpan::new(date(2001, 1, 2), date(2001, 1, 1)).is_none());
        assert!(DateSpan::new(date(2001, 1, 1), date(2001, 1, 1)).is_some());
    }

    #[test]
    fn counts_days_inclusively() {
        let span = DateSpan::new(date(2020, 1, 1), date(2020, 12, 31)).unwrap();
        assert_eq!(span.days(), 366);
        assert_eq!(DateSpan::year(2021).unwrap().days(), 365);
    }

    #[test]
    fn clips_to_bounds() {
        let bounds = DateSpan::new(date(2001, 3, 15), date(2003, 7, 3)).unwrap();
        let clipped = DateSpan::year(2001).unwrap().clip(&bounds).unwrap();
        assert_eq!(clipped.start, date(2001, 3, 15));
        assert_eq!(clipped.end, date(2001, 12, 31));
        assert!(DateSpan::year(1999).unwrap().clip(&bounds).is_none());
    }

    #[test]
    fn month_lengths() {
        assert_eq!(days_in_month(2020, 2), Some(29));
        assert_eq!(days_in_month(2021, 2), Some(28));
        assert_eq!(days_in_month(2021, 12), Some(31));
        assert_eq!(days_in_month(2021, 13), None);
    }
}
