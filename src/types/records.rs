use chrono::{Datelike, NaiveDate};

/// Paired minimum and maximum temperature for one day, in °C.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DailyRecord {
    pub date: NaiveDate,
    pub min_temp: f64,
    pub max_temp: f64,
    /// `(min_temp + max_temp) / 2`
    pub mean_temp: f64,
}

impl DailyRecord {
    pub fn new(date: NaiveDate, min_temp: f64, max_temp: f64) -> Self {
        Self {
            date,
            min_temp,
            max_temp,
            mean_temp: (min_temp + max_temp) / 2.0,
        }
    }

    /// Day of year, 1..=366.
    pub fn day_of_year(&self) -> u32 {
        self.date.ordinal()
    }
}

/// A daily mean together with its deviation from the day-of-year baseline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnomalyRecord {
    pub date: NaiveDate,
    pub mean_temp: f64,
    pub anomaly: f64,
}

/// One resampled period.
///
/// `bucket_start..=bucket_end` is the calendar period the bucket covers; every
/// member record's date lies inside it. Only periods with at least one member
/// are emitted, so `count` is never zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bucket {
    pub bucket_start: NaiveDate,
    pub bucket_end: NaiveDate,
    pub count: usize,
    pub mean_temp: f64,
    pub anomaly: f64,
}

impl Bucket {
    /// Human readable label, `YYYY-MM-DD` of the period start.
    pub fn label(&self) -> String {
        self.bucket_start.format("%Y-%m-%d").to_string()
    }
}
