//! The CPU side of a run: raw readings to daily records, daily records to
//! anomalies, anomalies to buckets.

pub mod anomaly;
pub mod daily;
pub mod resample;

use crate::types::frequency::{Frequency, UnsupportedFrequency};
use crate::types::observation::RawObservation;
use crate::types::records::Bucket;
use anomaly::{compute_anomalies, AnomalyReport, BaselinePeriod, MissingBaseline};
use chrono::NaiveDate;
use daily::{build_daily_series, BuildReport};
use log::{info, warn};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("No baseline value for day of year {day_of_year} (record dated {date})")]
    BaselineMissing { date: NaiveDate, day_of_year: u32 },

    #[error(transparent)]
    UnsupportedFrequency(#[from] UnsupportedFrequency),

    #[error("No usable data left after {stage}")]
    NoUsableData { stage: &'static str },

    #[error("Date {date} cannot be assigned to a resampling period")]
    PeriodOutOfRange { date: NaiveDate },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineOptions {
    pub baseline: BaselinePeriod,
    pub missing_baseline: MissingBaseline,
}

/// The finished, immutable input of the renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct StripeSeries {
    pub station: String,
    pub frequency: Frequency,
    pub buckets: Vec<Bucket>,
    pub build: BuildReport,
    pub anomaly: AnomalyReport,
}

impl StripeSeries {
    /// One label per bucket, in bucket order.
    pub fn labels(&self) -> Vec<String> {
        self.buckets.iter().map(Bucket::label).collect()
    }

    /// Smallest and largest bucket anomaly, `None` without buckets.
    pub fn anomaly_range(&self) -> Option<(f64, f64)> {
        self.buckets.iter().map(|b| b.anomaly).fold(None, |range, a| {
            Some(match range {
                None => (a, a),
                Some((lo, hi)) => (lo.min(a), hi.max(a)),
            })
        })
    }
}

/// Runs builder, anomaly engine and resampler over one station's readings.
///
/// The frequency is checked before any work. A run that ends with no buckets
/// is an error rather than an empty picture.
pub fn process(
    station: &str,
    observations: &[RawObservation],
    frequency: Frequency,
    options: &PipelineOptions,
) -> Result<StripeSeries, PipelineError> {
    frequency.validate()?;

    let (daily, build) = build_daily_series(observations);
    info!(
        "Built {} daily record(s) from {} reading(s); dropped {} missing min, {} missing max, {} conflicting",
        build.days, build.input_observations, build.missing_min, build.missing_max, build.conflicting
    );
    if build.dropped_days() > build.days {
        warn!(
            "More than half of the dates for station {} were dropped ({} of {})",
            station,
            build.dropped_days(),
            build.dropped_days() + build.days
        );
    }
    if daily.is_empty() {
        return Err(PipelineError::NoUsableData {
            stage: "pairing daily minimum and maximum",
        });
    }

    let anomalies = compute_anomalies(&daily, options.baseline, options.missing_baseline)?;
    let report = anomalies.report;
    if report.skipped_missing_baseline > 0 {
        warn!(
            "Skipped {} record(s) without a baseline value",
            report.skipped_missing_baseline
        );
    }
    if report.skipped_missing_baseline > report.anomalies {
        warn!(
            "More than half of the daily records for station {} had no baseline ({} of {})",
            station, report.skipped_missing_baseline, report.records
        );
    }
    if anomalies.anomalies.is_empty() {
        return Err(PipelineError::NoUsableData {
            stage: "computing anomalies",
        });
    }

    let buckets = resample::resample(&anomalies.anomalies, frequency)?;
    info!(
        "Resampled {} anomaly record(s) into {} {} bucket(s)",
        report.anomalies,
        buckets.len(),
        frequency
    );

    Ok(StripeSeries {
        station: station.to_string(),
        frequency,
        buckets,
        build,
        anomaly: report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::observation::Variable;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn day(date: NaiveDate, min: i32, max: i32) -> [RawObservation; 2] {
        [
            RawObservation::new(date, Variable::MinTemp, min),
            RawObservation::new(date, Variable::MaxTemp, max),
        ]
    }

    #[test]
    fn yearly_stripes_for_two_years() {
        let observations: Vec<RawObservation> = [
            day(date(2001, 1, 1), -10, 10),
            day(date(2001, 1, 2), 10, 30),
            day(date(2002, 1, 1), 10, 30),
            day(date(2002, 1, 2), 30, 50),
        ]
        .concat();
        let series = process(
            "GHCND:X",
            &observations,
            Frequency::Yearly,
            &PipelineOptions::default(),
        )
        .unwrap();
        assert_eq!(series.labels(), vec!["2001-01-01", "2002-01-01"]);
        assert_eq!(series.buckets[0].anomaly, -1.0);
        assert_eq!(series.buckets[1].anomaly, 1.0);
        assert_eq!(series.buckets[0].mean_temp, 1.0);
        assert_eq!(series.anomaly_range(), Some((-1.0, 1.0)));
    }

    #[test]
    fn rejects_bad_frequency_before_processing() {
        let err = process("GHCND:X", &[], Frequency::NDays(0), &PipelineOptions::default())
            .unwrap_err();
        assert!(matches!(err, PipelineError::UnsupportedFrequency(_)));
    }

    #[test]
    fn unpaired_input_has_no_usable_data() {
        let observations = vec![RawObservation::new(date(2001, 1, 1), Variable::MinTemp, 0)];
        let err = process(
            "GHCND:X",
            &observations,
            Frequency::Monthly,
            &PipelineOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::NoUsableData { .. }));
    }
}
