use crate::pipeline::PipelineError;
use crate::types::records::{AnomalyRecord, DailyRecord};
use chrono::Datelike;
use log::debug;

const DAYS_OF_YEAR: usize = 366;

/// Which records contribute to the day-of-year baseline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BaselinePeriod {
    /// Every fetched record.
    #[default]
    FetchedRange,
    /// Only records dated within `first..=last` (calendar years). Anomalies are
    /// still computed for every record.
    Years { first: i32, last: i32 },
}

impl BaselinePeriod {
    fn includes(&self, record: &DailyRecord) -> bool {
        match self {
            BaselinePeriod::FetchedRange => true,
            BaselinePeriod::Years { first, last } => (*first..=*last).contains(&record.date.year()),
        }
    }
}

/// What to do with a record whose day of year has no baseline value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MissingBaseline {
    /// Leave the record out and count it.
    #[default]
    Skip,
    /// Abort with [`PipelineError::BaselineMissing`].
    Fail,
}

/// Mean of `mean_temp` for each day of year (1..=366).
#[derive(Debug, Clone, PartialEq)]
pub struct DayOfYearBaseline {
    means: [Option<f64>; DAYS_OF_YEAR],
}

impl DayOfYearBaseline {
    /// Aggregates the records selected by `period`.
    pub fn from_records(records: &[DailyRecord], period: BaselinePeriod) -> Self {
        let mut sums = [(0.0_f64, 0_u32); DAYS_OF_YEAR];
        for record in records.iter().filter(|r| period.includes(r)) {
            let slot = &mut sums[record.day_of_year() as usize - 1];
            slot.0 += record.mean_temp;
            slot.1 += 1;
        }
        let mut means = [None; DAYS_OF_YEAR];
        for (mean, (sum, count)) in means.iter_mut().zip(sums) {
            if count > 0 {
                *mean = Some(sum / f64::from(count));
            }
        }
        DayOfYearBaseline { means }
    }

    pub fn get(&self, day_of_year: u32) -> Option<f64> {
        let index = usize::try_from(day_of_year).ok()?.checked_sub(1)?;
        self.means.get(index).copied().flatten()
    }

    /// Number of days of year with a baseline value.
    pub fn len(&self) -> usize {
        self.means.iter().filter(|m| m.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnomalyReport {
    pub records: usize,
    pub anomalies: usize,
    /// Records left out because their day of year has no baseline.
    pub skipped_missing_baseline: usize,
    pub baseline_days: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnomalySeries {
    pub baseline: DayOfYearBaseline,
    pub anomalies: Vec<AnomalyRecord>,
    pub report: AnomalyReport,
}

/// Computes the baseline from the whole of `daily` first, then each record's
/// deviation from it.
pub fn compute_anomalies(
    daily: &[DailyRecord],
    period: BaselinePeriod,
    missing: MissingBaseline,
) -> Result<AnomalySeries, PipelineError> {
    let baseline = DayOfYearBaseline::from_records(daily, period);
    let mut report = AnomalyReport {
        records: daily.len(),
        baseline_days: baseline.len(),
        ..Default::default()
    };
    debug!("Baseline covers {} day(s) of year", report.baseline_days);

    let mut anomalies = Vec::with_capacity(daily.len());
    for record in daily {
        let day_of_year = record.day_of_year();
        match (baseline.get(day_of_year), missing) {
            (Some(reference), _) => anomalies.push(AnomalyRecord {
                date: record.date,
                mean_temp: record.mean_temp,
                anomaly: record.mean_temp - reference,
            }),
            (None, MissingBaseline::Skip) => report.skipped_missing_baseline += 1,
            (None, MissingBaseline::Fail) => {
                return Err(PipelineError::BaselineMissing {
                    date: record.date,
                    day_of_year,
                })
            }
        }
    }
    report.anomalies = anomalies.len();
    Ok(AnomalySeries {
        baseline,
        anomalies,
        report,
    })
}
