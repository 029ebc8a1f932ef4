use crate::types::observation::{RawObservation, Variable};
use crate::types::records::DailyRecord;
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// What the Daily Series Builder kept and dropped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub input_observations: usize,
    pub days: usize,
    /// Dates with a maximum but no minimum reading.
    pub missing_min: usize,
    /// Dates with a minimum but no maximum reading.
    pub missing_max: usize,
    /// Dates with differing readings for the same variable.
    pub conflicting: usize,
}

impl BuildReport {
    pub fn dropped_days(&self) -> usize {
        self.missing_min + self.missing_max + self.conflicting
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum Reading {
    #[default]
    Absent,
    Value(i32),
    Conflict,
}

impl Reading {
    fn add(&mut self, tenths: i32) {
        *self = match *self {
            Reading::Absent => Reading::Value(tenths),
            Reading::Value(existing) if existing == tenths => Reading::Value(existing),
            _ => Reading::Conflict,
        };
    }
}

/// Pairs minimum and maximum readings into one record per date.
///
/// A date is kept only with exactly one distinct value for each variable.
/// Repeated identical readings count once; differing ones drop the date. The
/// output is sorted by date and contains no duplicates.
pub fn build_daily_series(observations: &[RawObservation]) -> (Vec<DailyRecord>, BuildReport) {
    let mut by_date: BTreeMap<NaiveDate, (Reading, Reading)> = BTreeMap::new();
    for observation in observations {
        let (min, max) = by_date.entry(observation.date).or_default();
        match observation.variable {
            Variable::MinTemp => min.add(observation.tenths),
            Variable::MaxTemp => max.add(observation.tenths),
        }
    }

    let mut report = BuildReport {
        input_observations: observations.len(),
        ..Default::default()
    };
    let mut records = Vec::with_capacity(by_date.len());
    for (date, readings) in by_date {
        match readings {
            (Reading::Value(min), Reading::Value(max)) => records.push(DailyRecord::new(
                date,
                f64::from(min) / 10.0,
                f64::from(max) / 10.0,
            )),
            (Reading::Conflict, _) | (_, Reading::Conflict) => report.conflicting += 1,
            (Reading::Absent, _) => report.missing_min += 1,
            (_, Reading::Absent) => report.missing_max += 1,
        }
    }
    report.days = records.len();
    (records, report)
}
