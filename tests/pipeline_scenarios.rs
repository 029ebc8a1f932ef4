use chrono::{Duration, NaiveDate};
use climate_stripes::{
    build_daily_series, compute_anomalies, process, requested_span, resample, year_partitions,
    AnomalyRecord, BaselinePeriod, DailyRecord, Frequency, MissingBaseline, PipelineOptions,
    RawObservation, Variable,
};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn pair(date: NaiveDate, min: i32, max: i32) -> [RawObservation; 2] {
    [
        RawObservation::new(date, Variable::MinTemp, min),
        RawObservation::new(date, Variable::MaxTemp, max),
    ]
}

#[test]
fn three_full_years_make_three_partitions() {
    let span = requested_span(date(2001, 1, 1), date(2003, 12, 31)).unwrap();
    assert_eq!(year_partitions(span).len(), 3);
}

#[test]
fn two_year_baseline_scenario() {
    let observations: Vec<RawObservation> = [
        pair(date(2001, 1, 1), 0, 0),
        pair(date(2001, 1, 2), 20, 20),
        pair(date(2001, 1, 3), 40, 40),
        pair(date(2002, 1, 1), 20, 20),
        pair(date(2002, 1, 2), 40, 40),
        pair(date(2002, 1, 3), 60, 60),
    ]
    .concat();
    let (daily, report) = build_daily_series(&observations);
    assert_eq!(report.days, 6);

    let series =
        compute_anomalies(&daily, BaselinePeriod::FetchedRange, MissingBaseline::Fail).unwrap();
    assert_eq!(series.baseline.get(1), Some(1.0));
    assert_eq!(series.baseline.get(2), Some(3.0));
    assert_eq!(series.baseline.get(3), Some(5.0));
    let anomalies: Vec<f64> = series.anomalies.iter().map(|a| a.anomaly).collect();
    assert_eq!(anomalies, vec![-1.0, -1.0, -1.0, 1.0, 1.0, 1.0]);
}

#[test]
fn ten_day_buckets_of_twenty_five_records() {
    let records: Vec<AnomalyRecord> = (0..25)
        .map(|i| AnomalyRecord {
            date: date(2010, 12, 20) + Duration::days(i),
            mean_temp: 1.0,
            anomaly: 0.5,
        })
        .collect();
    let buckets = resample(&records, Frequency::NDays(10)).unwrap();
    let counts: Vec<usize> = buckets.iter().map(|b| b.count).collect();
    assert_eq!(counts, vec![10, 10, 5]);
    assert!(buckets.windows(2).all(|w| w[0].bucket_start < w[1].bucket_start));
}

#[test]
fn dates_missing_either_variable_are_absent() {
    let mut observations = pair(date(2001, 1, 1), -5, 5).to_vec();
    observations.push(RawObservation::new(date(2001, 1, 2), Variable::MinTemp, 1));
    observations.push(RawObservation::new(date(2001, 1, 3), Variable::MaxTemp, 1));
    let (daily, _) = build_daily_series(&observations);
    assert_eq!(daily, vec![DailyRecord::new(date(2001, 1, 1), -0.5, 0.5)]);
    assert!(daily.iter().all(|d| d.mean_temp == (d.min_temp + d.max_temp) / 2.0));
}

#[test]
fn full_pipeline_is_idempotent() {
    let mut observations = Vec::new();
    let mut day = date(1995, 3, 14);
    let mut i = 0;
    while day <= date(2004, 8, 1) {
        // Every 11th day lacks a maximum.
        let min = (i * 37 % 250) - 100;
        observations.push(RawObservation::new(day, Variable::MinTemp, min));
        if i % 11 != 0 {
            observations.push(RawObservation::new(day, Variable::MaxTemp, min + 80));
        }
        day += Duration::days(1);
        i += 1;
    }
    let options = PipelineOptions::default();
    for frequency in [
        Frequency::Yearly,
        Frequency::Monthly,
        Frequency::Weekly,
        Frequency::NDays(30),
    ] {
        let first = process("GHCND:X", &observations, frequency, &options).unwrap();
        let second = process("GHCND:X", &observations, frequency, &options).unwrap();
        assert_eq!(first, second);
        assert!(first.build.missing_max > 0);

        let total: usize = first.buckets.iter().map(|b| b.count).sum();
        assert_eq!(total, first.anomaly.anomalies);
    }
}
