use crate::pipeline::PipelineError;
use crate::types::frequency::Frequency;
use crate::types::records::{AnomalyRecord, Bucket};
use chrono::NaiveDate;
use std::collections::BTreeMap;

#[derive(Debug, Default)]
struct Accumulator {
    end: NaiveDate,
    count: usize,
    mean_temp: f64,
    anomaly: f64,
}

/// Aggregates `anomalies` into one bucket per period of `frequency`.
///
/// Buckets are ordered by start date and only periods with members are
/// emitted. `NDays` windows start at the earliest record.
pub fn resample(
    anomalies: &[AnomalyRecord],
    frequency: Frequency,
) -> Result<Vec<Bucket>, PipelineError> {
    frequency.validate()?;
    let Some(origin) = anomalies.iter().map(|a| a.date).min() else {
        return Ok(Vec::new());
    };

    let mut periods: BTreeMap<NaiveDate, Accumulator> = BTreeMap::new();
    for record in anomalies {
        let period = frequency
            .period_of(record.date, origin)
            .ok_or(PipelineError::PeriodOutOfRange { date: record.date })?;
        let accumulator = periods.entry(period.start).or_insert_with(|| Accumulator {
            end: period.end,
            ..Default::default()
        });
        accumulator.count += 1;
        accumulator.mean_temp += record.mean_temp;
        accumulator.anomaly += record.anomaly;
    }

    Ok(periods
        .into_iter()
        .map(|(start, acc)| {
            let count = acc.count as f64;
            Bucket {
                bucket_start: start,
                bucket_end: acc.end,
                count: acc.count,
                mean_temp: acc.mean_temp / count,
                anomaly: acc.anomaly / count,
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn consecutive(start: NaiveDate, days: i64) -> Vec<AnomalyRecord> {
        (0..days)
            .map(|i| AnomalyRecord {
                date: start + Duration::days(i),
                mean_temp: i as f64,
                anomaly: (i % 5) as f64 - 2.0,
            })
            .collect()
    }

    fn assert_members_inside(records: &[AnomalyRecord], buckets: &[Bucket]) {
        let mut total = 0;
        for bucket in buckets {
            let members: Vec<&AnomalyRecord> = records
                .iter()
                .filter(|r| r.date >= bucket.bucket_start && r.date <= bucket.bucket_end)
                .collect();
            assert_eq!(members.len(), bucket.count);
            let sum: f64 = members.iter().map(|m| m.mean_temp).sum();
            assert!((sum - bucket.count as f64 * bucket.mean_temp).abs() < 1e-9);
            let sum: f64 = members.iter().map(|m| m.anomaly).sum();
            assert!((sum - bucket.count as f64 * bucket.anomaly).abs() < 1e-9);
            total += members.len();
        }
        assert_eq!(total, records.len());
        for pair in buckets.windows(2) {
            assert!(pair[0].bucket_end < pair[1].bucket_start);
        }
    }

    #[test]
    fn n_days_windows_start_at_first_record() {
        let records = consecutive(date(2001, 3, 7), 25);
        let buckets = resample(&records, Frequency::NDays(10)).unwrap();
        let counts: Vec<usize> = buckets.iter().map(|b| b.count).collect();
        assert_eq!(counts, vec![10, 10, 5]);
        assert_eq!(buckets[0].bucket_start, date(2001, 3, 7));
        assert_eq!(buckets[1].bucket_start, date(2001, 3, 17));
        assert_eq!(buckets[0].mean_temp, 4.5);
        assert_members_inside(&records, &buckets);
    }

    #[test]
    fn calendar_cadences_align_to_boundaries() {
        let records = consecutive(date(2000, 12, 20), 400);

        let yearly = resample(&records, Frequency::Yearly).unwrap();
        assert_eq!(yearly.len(), 3);
        assert_eq!(yearly[1].bucket_start, date(2001, 1, 1));
        assert_eq!(yearly[1].count, 365);
        assert_members_inside(&records, &yearly);

        let monthly = resample(&records, Frequency::Monthly).unwrap();
        assert_eq!(monthly[0].bucket_start, date(2000, 12, 1));
        assert_eq!(monthly[0].count, 12);
        assert_eq!(monthly[2].bucket_end, date(2001, 2, 28));
        assert_members_inside(&records, &monthly);

        let weekly = resample(&records, Frequency::Weekly).unwrap();
        // 2000-12-20 is a Wednesday.
        assert_eq!(weekly[0].bucket_start, date(2000, 12, 18));
        assert_eq!(weekly[0].count, 5);
        assert_members_inside(&records, &weekly);
    }

    #[test]
    fn empty_periods_are_omitted() {
        let mut records = consecutive(date(2001, 1, 1), 3);
        records.extend(consecutive(date(2001, 6, 1), 3));
        let buckets = resample(&records, Frequency::Monthly).unwrap();
        let starts: Vec<NaiveDate> = buckets.iter().map(|b| b.bucket_start).collect();
        assert_eq!(starts, vec![date(2001, 1, 1), date(2001, 6, 1)]);
    }

    #[test]
    fn rejects_unsupported_windows() {
        let records = consecutive(date(2001, 1, 1), 3);
        for n in [0, 1000] {
            let err = resample(&records, Frequency::NDays(n)).unwrap_err();
            assert!(matches!(err, PipelineError::UnsupportedFrequency(_)));
        }
        assert!(resample(&[], Frequency::NDays(999)).unwrap().is_empty());
    }

    #[test]
    fn resampling_is_deterministic() {
        let records = consecutive(date(1999, 5, 5), 800);
        let first = resample(&records, Frequency::NDays(7)).unwrap();
        let second = resample(&records, Frequency::NDays(7)).unwrap();
        assert_eq!(first, second);
    }
}
