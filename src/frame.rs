//! Tabular view of a resampled series, for filtering and export.

use crate::error::StripesError;
use crate::pipeline::StripeSeries;
use crate::types::period::DateSpan;
use polars::prelude::*;
use std::fs::File;
use std::path::{Path, PathBuf};

/// File formats a [`BucketFrame`] can be written as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Parquet,
}

impl ExportFormat {
    /// Picks the format from the file extension, case-insensitively.
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("csv") => Some(ExportFormat::Csv),
            Some("parquet") => Some(ExportFormat::Parquet),
            _ => None,
        }
    }
}

/// A Polars `LazyFrame` over the buckets of a [`StripeSeries`].
///
/// Columns: `bucket_start` and `bucket_end` (Date), `label` (String),
/// `count` (UInt32), `mean_temp` and `anomaly` (Float64). One row per bucket,
/// in bucket order.
#[derive(Clone)]
pub struct BucketFrame {
    pub frame: LazyFrame,
}

impl BucketFrame {
    /// Wraps an existing `LazyFrame` that already has the bucket columns.
    pub fn new(frame: LazyFrame) -> Self {
        Self { frame }
    }

    /// Builds the frame from the buckets of `series`.
    ///
    /// # Errors
    ///
    /// Returns the `PolarsError` raised while assembling the columns.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use climate_stripes::{BucketFrame, StripeSeries};
    /// # fn run(series: &StripeSeries) -> Result<(), Box<dyn std::error::Error>> {
    /// let frame = BucketFrame::from_series(series)?;
    /// let df = frame.collect()?;
    /// println!("{df}");
    /// # Ok(())
    /// # }
    /// ```
    pub fn from_series(series: &StripeSeries) -> Result<Self, PolarsError> {
        let buckets = &series.buckets;
        let df = df!(
            "bucket_start" => buckets.iter().map(|b| b.bucket_start).collect::<Vec<_>>(),
            "bucket_end" => buckets.iter().map(|b| b.bucket_end).collect::<Vec<_>>(),
            "label" => series.labels(),
            "count" => buckets.iter().map(|b| b.count as u32).collect::<Vec<u32>>(),
            "mean_temp" => buckets.iter().map(|b| b.mean_temp).collect::<Vec<f64>>(),
            "anomaly" => buckets.iter().map(|b| b.anomaly).collect::<Vec<f64>>()
        )?;
        Ok(Self::new(df.lazy()))
    }

    /// Applies a Polars filter expression lazily.
    ///
    /// # Arguments
    ///
    /// * `predicate` - Any boolean expression over the bucket columns,
    ///   e.g. `col("anomaly").gt(lit(0.0))`.
    ///
    /// # Returns
    ///
    /// A new `BucketFrame`; nothing is evaluated until [`BucketFrame::collect`].
    pub fn filter(&self, predicate: Expr) -> BucketFrame {
        BucketFrame::new(self.frame.clone().filter(predicate))
    }

    /// Buckets starting within `span`.
    pub fn get_range(&self, span: DateSpan) -> BucketFrame {
        self.filter(
            col("bucket_start")
                .gt_eq(lit(span.start))
                .and(col("bucket_start").lt_eq(lit(span.end))),
        )
    }

    /// Evaluates the lazy query into a `DataFrame`.
    ///
    /// # Errors
    ///
    /// Returns the `PolarsError` raised by the query plan.
    pub fn collect(&self) -> Result<DataFrame, PolarsError> {
        self.frame.clone().collect()
    }

    /// Writes the frame to `path` as CSV or Parquet, by file extension.
    ///
    /// # Errors
    ///
    /// [`StripesError::UnsupportedExportFormat`] for other extensions, and
    /// the errors of [`BucketFrame::write_as`].
    pub fn write(&self, path: &Path) -> Result<(), StripesError> {
        let format = ExportFormat::from_path(path)
            .ok_or_else(|| StripesError::UnsupportedExportFormat(path.to_path_buf()))?;
        self.write_as(path, format)
    }

    /// Writes the frame to `path` in `format`, whatever the extension.
    ///
    /// CSV files carry a header row. Parquet files are Snappy-compressed.
    ///
    /// # Errors
    ///
    /// [`StripesError::ExportIo`] when the file cannot be created and
    /// [`StripesError::Export`] when Polars fails to evaluate or encode.
    pub fn write_as(&self, path: &Path, format: ExportFormat) -> Result<(), StripesError> {
        let mut df = self
            .collect()
            .map_err(|e| StripesError::Export(path.to_path_buf(), e))?;
        let path_buf: PathBuf = path.to_path_buf();
        let file =
            File::create(&path_buf).map_err(|e| StripesError::ExportIo(path_buf.clone(), e))?;
        match format {
            ExportFormat::Csv => CsvWriter::new(file)
                .include_header(true)
                .finish(&mut df)
                .map_err(|e| StripesError::Export(path_buf, e))?,
            ExportFormat::Parquet => {
                ParquetWriter::new(file)
                    .with_compression(ParquetCompression::Snappy)
                    .finish(&mut df)
                    .map_err(|e| StripesError::Export(path_buf, e))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::anomaly::AnomalyReport;
    use crate::pipeline::daily::BuildReport;
    use crate::types::frequency::Frequency;
    use crate::types::records::Bucket;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn series() -> StripeSeries {
        let buckets = (1..=3)
            .map(|month| Bucket {
                bucket_start: date(2001, month, 1),
                bucket_end: date(2001, month, 28),
                count: 28,
                mean_temp: f64::from(month),
                anomaly: f64::from(month) - 2.0,
            })
            .collect();
        StripeSeries {
            station: "GHCND:X".to_string(),
            frequency: Frequency::Monthly,
            buckets,
            build: BuildReport::default(),
            anomaly: AnomalyReport::default(),
        }
    }

    #[test]
    fn frame_has_one_row_per_bucket() -> Result<(), Box<dyn std::error::Error>> {
        let df = BucketFrame::from_series(&series())?.collect()?;
        assert_eq!(df.height(), 3);
        assert_eq!(df.column("bucket_start")?.dtype(), &DataType::Date);
        assert_eq!(df.column("label")?.str()?.get(1), Some("2001-02-01"));
        assert_eq!(df.column("anomaly")?.f64()?.get(2), Some(1.0));
        assert_eq!(df.column("count")?.u32()?.get(0), Some(28));
        Ok(())
    }

    #[test]
    fn get_range_filters_on_bucket_start() -> Result<(), Box<dyn std::error::Error>> {
        let frame = BucketFrame::from_series(&series())?;
        let span = DateSpan::new(date(2001, 2, 1), date(2001, 12, 31)).unwrap();
        let df = frame.get_range(span).collect()?;
        assert_eq!(df.height(), 2);
        Ok(())
    }

    #[test]
    fn writes_csv_and_parquet() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let frame = BucketFrame::from_series(&series())?;

        let csv = dir.path().join("stripes.csv");
        frame.write(&csv)?;
        let text = std::fs::read_to_string(&csv)?;
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("bucket_start,bucket_end,label,count,mean_temp,anomaly")
        );
        assert_eq!(text.lines().count(), 4);

        let parquet = dir.path().join("stripes.parquet");
        frame.write(&parquet)?;
        let df = ParquetReader::new(File::open(&parquet)?).finish()?;
        assert_eq!(df.height(), 3);
        Ok(())
    }

    #[test]
    fn rejects_unknown_extension() {
        let frame = BucketFrame::from_series(&series()).unwrap();
        let err = frame.write(Path::new("stripes.xlsx")).unwrap_err();
        assert!(matches!(err, StripesError::UnsupportedExportFormat(_)));
    }

    #[test]
    fn write_as_uses_given_format() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("buckets.dat");
        BucketFrame::from_series(&series())?.write_as(&path, ExportFormat::Csv)?;
        let text = std::fs::read_to_string(&path)?;
        assert!(text.starts_with("bucket_start,"));
        Ok(())
    }
}
