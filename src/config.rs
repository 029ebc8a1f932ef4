//! Boundary configuration: raw user input in, validated run plan out.
//!
//! Everything that can be rejected without touching the network is rejected
//! here.

use crate::frame::ExportFormat;
use crate::observations::fetcher::FetchOptions;
use crate::observations::noaa_client::DEFAULT_BASE_URL;
use crate::pipeline::anomaly::{BaselinePeriod, MissingBaseline};
use crate::pipeline::PipelineOptions;
use crate::render::{OutputFormat, StripeStyle};
use crate::types::frequency::{Frequency, UnsupportedFrequency};
use crate::types::period::DateSpan;
use crate::utils::get_cache_dir;
use chrono::{Datelike, NaiveDate};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

const DATE_FORMAT: &str = "%Y-%m-%d";
const MAX_PAGE_LIMIT: usize = 1000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Station id must not be empty")]
    EmptyStation,

    #[error("An access token is required (pass --token or set NOAA_TOKEN)")]
    MissingToken,

    #[error("Invalid date '{value}': expected YYYY-MM-DD")]
    InvalidDate {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("Invalid date range: begin {begin} is after end {end}")]
    InvalidRange { begin: NaiveDate, end: NaiveDate },

    #[error(transparent)]
    Frequency(#[from] UnsupportedFrequency),

    #[error("Unsupported output format for '{0}': expected a .png or .svg file")]
    UnsupportedOutputFormat(PathBuf),

    #[error("Unsupported export format for '{0}': expected a .csv or .parquet file")]
    UnsupportedExportFormat(PathBuf),

    #[error("Invalid baseline period: first year {first} is after last year {last}")]
    InvalidBaselinePeriod { first: i32, last: i32 },

    #[error("Baseline period {first}..={last} does not overlap the requested range {range}")]
    BaselineOutsideRange {
        first: i32,
        last: i32,
        range: DateSpan,
    },

    #[error("Page limit must be between 1 and 1000, got {0}")]
    InvalidPageLimit(usize),

    #[error("At least one request attempt is required")]
    NoAttempts,

    #[error("Failed to determine cache directory")]
    CacheDirResolution,
}

/// Raw run configuration as it arrives from the command line or a caller.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub station: String,
    /// `YYYY-MM-DD`
    pub begin: String,
    /// `YYYY-MM-DD`
    pub end: String,
    pub token: Option<String>,
    /// `Y`, `M`, `W` or a day count.
    pub frequency: String,
    pub output: PathBuf,
    pub line_plot: bool,
    /// Title, date ticks and colorbar around the stripes.
    pub annotate: bool,
    pub export: Option<PathBuf>,
    pub baseline_start: Option<i32>,
    pub baseline_end: Option<i32>,
    pub missing_baseline: MissingBaseline,
    pub fetch: FetchOptions,
    /// Enable the partition cache in the default location.
    pub cache: bool,
    /// Enable the partition cache in this directory.
    pub cache_dir: Option<PathBuf>,
    pub time_budget: Option<Duration>,
    pub base_url: Option<String>,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            station: String::new(),
            begin: String::new(),
            end: String::new(),
            token: None,
            frequency: "Y".to_string(),
            output: PathBuf::from("stripes.png"),
            line_plot: true,
            annotate: true,
            export: None,
            baseline_start: None,
            baseline_end: None,
            missing_baseline: MissingBaseline::default(),
            fetch: FetchOptions::default(),
            cache: false,
            cache_dir: None,
            time_budget: None,
            base_url: None,
        }
    }
}

/// A validated run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunPlan {
    pub station: String,
    pub span: DateSpan,
    pub token: String,
    pub frequency: Frequency,
    pub output: PathBuf,
    pub format: OutputFormat,
    pub style: StripeStyle,
    pub export: Option<(PathBuf, ExportFormat)>,
    pub pipeline: PipelineOptions,
    pub fetch: FetchOptions,
    pub cache_dir: Option<PathBuf>,
    pub time_budget: Option<Duration>,
    pub base_url: String,
}

fn parse_date(value: &str) -> Result<NaiveDate, ConfigError> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|source| {
        ConfigError::InvalidDate {
            value: value.to_string(),
            source,
        }
    })
}

impl RunConfig {
    /// Checks every field and resolves defaults into a [`RunPlan`].
    ///
    /// Nothing here touches the network. The cache directory is only resolved,
    /// not created.
    ///
    /// # Returns
    ///
    /// A plan with parsed dates, a validated frequency, output and export
    /// formats taken from the file extensions and a concrete baseline period.
    ///
    /// # Errors
    ///
    /// The first [`ConfigError`] found, checked in this order: station, token,
    /// dates and range, frequency, output format, export format, baseline
    /// period, page limit, attempts, cache directory.
    ///
    /// # Examples
    ///
    /// ```
    /// use climate_stripes::{Frequency, RunConfig};
    ///
    /// let plan = RunConfig {
    ///     station: "GHCND:USC00484910".to_string(),
    ///     begin: "1990-01-01".to_string(),
    ///     end: "2019-12-31".to_string(),
    ///     token: Some("my-token".to_string()),
    ///     frequency: "10".to_string(),
    ///     ..RunConfig::default()
    /// }
    /// .validate()
    /// .unwrap();
    /// assert_eq!(plan.frequency, Frequency::NDays(10));
    /// ```
    pub fn validate(&self) -> Result<RunPlan, ConfigError> {
        let station = self.station.trim();
        if station.is_empty() {
            return Err(ConfigError::EmptyStation);
        }
        let token = self
            .token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(ConfigError::MissingToken)?;

        let begin = parse_date(&self.begin)?;
        let end = parse_date(&self.end)?;
        let span = DateSpan::new(begin, end).ok_or(ConfigError::InvalidRange { begin, end })?;

        let frequency: Frequency = self.frequency.parse()?;

        let format = OutputFormat::from_path(&self.output)
            .map_err(|_| ConfigError::UnsupportedOutputFormat(self.output.clone()))?;
        let export = self
            .export
            .as_ref()
            .map(|path| {
                ExportFormat::from_path(path)
                    .map(|format| (path.clone(), format))
                    .ok_or_else(|| ConfigError::UnsupportedExportFormat(path.clone()))
            })
            .transpose()?;

        let baseline = self.baseline_period(span)?;

        if self.fetch.page_limit == 0 || self.fetch.page_limit > MAX_PAGE_LIMIT {
            return Err(ConfigError::InvalidPageLimit(self.fetch.page_limit));
        }
        if self.fetch.max_attempts == 0 {
            return Err(ConfigError::NoAttempts);
        }
        let fetch = FetchOptions {
            concurrency: self.fetch.concurrency.max(1),
            ..self.fetch.clone()
        };

        let cache_dir = match (&self.cache_dir, self.cache) {
            (Some(dir), _) => Some(dir.clone()),
            (None, true) => Some(get_cache_dir().map_err(|_| ConfigError::CacheDirResolution)?),
            (None, false) => None,
        };

        Ok(RunPlan {
            station: station.to_string(),
            span,
            token: token.to_string(),
            frequency,
            output: self.output.clone(),
            format,
            style: StripeStyle {
                line_plot: self.line_plot,
                annotate: self.annotate,
                ..StripeStyle::default()
            },
            export,
            pipeline: PipelineOptions {
                baseline,
                missing_baseline: self.missing_baseline,
            },
            fetch,
            cache_dir,
            time_budget: self.time_budget,
            base_url: self
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        })
    }

    // A single bound is completed from the requested range.
    fn baseline_period(&self, span: DateSpan) -> Result<BaselinePeriod, ConfigError> {
        let (first, last) = match (self.baseline_start, self.baseline_end) {
            (None, None) => return Ok(BaselinePeriod::FetchedRange),
            (first, last) => (
                first.unwrap_or(span.start.year()),
                last.unwrap_or(span.end.year()),
            ),
        };
        if first > last {
            return Err(ConfigError::InvalidBaselinePeriod { first, last });
        }
        if last < span.start.year() || first > span.end.year() {
            return Err(ConfigError::BaselineOutsideRange {
                first,
                last,
                range: span,
            });
        }
        Ok(BaselinePeriod::Years { first, last })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RunConfig {
        RunConfig {
            station: "GHCND:USC00484910".to_string(),
            begin: "1990-01-01".to_string(),
            end: "2019-12-31".to_string(),
            token: Some("secret".to_string()),
            frequency: "M".to_string(),
            output: PathBuf::from("out/stripes.svg"),
            ..RunConfig::default()
        }
    }

    #[test]
    fn valid_config_becomes_plan() {
        let plan = config().validate().unwrap();
        assert_eq!(plan.frequency, Frequency::Monthly);
        assert_eq!(plan.format, OutputFormat::Svg);
        assert_eq!(plan.span.days(), 10957);
        assert_eq!(plan.base_url, DEFAULT_BASE_URL);
        assert_eq!(plan.pipeline.baseline, BaselinePeriod::FetchedRange);
        assert!(plan.style.line_plot);
        assert!(plan.style.annotate);
        assert_eq!(plan.cache_dir, None);
    }

    fn assert_rejects(config: RunConfig, expected: fn(&ConfigError) -> bool) {
        let err = config.validate().unwrap_err();
        assert!(expected(&err), "unexpected error {err:?}");
    }

    #[test]
    fn rejects_bad_input_up_front() {
        assert_rejects(
            RunConfig {
                station: " ".to_string(),
                ..config()
            },
            |e| matches!(e, ConfigError::EmptyStation),
        );
        assert_rejects(
            RunConfig {
                token: None,
                ..config()
            },
            |e| matches!(e, ConfigError::MissingToken),
        );
        assert_rejects(
            RunConfig {
                begin: "1990-13-01".to_string(),
                ..config()
            },
            |e| matches!(e, ConfigError::InvalidDate { .. }),
        );
        assert_rejects(
            RunConfig {
                begin: "2020-01-01".to_string(),
                ..config()
            },
            |e| matches!(e, ConfigError::InvalidRange { .. }),
        );
        assert_rejects(
            RunConfig {
                frequency: "1000".to_string(),
                ..config()
            },
            |e| matches!(e, ConfigError::Frequency(_)),
        );
        assert_rejects(
            RunConfig {
                output: PathBuf::from("stripes.gif"),
                ..config()
            },
            |e| matches!(e, ConfigError::UnsupportedOutputFormat(_)),
        );
        assert_rejects(
            RunConfig {
                export: Some(PathBuf::from("stripes.json")),
                ..config()
            },
            |e| matches!(e, ConfigError::UnsupportedExportFormat(_)),
        );
    }

    #[test]
    fn baseline_period_bounds() {
        let plan = RunConfig {
            baseline_start: Some(1991),
            ..config()
        }
        .validate()
        .unwrap();
        assert_eq!(
            plan.pipeline.baseline,
            BaselinePeriod::Years {
                first: 1991,
                last: 2019
            }
        );

        let err = RunConfig {
            baseline_start: Some(2000),
            baseline_end: Some(1995),
            ..config()
        }
        .validate()
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidBaselinePeriod { .. }));

        let err = RunConfig {
            baseline_start: Some(1951),
            baseline_end: Some(1980),
            ..config()
        }
        .validate()
        .unwrap_err();
        assert!(matches!(err, ConfigError::BaselineOutsideRange { .. }));
    }

    #[test]
    fn explicit_cache_dir_and_export() {
        let plan = RunConfig {
            cache_dir: Some(PathBuf::from("/tmp/stripes-cache")),
            export: Some(PathBuf::from("out/buckets.Parquet")),
            ..config()
        }
        .validate()
        .unwrap();
        assert_eq!(plan.cache_dir, Some(PathBuf::from("/tmp/stripes-cache")));
        assert_eq!(
            plan.export,
            Some((PathBuf::from("out/buckets.Parquet"), ExportFormat::Parquet))
        );
    }
}
