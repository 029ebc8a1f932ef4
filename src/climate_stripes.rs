//! The main entry point: fetch a station's readings, turn them into a stripe
//! series, and render or export it.

use crate::config::RunPlan;
use crate::error::StripesError;
use crate::frame::{BucketFrame, ExportFormat};
use crate::observations::cache::PartitionCache;
use crate::observations::fetcher::{FetchOptions, ObservationFetcher};
use crate::observations::noaa_client::{NoaaClient, DEFAULT_BASE_URL};
use crate::observations::source::ObservationSource;
use crate::pipeline::anomaly::{BaselinePeriod, MissingBaseline};
use crate::pipeline::{process, PipelineOptions, StripeSeries};
use crate::render::{render_with_format, OutputFormat, StripeStyle};
use crate::types::frequency::Frequency;
use crate::utils::ensure_cache_dir_exists;
use bon::bon;
use chrono::NaiveDate;
use log::info;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Where the files of a finished run were written.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub series: StripeSeries,
    pub output: PathBuf,
    pub export: Option<PathBuf>,
}

/// The client for building climate stripes of one station at a time.
///
/// It owns an [`ObservationFetcher`] over an [`ObservationSource`], the NOAA
/// CDO API by default, and optionally a [`PartitionCache`] for years that are
/// already complete. Each call to [`ClimateStripes::series`] fetches, pairs,
/// compares against the day-of-year baseline and resamples; the image and the
/// export are written by [`ClimateStripes::run`].
///
/// Create one with [`ClimateStripes::builder()`] for NOAA, or
/// [`ClimateStripes::with_source()`] for any other source.
///
/// # Examples
///
/// ```no_run
/// # use climate_stripes::{ClimateStripes, StripesError};
/// # async fn run() -> Result<(), StripesError> {
/// let client = ClimateStripes::builder()
///     .token("my-token")
///     .cache_dir(std::env::temp_dir().join("stripes"))
///     .build()
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct ClimateStripes<S = NoaaClient> {
    fetcher: ObservationFetcher<S>,
}

#[bon]
impl ClimateStripes<NoaaClient> {
    /// A client for the NOAA CDO API.
    ///
    /// # Arguments
    ///
    /// * `token` - The CDO access token, sent in the `token` header.
    /// * `base_url` - Overrides [`DEFAULT_BASE_URL`], e.g. for a proxy.
    /// * `fetch_options` - Pacing, retry and concurrency settings.
    /// * `cache_dir` - Enables the partition cache in this directory,
    ///   creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns a [`StripesError`] if the HTTP client cannot be built or the
    /// cache directory cannot be created.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use climate_stripes::{ClimateStripes, Frequency, StripesError};
    /// use chrono::NaiveDate;
    ///
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), StripesError> {
    /// let client = ClimateStripes::builder().token("my-token").build().await?;
    /// let series = client
    ///     .series()
    ///     .station("GHCND:USC00484910")
    ///     .begin(NaiveDate::from_ymd_opt(1990, 1, 1).unwrap())
    ///     .end(NaiveDate::from_ymd_opt(2019, 12, 31).unwrap())
    ///     .frequency(Frequency::Yearly)
    ///     .call()
    ///     .await?;
    /// println!("{} stripes", series.buckets.len());
    /// # Ok(())
    /// # }
    /// ```
    #[builder]
    pub async fn new(
        #[builder(into)] token: String,
        #[builder(into)] base_url: Option<String>,
        fetch_options: Option<FetchOptions>,
        cache_dir: Option<PathBuf>,
    ) -> Result<Self, StripesError> {
        let source = NoaaClient::with_base_url(
            token,
            base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        )?;
        let client = Self::with_source(source, fetch_options.unwrap_or_default());
        match cache_dir {
            Some(dir) => client.with_cache_folder(dir).await,
            None => Ok(client),
        }
    }

    /// A client configured from a validated plan.
    pub async fn from_plan(plan: &RunPlan) -> Result<Self, StripesError> {
        Self::builder()
            .token(plan.token.clone())
            .base_url(plan.base_url.clone())
            .fetch_options(plan.fetch.clone())
            .maybe_cache_dir(plan.cache_dir.clone())
            .build()
            .await
    }
}

#[bon]
impl<S: ObservationSource> ClimateStripes<S> {
    /// A client over any observation source.
    pub fn with_source(source: S, options: FetchOptions) -> Self {
        ClimateStripes {
            fetcher: ObservationFetcher::new(source, options),
        }
    }

    /// Enables the partition cache in `cache_folder`, creating it if needed.
    ///
    /// # Errors
    ///
    /// [`StripesError::CacheDirCreation`] or
    /// [`StripesError::CacheDirNotADirectory`] when the folder is unusable.
    pub async fn with_cache_folder(self, cache_folder: PathBuf) -> Result<Self, StripesError> {
        ensure_cache_dir_exists(&cache_folder).await?;
        info!("Using partition cache in {}", cache_folder.display());
        Ok(ClimateStripes {
            fetcher: self.fetcher.with_cache(PartitionCache::new(&cache_folder)),
        })
    }

    /// Fetches `station` between `begin` and `end` and resamples its
    /// anomalies at `frequency`.
    ///
    /// The frequency is validated before any request is made.
    #[builder]
    pub async fn series(
        &self,
        station: &str,
        begin: NaiveDate,
        end: NaiveDate,
        frequency: Frequency,
        baseline: Option<BaselinePeriod>,
        missing_baseline: Option<MissingBaseline>,
        cancel: Option<CancellationToken>,
        time_budget: Option<Duration>,
    ) -> Result<StripeSeries, StripesError> {
        frequency.validate().map_err(crate::pipeline::PipelineError::from)?;
        let options = PipelineOptions {
            baseline: baseline.unwrap_or_default(),
            missing_baseline: missing_baseline.unwrap_or_default(),
        };
        let cancel = cancel.unwrap_or_default();

        let fetched = self
            .fetcher
            .fetch(station, begin, end, &cancel, time_budget)
            .await?;
        let station = station.to_string();
        let series = tokio::task::spawn_blocking(move || {
            process(&station, &fetched.observations, frequency, &options)
        })
        .await??;
        Ok(series)
    }

    /// Runs a validated plan end to end: fetch, process, render and export.
    pub async fn run(
        &self,
        plan: &RunPlan,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, StripesError> {
        let series = self
            .series()
            .station(&plan.station)
            .begin(plan.span.start)
            .end(plan.span.end)
            .frequency(plan.frequency)
            .baseline(plan.pipeline.baseline)
            .missing_baseline(plan.pipeline.missing_baseline)
            .cancel(cancel.clone())
            .maybe_time_budget(plan.time_budget)
            .call()
            .await?;
        if cancel.is_cancelled() {
            return Err(crate::observations::error::FetchError::Cancelled.into());
        }

        let output = (plan.output.clone(), plan.format);
        let export = plan.export.clone();
        let style = plan.style;
        let series = tokio::task::spawn_blocking(move || {
            write_outputs(&series, &style, &output, export.as_ref())?;
            Ok::<_, StripesError>(series)
        })
        .await??;

        Ok(RunOutcome {
            series,
            output: plan.output.clone(),
            export: plan.export.as_ref().map(|(path, _)| path.clone()),
        })
    }
}

fn write_outputs(
    series: &StripeSeries,
    style: &StripeStyle,
    (output, format): &(PathBuf, OutputFormat),
    export: Option<&(PathBuf, ExportFormat)>,
) -> Result<(), StripesError> {
    let paths = std::iter::once(output.as_path()).chain(export.map(|(path, _)| path.as_path()));
    for path in paths {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| StripesError::ExportIo(parent.to_path_buf(), e))?;
        }
    }
    render_with_format(series, style, output, *format)?;
    if let Some((path, export_format)) = export {
        BucketFrame::from_series(series)
            .map_err(|e| StripesError::Export(path.clone(), e))?
            .write_as(path, *export_format)?;
        info!("Exported {} bucket(s) to {}", series.buckets.len(), path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observations::error::{FetchError, SourceError};
    use crate::observations::source::{ObservationPage, PageRequest};
    use crate::types::observation::{RawObservation, Variable};
    use chrono::{Datelike, Duration as ChronoDuration};

    /// Serves a deterministic seasonal cycle with a warming trend for every
    /// day of the requested span.
    struct SyntheticSource;

    impl ObservationSource for SyntheticSource {
        async fn fetch_page(
            &self,
            request: &PageRequest<'_>,
        ) -> Result<ObservationPage, SourceError> {
            let mut observations = Vec::new();
            let mut date = request.span.start;
            while date <= request.span.end {
                let trend = (date.year() - 2000) * 5;
                let season = (f64::from(date.ordinal()) / 366.0 * std::f64::consts::TAU).cos();
                let mid = trend - (season * 100.0) as i32;
                observations.push(RawObservation::new(date, Variable::MinTemp, mid - 50));
                observations.push(RawObservation::new(date, Variable::MaxTemp, mid + 50));
                date += ChronoDuration::days(1);
            }
            Ok(ObservationPage {
                received: observations.len(),
                total: Some(observations.len()),
                observations,
                ignored: 0,
            })
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn client() -> ClimateStripes<SyntheticSource> {
        ClimateStripes::with_source(
            SyntheticSource,
            FetchOptions {
                min_request_interval: Duration::ZERO,
                ..FetchOptions::default()
            },
        )
    }

    #[tokio::test]
    async fn yearly_series_warms() -> Result<(), StripesError> {
        let series = client()
            .series()
            .station("GHCND:X")
            .begin(date(2000, 1, 1))
            .end(date(2009, 12, 31))
            .frequency(Frequency::Yearly)
            .call()
            .await?;
        assert_eq!(series.buckets.len(), 10);
        let anomalies: Vec<f64> = series.buckets.iter().map(|b| b.anomaly).collect();
        assert!(anomalies.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(series.build.dropped_days(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn invalid_frequency_fails_before_fetching() {
        let err = client()
            .series()
            .station("GHCND:X")
            .begin(date(2000, 1, 1))
            .end(date(2000, 12, 31))
            .frequency(Frequency::NDays(0))
            .call()
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StripesError::Pipeline(crate::pipeline::PipelineError::UnsupportedFrequency(_))
        ));
    }

    #[tokio::test]
    async fn cancelled_run_reports_cancellation() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = client()
            .series()
            .station("GHCND:X")
            .begin(date(2000, 1, 1))
            .end(date(2000, 12, 31))
            .frequency(Frequency::Monthly)
            .cancel(cancel)
            .call()
            .await
            .unwrap_err();
        assert!(matches!(err, StripesError::Fetch(FetchError::Cancelled)));
    }

    #[tokio::test]
    async fn run_writes_image_and_export() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let config = crate::config::RunConfig {
            station: "GHCND:X".to_string(),
            begin: "2001-01-01".to_string(),
            end: "2004-12-31".to_string(),
            token: Some("unused".to_string()),
            frequency: "M".to_string(),
            output: dir.path().join("out").join("stripes.svg"),
            export: Some(dir.path().join("out").join("stripes.csv")),
            ..Default::default()
        };
        let plan = config.validate()?;
        let outcome = client().run(&plan, &CancellationToken::new()).await?;
        assert_eq!(outcome.series.buckets.len(), 48);
        assert!(outcome.output.is_file());
        let csv = std::fs::read_to_string(outcome.export.as_ref().unwrap())?;
        assert_eq!(csv.lines().count(), 49);
        Ok(())
    }
}
