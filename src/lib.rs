mod climate_stripes;
mod config;
mod error;
mod frame;
mod observations;
mod pipeline;
mod render;
mod types;
mod utils;

pub use climate_stripes::*;
pub use config::{ConfigError, RunConfig, RunPlan};
pub use error::StripesError;
pub use frame::{BucketFrame, ExportFormat};
pub use utils::{ensure_cache_dir_exists, get_cache_dir};

pub use observations::cache::PartitionCache;
pub use observations::error::{FetchError, SourceError};
pub use observations::fetcher::{FetchOptions, FetchedObservations, ObservationFetcher};
pub use observations::noaa_client::{NoaaClient, DEFAULT_BASE_URL};
pub use observations::partition::{requested_span, year_partitions};
pub use observations::source::{ObservationPage, ObservationSource, PageRequest};

pub use pipeline::anomaly::{
    compute_anomalies, AnomalyReport, AnomalySeries, BaselinePeriod, DayOfYearBaseline,
    MissingBaseline,
};
pub use pipeline::daily::{build_daily_series, BuildReport};
pub use pipeline::resample::resample;
pub use pipeline::{process, PipelineError, PipelineOptions, StripeSeries};

pub use render::colormap::{rd_bu_r, ColorScale};
pub use render::{
    render_svg_string, render_to_file, render_with_format, OutputFormat, RenderError, StripeStyle,
};

pub use types::frequency::{Frequency, UnsupportedFrequency, MAX_N_DAYS};
pub use types::observation::{RawObservation, Variable};
pub use types::period::DateSpan;
pub use types::records::{AnomalyRecord, Bucket, DailyRecord};
