use clap::{Parser, ValueEnum};
use climate_stripes::{ClimateStripes, FetchOptions, MissingBaseline, RunConfig, StripesError};
use log::{error, info, warn, LevelFilter};
use std::path::PathBuf;
use std::process;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum MissingBaselineArg {
    /// Leave records without a baseline out
    Skip,
    /// Abort the run
    Fail,
}

impl From<MissingBaselineArg> for MissingBaseline {
    fn from(value: MissingBaselineArg) -> Self {
        match value {
            MissingBaselineArg::Skip => MissingBaseline::Skip,
            MissingBaselineArg::Fail => MissingBaseline::Fail,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "climate-stripes")]
#[command(about = "Render climate stripes from NOAA daily temperature observations")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Args {
    /// GHCN-Daily station id, e.g. GHCND:USC00484910
    #[arg(short, long)]
    station: String,

    /// First day to fetch (YYYY-MM-DD)
    #[arg(short, long)]
    begin: String,

    /// Last day to fetch (YYYY-MM-DD)
    #[arg(short, long)]
    end: String,

    /// NOAA CDO access token
    #[arg(long, env = "NOAA_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Resampling frequency: Y, M, W or a number of days (1-999)
    #[arg(short, long, default_value = "Y")]
    frequency: String,

    /// Image to write (.png or .svg)
    #[arg(short, long, default_value = "stripes.png")]
    output: PathBuf,

    /// Do not overlay the mean temperature line
    #[arg(long)]
    no_line_plot: bool,

    /// Draw bare stripes without title, date ticks or colorbar
    #[arg(long)]
    no_annotations: bool,

    /// Also write the buckets as a table (.csv or .parquet)
    #[arg(long, value_name = "PATH")]
    export: Option<PathBuf>,

    /// First year of the baseline reference period
    #[arg(long, value_name = "YEAR")]
    baseline_start: Option<i32>,

    /// Last year of the baseline reference period
    #[arg(long, value_name = "YEAR")]
    baseline_end: Option<i32>,

    /// What to do with days that have no baseline value
    #[arg(long, value_enum, default_value = "skip")]
    missing_baseline: MissingBaselineArg,

    /// Cache finished years on disk in the default cache directory
    #[arg(long)]
    cache: bool,

    /// Cache finished years on disk in this directory
    #[arg(long, value_name = "DIR")]
    cache_dir: Option<PathBuf>,

    /// Years fetched concurrently
    #[arg(long, default_value_t = 2)]
    concurrency: usize,

    /// Give up after this many seconds
    #[arg(long, value_name = "SECONDS")]
    timeout_secs: Option<u64>,

    /// Override the CDO data endpoint
    #[arg(long, value_name = "URL")]
    base_url: Option<String>,

    /// Enable verbose logging (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Args {
    fn into_config(self) -> RunConfig {
        RunConfig {
            station: self.station,
            begin: self.begin,
            end: self.end,
            token: self.token,
            frequency: self.frequency,
            output: self.output,
            line_plot: !self.no_line_plot,
            annotate: !self.no_annotations,
            export: self.export,
            baseline_start: self.baseline_start,
            baseline_end: self.baseline_end,
            missing_baseline: self.missing_baseline.into(),
            fetch: FetchOptions {
                concurrency: self.concurrency,
                ..FetchOptions::default()
            },
            cache: self.cache,
            cache_dir: self.cache_dir,
            time_budget: self.timeout_secs.map(Duration::from_secs),
            base_url: self.base_url,
        }
    }
}

async fn run(args: Args, cancel: CancellationToken) -> Result<(), StripesError> {
    let plan = args.into_config().validate()?;
    let client = ClimateStripes::from_plan(&plan).await?;
    let outcome = client.run(&plan, &cancel).await?;

    let build = outcome.series.build;
    info!(
        "{} stripe(s) from {} day(s); {} day(s) dropped, {} day(s) without baseline",
        outcome.series.buckets.len(),
        build.days,
        build.dropped_days(),
        outcome.series.anomaly.skipped_missing_baseline
    );
    println!("{}", outcome.output.display());
    if let Some(export) = outcome.export {
        println!("{}", export.display());
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    // A missing .env file is fine; the token may come from the environment or flag.
    let _ = dotenvy::dotenv();
    let args = Args::parse();

    let default_level = match args.verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(default_level)
        .parse_default_env()
        .init();

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Received Ctrl-C, cancelling");
            on_signal.cancel();
        }
    });

    if let Err(e) = run(args, cancel).await {
        error!("{}", e);
        let mut source = std::error::Error::source(&e);
        while let Some(cause) = source {
            error!("  caused by: {}", cause);
            source = cause.source();
        }
        process::exit(1);
    }
}
