use crate::config::ConfigError;
use crate::observations::error::{FetchError, SourceError};
use crate::pipeline::PipelineError;
use crate::render::RenderError;
use polars::prelude::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StripesError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("Failed to export buckets to '{0}'")]
    Export(PathBuf, #[source] PolarsError),

    #[error("Failed to create export file '{0}'")]
    ExportIo(PathBuf, #[source] std::io::Error),

    #[error("Unsupported export format for '{0}': expected a .csv or .parquet file")]
    UnsupportedExportFormat(PathBuf),

    #[error("Failed to create cache directory '{0}'")]
    CacheDirCreation(PathBuf, #[source] std::io::Error),

    #[error("Cache path '{0}' exists but is not a directory")]
    CacheDirNotADirectory(PathBuf),

    #[error("Failed to determine cache directory")]
    CacheDirResolution,

    #[error("Background task failed to complete")]
    TaskJoin(#[from] tokio::task::JoinError),
}
