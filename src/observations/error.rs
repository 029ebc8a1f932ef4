use crate::types::period::DateSpan;
use chrono::NaiveDate;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failure of a single upstream request.
#[derive(Debug, Error)]
pub enum SourceError {
    // Connection failures, timeouts, truncated bodies
    #[error("Network request failed for {url}")]
    Transport {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("HTTP request failed for {url} with status {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("Rate limit exceeded for {url}")]
    RateLimited {
        url: String,
        retry_after: Option<Duration>,
    },

    #[error("Failed to parse JSON response from {url}")]
    Malformed {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Response from {url} has no 'results' array")]
    MissingResults { url: String },

    #[error("Invalid observation in response from {url}: {message}")]
    InvalidRecord { url: String, message: String },
}

impl SourceError {
    /// Transport failures, rate limiting, request timeouts and server errors
    /// may succeed when retried. Everything else is permanent.
    pub fn is_retryable(&self) -> bool {
        match self {
            SourceError::Transport { .. } | SourceError::RateLimited { .. } => true,
            SourceError::HttpStatus { status, .. } => *status >= 500 || *status == 408,
            SourceError::Malformed { .. }
            | SourceError::MissingResults { .. }
            | SourceError::InvalidRecord { .. } => false,
        }
    }

    /// HTTP status of the failed request, when one was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            SourceError::HttpStatus { status, .. } => Some(*status),
            SourceError::RateLimited { .. } => Some(429),
            SourceError::Malformed { .. }
            | SourceError::MissingResults { .. }
            | SourceError::InvalidRecord { .. } => Some(200),
            SourceError::Transport { .. } => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Invalid date range: begin {begin} is after end {end}")]
    InvalidRange { begin: NaiveDate, end: NaiveDate },

    #[error("Station id must not be empty")]
    EmptyStation,

    #[error("Upstream request for partition {partition} failed after {attempts} attempt(s) (status {}, retryable: {retryable})", display_status(.status))]
    Upstream {
        partition: DateSpan,
        status: Option<u16>,
        retryable: bool,
        attempts: u32,
        #[source]
        source: SourceError,
    },

    #[error("Rate limit still exceeded for partition {partition} after {attempts} attempt(s)")]
    RateLimited {
        partition: DateSpan,
        attempts: u32,
        #[source]
        source: SourceError,
    },

    #[error("Fetch was cancelled")]
    Cancelled,

    #[error("Fetch exceeded its time budget of {0:?}")]
    TimedOut(Duration),

    #[error("Failed to read cache file '{0}'")]
    CacheRead(PathBuf, #[source] std::io::Error),

    #[error("Failed to write cache file '{0}'")]
    CacheWrite(PathBuf, #[source] std::io::Error),

    #[error("Failed to decode cache data from '{0}'")]
    CacheDecode(PathBuf, #[source] Box<bincode::error::DecodeError>),

    #[error("Failed to encode cache data")]
    CacheEncode(#[source] Box<bincode::error::EncodeError>),

    #[error("Background task failed to complete")]
    TaskJoin(#[from] tokio::task::JoinError),
}

fn display_status(status: &Option<u16>) -> String {
    status.map_or_else(|| "none".to_string(), |s| s.to_string())
}

impl FetchError {
    /// Wraps the final failure of a partition's request.
    pub(crate) fn from_source(partition: DateSpan, attempts: u32, source: SourceError) -> Self {
        match source {
            SourceError::RateLimited { .. } => FetchError::RateLimited {
                partition,
                attempts,
                source,
            },
            _ => FetchError::Upstream {
                partition,
                status: source.status(),
                retryable: source.is_retryable(),
                attempts,
                source,
            },
        }
    }

    /// The date partition whose request failed, if any.
    pub fn partition(&self) -> Option<DateSpan> {
        match self {
            FetchError::Upstream { partition, .. } | FetchError::RateLimited { partition, .. } => {
                Some(*partition)
            }
            _ => None,
        }
    }
}
