use crate::observations::cache::PartitionCache;
use crate::observations::error::{FetchError, SourceError};
use crate::observations::partition::{requested_span, year_partitions};
use crate::observations::source::{ObservationPage, ObservationSource, PageRequest};
use crate::types::observation::RawObservation;
use crate::types::period::DateSpan;
use chrono::NaiveDate;
use futures_util::stream::{self, StreamExt, TryStreamExt};
use log::{info, warn};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Request limits and retry behaviour of the fetcher.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchOptions {
    /// Items requested per page; the provider caps this at 1000.
    pub page_limit: usize,
    /// Minimum spacing between the start of two requests, across all
    /// partitions in flight. 200ms keeps within 5 requests per second.
    pub min_request_interval: Duration,
    /// Attempts per request, the first one included.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    /// Base delay after a rate-limit response without `Retry-After`.
    pub rate_limit_backoff: Duration,
    pub max_backoff: Duration,
    /// Partitions fetched concurrently.
    pub concurrency: usize,
}

impl Default for FetchOptions {
    fn default() -> Self {
        FetchOptions {
            page_limit: 1000,
            min_request_interval: Duration::from_millis(200),
            max_attempts: 4,
            initial_backoff: Duration::from_millis(500),
            rate_limit_backoff: Duration::from_secs(5),
            max_backoff: Duration::from_secs(30),
            concurrency: 2,
        }
    }
}

impl FetchOptions {
    /// Delay before retry number `attempt` (1-based) after `error`.
    pub(crate) fn backoff(&self, error: &SourceError, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let delay = match error {
            SourceError::RateLimited {
                retry_after: Some(after),
                ..
            } => *after,
            SourceError::RateLimited { .. } => {
                self.rate_limit_backoff.saturating_mul(1 << exponent)
            }
            _ => self.initial_backoff.saturating_mul(1 << exponent),
        };
        delay.min(self.max_backoff)
    }
}

/// Spaces request starts at least `interval` apart.
#[derive(Debug)]
pub(crate) struct Pacer {
    interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl Pacer {
    pub(crate) fn new(interval: Duration) -> Self {
        Pacer {
            interval,
            next_slot: Mutex::new(None),
        }
    }

    pub(crate) async fn wait(&self) {
        if self.interval.is_zero() {
            return;
        }
        let slot = {
            let mut next_slot = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = match *next_slot {
                Some(reserved) if reserved > now => reserved,
                _ => now,
            };
            *next_slot = Some(slot + self.interval);
            slot
        };
        tokio::time::sleep_until(slot).await;
    }
}

/// Everything fetched for one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchedObservations {
    /// Readings in partition order.
    pub observations: Vec<RawObservation>,
    pub partitions: usize,
    /// Requests that returned a page, retries not included.
    pub pages: usize,
    pub cached_partitions: usize,
    /// Readings of other datatypes returned by the provider.
    pub ignored: usize,
}

#[derive(Debug, Default)]
struct PartitionFetch {
    observations: Vec<RawObservation>,
    pages: usize,
    ignored: usize,
    cached: bool,
}

/// Fetches raw TMIN/TMAX readings for a station over a date range.
///
/// The range is split into calendar-year partitions. Each partition is paged
/// through the [`ObservationSource`]; every request is paced and transient
/// failures are retried with exponential backoff.
pub struct ObservationFetcher<S> {
    source: S,
    options: FetchOptions,
    pacer: Pacer,
    cache: Option<PartitionCache>,
}

impl<S: ObservationSource> ObservationFetcher<S> {
    /// Creates a fetcher without a cache.
    ///
    /// # Arguments
    ///
    /// * `source` - Where pages come from, usually a [`NoaaClient`](crate::NoaaClient).
    /// * `options` - Pacing, retry, paging and concurrency limits. All
    ///   partitions in flight share one pacer built from
    ///   `options.min_request_interval`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use climate_stripes::{FetchOptions, NoaaClient, ObservationFetcher, SourceError};
    /// # fn build() -> Result<(), SourceError> {
    /// let fetcher = ObservationFetcher::new(NoaaClient::new("my-token")?, FetchOptions::default());
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(source: S, options: FetchOptions) -> Self {
        ObservationFetcher {
            pacer: Pacer::new(options.min_request_interval),
            source,
            options,
            cache: None,
        }
    }

    /// Reads closed partitions from `cache` before going to the source, and
    /// stores freshly fetched closed partitions in it. Cache failures are
    /// logged and never fail a fetch.
    pub fn with_cache(mut self, cache: PartitionCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn options(&self) -> &FetchOptions {
        &self.options
    }

    /// Fetches every reading for `station` between `begin` and `end` inclusive.
    ///
    /// Results are ordered by partition regardless of which request finished
    /// first. Cancelling `cancel` or exceeding `budget` abandons all requests in
    /// flight and returns [`FetchError::Cancelled`] / [`FetchError::TimedOut`].
    pub async fn fetch(
        &self,
        station: &str,
        begin: NaiveDate,
        end: NaiveDate,
        cancel: &CancellationToken,
        budget: Option<Duration>,
    ) -> Result<FetchedObservations, FetchError> {
        if station.trim().is_empty() {
            return Err(FetchError::EmptyStation);
        }
        let span = requested_span(begin, end)?;
        let partitions = year_partitions(span);
        info!(
            "Fetching station {} for {} in {} partition(s)",
            station,
            span,
            partitions.len()
        );

        let work = self.fetch_partitions(station, &partitions);
        let bounded = async {
            match budget {
                Some(budget) => match tokio::time::timeout(budget, work).await {
                    Ok(result) => result,
                    Err(_) => Err(FetchError::TimedOut(budget)),
                },
                None => work.await,
            }
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!("Fetch for station {} cancelled", station);
                Err(FetchError::Cancelled)
            }
            result = bounded => result,
        }
    }

    async fn fetch_partitions(
        &self,
        station: &str,
        partitions: &[DateSpan],
    ) -> Result<FetchedObservations, FetchError> {
        // `buffered` yields in input order, which keeps the merge keyed by
        // partition index rather than by completion.
        let fetched: Vec<PartitionFetch> = stream::iter(partitions.iter().copied())
            .map(|partition| self.fetch_partition(station, partition))
            .buffered(self.options.concurrency.max(1))
            .try_collect()
            .await?;

        let mut result = FetchedObservations {
            partitions: partitions.len(),
            ..Default::default()
        };
        for partition in fetched {
            result.pages += partition.pages;
            result.ignored += partition.ignored;
            result.cached_partitions += usize::from(partition.cached);
            result.observations.extend(partition.observations);
        }
        info!(
            "Fetched {} readings in {} page(s), {} partition(s) from cache, {} other reading(s) ignored",
            result.observations.len(),
            result.pages,
            result.cached_partitions,
            result.ignored
        );
        Ok(result)
    }

    async fn fetch_partition(
        &self,
        station: &str,
        partition: DateSpan,
    ) -> Result<PartitionFetch, FetchError> {
        if let Some(cache) = &self.cache {
            match cache.load(station, &partition).await {
                Ok(Some(observations)) => {
                    return Ok(PartitionFetch {
                        observations,
                        cached: true,
                        ..Default::default()
                    })
                }
                Ok(None) => {}
                Err(e) => warn!("Ignoring unreadable cache for {}: {}", partition, e),
            }
        }

        info!("Working on partition {} for station {}", partition, station);
        let mut fetch = PartitionFetch::default();
        let mut offset = 1;
        loop {
            let request = PageRequest {
                station,
                span: partition,
                offset,
                limit: self.options.page_limit,
            };
            let page = self.fetch_page(&request).await?;
            fetch.pages += 1;
            fetch.ignored += page.ignored;
            fetch.observations.extend(page.observations);
            offset += page.received;
            match page.total {
                Some(total) if page.received > 0 && offset <= total => continue,
                _ => break,
            }
        }

        if let Some(cache) = &self.cache {
            if let Err(e) = cache.store(station, &partition, &fetch.observations).await {
                warn!("Failed to cache partition {}: {}", partition, e);
            }
        }
        Ok(fetch)
    }

    async fn fetch_page(&self, request: &PageRequest<'_>) -> Result<ObservationPage, FetchError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            self.pacer.wait().await;
            match self.source.fetch_page(request).await {
                Ok(page) => return Ok(page),
                Err(e) if e.is_retryable() && attempt < self.options.max_attempts => {
                    let delay = self.options.backoff(&e, attempt);
                    warn!(
                        "Attempt {}/{} for partition {} failed: {}. Retrying in {:?}",
                        attempt, self.options.max_attempts, request.span, e, delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(FetchError::from_source(request.span, attempt, e)),
            }
        }
    }
}
