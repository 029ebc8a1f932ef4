use crate::observations::error::SourceError;
use crate::types::observation::RawObservation;
use crate::types::period::DateSpan;
use std::future::Future;

/// One page of one partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest<'a> {
    pub station: &'a str,
    pub span: DateSpan,
    /// 1-based index of the first item, as the CDO API counts.
    pub offset: usize,
    pub limit: usize,
}

/// Observations parsed from one response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObservationPage {
    pub observations: Vec<RawObservation>,
    /// Items in the response, including the ones that were ignored.
    pub received: usize,
    /// Items available for the whole partition, when the provider says.
    pub total: Option<usize>,
    /// Items with a datatype other than TMIN/TMAX.
    pub ignored: usize,
}

/// An upstream provider of daily temperature readings.
///
/// Implementations perform exactly one request per call; pacing, retries and
/// pagination are handled by [`crate::ObservationFetcher`].
pub trait ObservationSource {
    fn fetch_page(
        &self,
        request: &PageRequest<'_>,
    ) -> impl Future<Output = Result<ObservationPage, SourceError>> + Send;
}
