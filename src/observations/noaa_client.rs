//! Client for the NOAA NCEI Climate Data Online (CDO) v2 `data` endpoint.

use crate::observations::error::SourceError;
use crate::observations::source::{ObservationPage, ObservationSource, PageRequest};
use crate::types::observation::{RawObservation, Variable};
use chrono::{NaiveDate, NaiveDateTime};
use log::{debug, warn};
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://www.ncdc.noaa.gov/cdo-web/api/v2/data";
const DATASET_ID: &str = "GHCND";
const TOKEN_HEADER: &str = "token";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// [`ObservationSource`] backed by the CDO `data` endpoint.
///
/// Each page is one GET carrying the dataset, both temperature datatypes, the
/// station, the partition dates, `limit` and a 1-based `offset`. The access
/// token travels in the `token` header.
pub struct NoaaClient {
    client: Client,
    base_url: String,
    token: String,
}

impl NoaaClient {
    /// A client for the public CDO endpoint.
    ///
    /// # Errors
    ///
    /// See [`NoaaClient::with_base_url`].
    pub fn new(token: impl Into<String>) -> Result<Self, SourceError> {
        Self::with_base_url(token, DEFAULT_BASE_URL)
    }

    /// A client for a CDO-compatible endpoint at `base_url`.
    ///
    /// # Arguments
    ///
    /// * `token` - The CDO access token.
    /// * `base_url` - Full URL of the `data` endpoint, without query string.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Transport`] when the HTTP client cannot be built,
    /// which happens when the TLS backend fails to initialise.
    pub fn with_base_url(
        token: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, SourceError> {
        let base_url = base_url.into();
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| SourceError::Transport {
                url: base_url.clone(),
                source: Box::new(e),
            })?;
        Ok(NoaaClient {
            client,
            base_url,
            token: token.into(),
        })
    }

    fn query(request: &PageRequest<'_>) -> Vec<(&'static str, String)> {
        vec![
            ("datasetid", DATASET_ID.to_string()),
            ("datatypeid", Variable::MinTemp.datatype_id().to_string()),
            ("datatypeid", Variable::MaxTemp.datatype_id().to_string()),
            ("stationid", request.station.to_string()),
            ("startdate", request.span.start.format("%Y-%m-%d").to_string()),
            ("enddate", request.span.end.format("%Y-%m-%d").to_string()),
            ("limit", request.limit.to_string()),
            ("offset", request.offset.to_string()),
        ]
    }

    // Token stays out of the URL so it never lands in logs or error messages.
    fn describe(&self, request: &PageRequest<'_>) -> String {
        format!(
            "{}?stationid={}&startdate={}&enddate={}&offset={}",
            self.base_url, request.station, request.span.start, request.span.end, request.offset
        )
    }
}

impl ObservationSource for NoaaClient {
    async fn fetch_page(&self, request: &PageRequest<'_>) -> Result<ObservationPage, SourceError> {
        let url = self.describe(request);
        debug!("Requesting {}", url);

        let response = self
            .client
            .get(&self.base_url)
            .header(TOKEN_HEADER, &self.token)
            .query(&Self::query(request))
            .send()
            .await
            .map_err(|e| SourceError::Transport {
                url: url.clone(),
                source: Box::new(e),
            })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            warn!("Rate limited by {} (retry after {:?})", url, retry_after);
            return Err(SourceError::RateLimited { url, retry_after });
        }
        if !status.is_success() {
            warn!("HTTP error for {}: {}", url, status);
            return Err(SourceError::HttpStatus {
                url,
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|e| SourceError::Transport {
            url: url.clone(),
            source: Box::new(e),
        })?;
        parse_page(&url, &body)
    }
}

#[derive(Debug, Deserialize)]
struct DataResponse {
    metadata: Option<Metadata>,
    results: Option<Vec<DataItem>>,
}

#[derive(Debug, Deserialize)]
struct Metadata {
    resultset: ResultSet,
}

#[derive(Debug, Deserialize)]
struct ResultSet {
    count: usize,
}

#[derive(Debug, Deserialize)]
struct DataItem {
    date: String,
    datatype: String,
    value: NumericValue,
}

// The API documents numbers, but string values have been seen in the wild.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NumericValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl NumericValue {
    fn tenths(&self) -> Option<i32> {
        let value = match self {
            NumericValue::Int(v) => return i32::try_from(*v).ok(),
            NumericValue::Float(v) => *v,
            NumericValue::Text(s) => s.trim().parse::<f64>().ok()?,
        };
        if !value.is_finite() || value.abs() > f64::from(i32::MAX) {
            return None;
        }
        Some(value.round() as i32)
    }
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .map(|dt| dt.date())
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
        .ok()
}

/// Parses a CDO `data` response body.
///
/// An object without a `results` array (the shape of both error payloads and
/// empty result sets) is reported as [`SourceError::MissingResults`].
pub(crate) fn parse_page(url: &str, body: &str) -> Result<ObservationPage, SourceError> {
    let response: DataResponse =
        serde_json::from_str(body).map_err(|e| SourceError::Malformed {
            url: url.to_string(),
            source: e,
        })?;
    let items = response.results.ok_or_else(|| SourceError::MissingResults {
        url: url.to_string(),
    })?;

    let mut page = ObservationPage {
        observations: Vec::with_capacity(items.len()),
        received: items.len(),
        total: response.metadata.map(|m| m.resultset.count),
        ignored: 0,
    };

    for item in items {
        let Some(variable) = Variable::from_datatype_id(&item.datatype) else {
            page.ignored += 1;
            continue;
        };
        let date = parse_date(&item.date).ok_or_else(|| SourceError::InvalidRecord {
            url: url.to_string(),
            message: format!("unparseable date '{}'", item.date),
        })?;
        let tenths = item.value.tenths().ok_or_else(|| SourceError::InvalidRecord {
            url: url.to_string(),
            message: format!("unparseable {} value {:?} on {}", variable, item.value, date),
        })?;
        page.observations.push(RawObservation::new(date, variable, tenths));
    }

    Ok(page)
}
