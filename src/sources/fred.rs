//! FRED (Federal Reserve Economic Data) client
//!
//! Docs: https://fred.stlouisfed.org/docs/api/fred/series_observations.html

use chrono::NaiveDate;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

use super::{endpoint, HttpFetcher};
use crate::types::*;

/// Fed total assets, USD millions (weekly, Wednesday)
pub const TOTAL_ASSETS: &str = "WALCL";
/// Treasury securities held outright, USD millions
pub const TREASURY_HOLDINGS: &str = "TREAST";
/// Central bank liquidity swaps, USD millions
pub const CENTRAL_BANK_SWAPS: &str = "SWPT";
/// Overnight reverse repo, USD billions (daily)
pub const REVERSE_REPO: &str = "RRPONTSYD";
/// Treasury General Account, USD millions
pub const TREASURY_GENERAL_ACCOUNT: &str = "WTREGEN";

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Deserialize)]
struct ObservationsResponse {
    observations: Vec<RawObservation>,
}

#[derive(Debug, Deserialize)]
struct RawObservation {
    date: String,
    /// Numeric string, or "." for a missing value
    value: String,
}

/// FRED series client
pub struct FredClient {
    fetcher: HttpFetcher,
    base_url: String,
    api_key: Option<String>,
}

impl FredClient {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            fetcher: HttpFetcher::new("fred", timeout)?,
            base_url: base_url.into(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        })
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    fn api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| SignalError::MissingApiKey("FRED".to_string()))
    }

    async fn fetch(&self, series_id: &str, extra: &[(&str, &str)]) -> Result<Vec<SeriesPoint>> {
        let api_key = self.api_key()?;
        let mut query = vec![
            ("series_id", series_id),
            ("api_key", api_key),
            ("file_type", "json"),
        ];
        query.extend_from_slice(extra);
        let url = endpoint(&self.base_url, "/series/observations", &query)?;

        let response: ObservationsResponse = self.fetcher.get_json(url).await?;
        let total = response.observations.len();
        let mut points = parse_observations(response.observations)?;
        points.sort_by_key(|p| p.date);

        debug!(
            series = series_id,
            received = total,
            kept = points.len(),
            "FRED observations"
        );
        Ok(points)
    }

    /// Observations between `start` and `end` inclusive, ascending, missing values skipped
    pub async fn observations(
        &self,
        series_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<SeriesPoint>> {
        let start = start.format(DATE_FORMAT).to_string();
        let end = end.format(DATE_FORMAT).to_string();
        self.fetch(
            series_id,
            &[("observation_start", start.as_str()), ("observation_end", end.as_str())],
        )
        .await
    }

    /// The most recent `limit` observations, ascending
    pub async fn recent(&self, series_id: &str, limit: usize) -> Result<Vec<SeriesPoint>> {
        let limit = limit.max(1).to_string();
        self.fetch(series_id, &[("sort_order", "desc"), ("limit", limit.as_str())])
            .await
    }

    /// Latest non-missing value of a series
    pub async fn latest(&self, series_id: &str) -> Result<Option<f64>> {
        // a few extra rows ride over holiday gaps
        let points = self.recent(series_id, 10).await?;
        let latest = points.last().map(|p| p.value);
        if let Some(value) = latest {
            info!(series = series_id, value, "FRED latest");
        }
        Ok(latest)
    }

    pub async fn health(&self) -> SourceHealth {
        self.fetcher.health()
    }
}

fn parse_observations(raw: Vec<RawObservation>) -> Result<Vec<SeriesPoint>> {
    let mut points = Vec::with_capacity(raw.len());
    for obs in raw {
        if obs.value.trim() == "." {
            continue;
        }
        let date = NaiveDate::parse_from_str(&obs.date, DATE_FORMAT)
            .map_err(|e| SignalError::InvalidResponse(format!("FRED date {}: {}", obs.date, e)))?;
        let value: f64 = obs
            .value
            .trim()
            .parse()
            .map_err(|e| SignalError::InvalidResponse(format!("FRED value {}: {}", obs.value, e)))?;
        points.push(SeriesPoint::new(date, value));
    }
    Ok(points)
}

#[async_trait::async_trait]
impl SeriesSource for FredClient {
    async fn history(
        &self,
        series: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<SeriesPoint>> {
        self.observations(series, start, end).await
    }

    async fn health(&self) -> SourceHealth {
        FredClient::health(self).await
    }

    fn name(&self) -> &str {
        "fred"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(date: &str, value: &str) -> RawObservation {
        RawObservation {
            date: date.to_string(),
            value: value.to_string(),
        }
    }

    #[test]
    fn test_missing_values_are_skipped() {
        let points = parse_observations(vec![
            raw("2024-01-03", "7700000"),
            raw("2024-01-10", "."),
            raw("2024-01-17", "7650000.5"),
        ])
        .unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[1].value, 7_650_000.5);
    }

    #[test]
    fn test_garbage_value_is_invalid_response() {
        let result = parse_observations(vec![raw("2024-01-03", "n/a")]);
        assert!(matches!(result, Err(SignalError::InvalidResponse(_))));
    }

    #[test]
    fn test_missing_api_key() {
        let client = FredClient::new("http://localhost", Some("  ".to_string()), Duration::from_secs(1)).unwrap();
        assert!(!client.has_api_key());
        assert!(matches!(client.api_key(), Err(SignalError::MissingApiKey(_))));
    }
}
