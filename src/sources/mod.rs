//! Upstream data sources and the HTTP plumbing they share

pub mod coinmetrics;
pub mod etf_flow;
pub mod fear_greed;
pub mod fred;
pub mod funding;
pub mod yahoo;

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use url::Url;

use crate::types::*;

const USER_AGENT: &str = concat!("liquidity-signals/", env!("CARGO_PKG_VERSION"));

/// Longest wait honoured from a `Retry-After` header
const DEFAULT_RETRY_CAP_SECS: u64 = 60;

/// Internal health tracking for API-free health checks
struct HealthTracker {
    /// Timestamp of last successful request (millis since epoch)
    last_success_ms: AtomicU64,
    /// Timestamp of last failed request (millis since epoch)
    last_failure_ms: AtomicU64,
    success_count: AtomicU64,
    failure_count: AtomicU64,
    /// Sum of successful latencies, for the average
    total_latency_ms: AtomicU64,
}

impl HealthTracker {
    fn new() -> Self {
        Self {
            last_success_ms: AtomicU64::new(0),
            last_failure_ms: AtomicU64::new(0),
            success_count: AtomicU64::new(0),
            failure_count: AtomicU64::new(0),
            total_latency_ms: AtomicU64::new(0),
        }
    }

    fn record_success(&self, latency_ms: u64) {
        let now_ms = Utc::now().timestamp_millis() as u64;
        self.last_success_ms.store(now_ms, Ordering::Relaxed);
        self.total_latency_ms.fetch_add(latency_ms, Ordering::Relaxed);
        self.success_count.fetch_add(1, Ordering::Relaxed);
    }

    fn record_failure(&self) {
        let now_ms = Utc::now().timestamp_millis() as u64;
        self.last_failure_ms.store(now_ms, Ordering::Relaxed);
        self.failure_count.fetch_add(1, Ordering::Relaxed);
    }

    fn is_healthy(&self) -> bool {
        let last_success = self.last_success_ms.load(Ordering::Relaxed);
        let last_failure = self.last_failure_ms.load(Ordering::Relaxed);

        // at least one success, and no failure since
        last_success > 0 && (last_failure == 0 || last_success >= last_failure)
    }

    fn success_rate(&self) -> f64 {
        let successes = self.success_count.load(Ordering::Relaxed);
        let failures = self.failure_count.load(Ordering::Relaxed);
        let total = successes + failures;
        if total == 0 {
            return 1.0; // No requests yet
        }
        successes as f64 / total as f64
    }

    fn avg_latency_ms(&self) -> u64 {
        let successes = self.success_count.load(Ordering::Relaxed);
        if successes == 0 {
            return 0;
        }
        self.total_latency_ms.load(Ordering::Relaxed) / successes
    }

    fn last_success(&self) -> Option<DateTime<Utc>> {
        match self.last_success_ms.load(Ordering::Relaxed) {
            0 => None,
            ms => DateTime::from_timestamp_millis(ms as i64),
        }
    }
}

/// JSON-over-HTTP fetcher shared by every source client.
///
/// Each request is bounded by a timeout; a 429 is retried once after the
/// advertised `Retry-After` (capped).
pub struct HttpFetcher {
    client: Client,
    source: String,
    timeout: Duration,
    retry_cap: Duration,
    health_tracker: HealthTracker,
}

impl HttpFetcher {
    pub fn new(source: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .pool_max_idle_per_host(4)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| SignalError::ApiError(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            source: source.into(),
            timeout,
            retry_cap: Duration::from_secs(DEFAULT_RETRY_CAP_SECS),
            health_tracker: HealthTracker::new(),
        })
    }

    /// Cap the wait before the single 429 retry
    pub fn with_retry_cap(mut self, cap: Duration) -> Self {
        self.retry_cap = cap;
        self
    }

    /// GET `url` and decode the JSON body
    pub async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        let request_start = Instant::now();

        // initial attempt + one retry on rate limit
        for attempt in 0..2 {
            debug!(source = %self.source, url = %redact(&url), attempt, "GET");

            let request_future = self.client.get(url.clone()).send();
            let response = match tokio::time::timeout(self.timeout, request_future).await {
                Ok(Ok(resp)) => resp,
                Ok(Err(e)) => {
                    self.health_tracker.record_failure();
                    return Err(SignalError::ApiError(format!("{}: {}", self.source, e)));
                }
                Err(_) => {
                    self.health_tracker.record_failure();
                    return Err(SignalError::ApiError(format!(
                        "{} request timed out after {}s",
                        self.source,
                        self.timeout.as_secs()
                    )));
                }
            };

            let status = response.status();

            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                let retry_after = response
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok());

                if attempt == 0 {
                    let wait = retry_after
                        .map(Duration::from_secs)
                        .unwrap_or(self.retry_cap)
                        .min(self.retry_cap);
                    warn!(
                        source = %self.source,
                        wait_secs = wait.as_secs(),
                        "Rate limited, retrying once"
                    );
                    tokio::time::sleep(wait).await;
                    continue;
                }

                self.health_tracker.record_failure();
                return Err(SignalError::RateLimit {
                    source_name: self.source.clone(),
                    retry_after,
                });
            }

            if !status.is_success() {
                self.health_tracker.record_failure();
                let text = response.text().await.unwrap_or_default();
                return Err(SignalError::ApiError(format!(
                    "{} API error ({}): {}",
                    self.source,
                    status,
                    text.chars().take(200).collect::<String>()
                )));
            }

            let body = response.json::<T>().await.map_err(|e| {
                self.health_tracker.record_failure();
                SignalError::InvalidResponse(format!("{}: {}", self.source, e))
            })?;

            let latency_ms = request_start.elapsed().as_millis() as u64;
            self.health_tracker.record_success(latency_ms);
            return Ok(body);
        }

        Err(SignalError::ApiError(format!(
            "{}: unexpected retry loop exit",
            self.source
        )))
    }

    /// Health from recorded request outcomes (no API call)
    pub fn health(&self) -> SourceHealth {
        let is_healthy = self.health_tracker.is_healthy();

        SourceHealth {
            source: self.source.clone(),
            is_healthy,
            last_success: self.health_tracker.last_success(),
            last_error: if is_healthy || self.health_tracker.failure_count.load(Ordering::Relaxed) == 0 {
                None
            } else {
                Some("Recent failures detected".to_string())
            },
            success_rate: self.health_tracker.success_rate(),
            avg_latency_ms: self.health_tracker.avg_latency_ms(),
        }
    }
}

/// Join `path` onto `base` and append query pairs
pub fn endpoint(base: &str, path: &str, query: &[(&str, &str)]) -> Result<Url> {
    let mut url = Url::parse(&format!("{}{}", base.trim_end_matches('/'), path))
        .map_err(|e| SignalError::InvalidConfiguration(format!("bad URL {}{}: {}", base, path, e)))?;
    if !query.is_empty() {
        url.query_pairs_mut().extend_pairs(query.iter().copied());
    }
    Ok(url)
}

/// Drop credentials from a URL before logging it
fn redact(url: &Url) -> String {
    let mut clean = url.clone();
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let v = if k == "api_key" { "***".into() } else { v.into_owned() };
            (k.into_owned(), v)
        })
        .collect();
    if !pairs.is_empty() {
        clean.query_pairs_mut().clear().extend_pairs(pairs);
    }
    clean.to_string()
}

/// Parse a numeric field that upstream APIs send as either a string or a number
pub(crate) fn number_from_json(value: &serde_json::Value) -> Option<f64> {
    let parsed: Option<f64> = match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_endpoint_joins_and_encodes() {
        let url = endpoint(
            "https://api.example.com/fred/",
            "/series/observations",
            &[("series_id", "WALCL"), ("q", "a b")],
        )
        .unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.example.com/fred/series/observations?series_id=WALCL&q=a+b"
        );
    }

    #[test]
    fn test_redact_hides_api_key() {
        let url = endpoint("https://x.test", "/obs", &[("api_key", "secret"), ("id", "1")]).unwrap();
        let shown = redact(&url);
        assert!(!shown.contains("secret"));
        assert!(shown.contains("id=1"));
    }

    #[test]
    fn test_number_from_json_accepts_strings() {
        assert_eq!(number_from_json(&json!("0.0001")), Some(0.0001));
        assert_eq!(number_from_json(&json!(12.5)), Some(12.5));
        assert_eq!(number_from_json(&json!(".")), None);
        assert_eq!(number_from_json(&json!(null)), None);
    }

    #[test]
    fn test_health_before_any_request() {
        let fetcher = HttpFetcher::new("fred", Duration::from_secs(5)).unwrap();
        let health = fetcher.health();
        assert!(!health.is_healthy);
        assert_eq!(health.success_rate, 1.0);
        assert!(health.last_error.is_none());
        assert_eq!(health.source, "fred");
    }
}
