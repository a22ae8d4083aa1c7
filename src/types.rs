use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One raw observation of a dated series (FRED, Yahoo weekly closes)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub date: NaiveDate,
    pub value: f64,
}

impl SeriesPoint {
    pub fn new(date: NaiveDate, value: f64) -> Self {
        Self { date, value }
    }
}

/// Spot price shown on the dashboard
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricePoint {
    pub symbol: String,          // "BTC/USD"
    pub price: Decimal,
    pub source: String,          // "yahoo"
    pub timestamp: DateTime<Utc>,
}

/// Last daily close of a quoted instrument and its change against the prior close
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuoteChange {
    pub value: f64,
    pub change_pct: f64,
}

/// Daily BTC spot ETF flow report, as published to the Gist
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EtfFlowReport {
    #[serde(default)]
    pub date: String,
    /// USD millions, positive = net inflow
    pub total_daily_flow: f64,
    #[serde(default)]
    pub top_flows: Vec<EtfFlowEntry>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EtfFlowEntry {
    pub symbol: String,
    pub daily_flow: f64,
}

/// Exchange net flow in BTC (positive = coins leaving exchanges)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExchangeFlow {
    pub net_flow: f64,
    pub inflow: f64,
    pub outflow: f64,
}

/// Data source health/status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceHealth {
    pub source: String,
    pub is_healthy: bool,
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub success_rate: f64,
    pub avg_latency_ms: u64,
}

/// Error types for signal computation and data retrieval
#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    #[error("API request failed: {0}")]
    ApiError(String),

    #[error("Rate limit exceeded for {source_name}")]
    RateLimit { source_name: String, retry_after: Option<u64> },

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("Missing API key for {0}")]
    MissingApiKey(String),

    #[error("Cache error: {0}")]
    CacheError(String),

    #[error("Source unhealthy: {0}")]
    SourceUnhealthy(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

/// Result type for signal operations
pub type Result<T> = std::result::Result<T, SignalError>;

/// A source of dated series (weekly economic data, weekly FX closes)
#[async_trait::async_trait]
pub trait SeriesSource: Send + Sync {
    /// Observations of `series` between `start` and `end`, ascending by date
    async fn history(
        &self,
        series: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<SeriesPoint>>;

    /// Source health status
    async fn health(&self) -> SourceHealth;

    /// Source name
    fn name(&self) -> &str;
}
