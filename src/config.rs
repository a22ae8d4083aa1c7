//! Service configuration
//!
//! Thresholds are immutable input to the signal core. `Settings::load` layers
//! defaults, an optional `signals.toml`, `SIGNALS_*` environment variables and
//! the legacy variable names (`FRED_API_KEY`, `ETF_GIST_URL`, `REDIS_URL`,
//! `PORT`), then the caller validates before serving.

use serde::{Deserialize, Serialize};

use crate::aggregators::ScoreMode;
use crate::types::{Result, SignalError};

/// Hidden-QE condition thresholds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HiddenQeThresholds {
    /// Weekly % change of total assets above which the balance sheet is growing
    pub total_assets_threshold: f64,
    /// Weekly % change of treasury holdings below which domestic QE is subdued
    pub treasury_threshold: f64,
    /// Weekly % change of swap lines counted as a surge
    pub swaps_pct_threshold: f64,
    /// Weekly absolute increase of swap lines, USD billions
    pub swaps_abs_threshold: f64,
    /// 52-week z-score counted as a surge
    pub swaps_zscore_threshold: f64,
    /// Minimum outstanding swap balance, USD billions, for the % path
    pub swaps_min_value: f64,
    /// Weekly % rise of USDJPY counted as yen weakening
    pub usdjpy_weakening_threshold: f64,
    /// USDJPY level above which volatility suggests intervention
    pub usdjpy_high_level: f64,
    /// Absolute weekly % move counted as high volatility
    pub usdjpy_high_volatility: f64,
    pub on_threshold: u8,
    pub watch_threshold: u8,
}

impl Default for HiddenQeThresholds {
    fn default() -> Self {
        Self {
            total_assets_threshold: 0.1,
            treasury_threshold: 0.5,
            swaps_pct_threshold: 10.0,
            swaps_abs_threshold: 5.0,
            swaps_zscore_threshold: 2.0,
            swaps_min_value: 1.0,
            usdjpy_weakening_threshold: 1.0,
            usdjpy_high_level: 150.0,
            usdjpy_high_volatility: 1.5,
            on_threshold: 4,
            watch_threshold: 2,
        }
    }
}

impl HiddenQeThresholds {
    /// Reject threshold sets the classifier cannot interpret
    pub fn validate(&self) -> Result<()> {
        let named = [
            ("total_assets_threshold", self.total_assets_threshold),
            ("treasury_threshold", self.treasury_threshold),
            ("swaps_pct_threshold", self.swaps_pct_threshold),
            ("swaps_abs_threshold", self.swaps_abs_threshold),
            ("swaps_zscore_threshold", self.swaps_zscore_threshold),
            ("swaps_min_value", self.swaps_min_value),
            ("usdjpy_weakening_threshold", self.usdjpy_weakening_threshold),
            ("usdjpy_high_level", self.usdjpy_high_level),
            ("usdjpy_high_volatility", self.usdjpy_high_volatility),
        ];
        for (name, value) in named {
            if !value.is_finite() || value < 0.0 {
                return Err(SignalError::InvalidConfiguration(format!(
                    "{} must be a finite, non-negative number (got {})",
                    name, value
                )));
            }
        }

        if self.on_threshold < self.watch_threshold {
            return Err(SignalError::InvalidConfiguration(format!(
                "on_threshold ({}) must be >= watch_threshold ({})",
                self.on_threshold, self.watch_threshold
            )));
        }
        if self.on_threshold as usize > crate::signals::ConditionKind::ALL.len() {
            return Err(SignalError::InvalidConfiguration(format!(
                "on_threshold ({}) exceeds the number of conditions",
                self.on_threshold
            )));
        }

        Ok(())
    }
}

/// Market signal thresholds (liquidity in USD millions, flows in native units)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketThresholds {
    pub liquidity_bullish_strong: f64,
    pub liquidity_bullish_weak: f64,
    pub liquidity_bearish_strong: f64,
    pub dxy_bearish_strong: f64,
    pub dxy_bearish_weak: f64,
    pub dxy_bullish_strong: f64,
    pub exchange_flow_bullish_strong: f64,
    pub exchange_flow_bullish_weak: f64,
    pub exchange_flow_bearish_strong: f64,
    pub etf_flow_bullish_strong: f64,
    pub etf_flow_bullish_weak: f64,
    pub etf_flow_bearish_weak: f64,
    pub etf_flow_bearish_strong: f64,
    pub funding_rate_overheat: f64,
    pub funding_rate_cooling: f64,
    pub fear_greed_extreme_fear: f64,
    pub fear_greed_fear: f64,
    pub fear_greed_extreme_greed: f64,
    pub fear_greed_greed: f64,
    pub gold_change_threshold: f64,
}

impl Default for MarketThresholds {
    fn default() -> Self {
        Self {
            liquidity_bullish_strong: 6_000_000.0,
            liquidity_bullish_weak: 5_500_000.0,
            liquidity_bearish_strong: 5_000_000.0,
            dxy_bearish_strong: 110.0,
            dxy_bearish_weak: 105.0,
            dxy_bullish_strong: 100.0,
            exchange_flow_bullish_strong: 5000.0,
            exchange_flow_bullish_weak: 0.0,
            exchange_flow_bearish_strong: -5000.0,
            etf_flow_bullish_strong: 500.0,
            etf_flow_bullish_weak: 100.0,
            etf_flow_bearish_weak: -100.0,
            etf_flow_bearish_strong: -500.0,
            funding_rate_overheat: 0.1,
            funding_rate_cooling: -0.1,
            fear_greed_extreme_fear: 25.0,
            fear_greed_fear: 40.0,
            fear_greed_extreme_greed: 75.0,
            fear_greed_greed: 60.0,
            gold_change_threshold: 1.0,
        }
    }
}

impl MarketThresholds {
    /// Market thresholds may be negative (outflows, negative funding) but never NaN
    pub fn validate(&self) -> Result<()> {
        let values = [
            self.liquidity_bullish_strong,
            self.liquidity_bullish_weak,
            self.liquidity_bearish_strong,
            self.dxy_bearish_strong,
            self.dxy_bearish_weak,
            self.dxy_bullish_strong,
            self.exchange_flow_bullish_strong,
            self.exchange_flow_bullish_weak,
            self.exchange_flow_bearish_strong,
            self.etf_flow_bullish_strong,
            self.etf_flow_bullish_weak,
            self.etf_flow_bearish_weak,
            self.etf_flow_bearish_strong,
            self.funding_rate_overheat,
            self.funding_rate_cooling,
            self.fear_greed_extreme_fear,
            self.fear_greed_fear,
            self.fear_greed_extreme_greed,
            self.fear_greed_greed,
            self.gold_change_threshold,
        ];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(SignalError::InvalidConfiguration(
                "market thresholds must be finite numbers".to_string(),
            ));
        }
        if self.gold_change_threshold < 0.0 {
            return Err(SignalError::InvalidConfiguration(
                "gold_change_threshold must be non-negative".to_string(),
            ));
        }
        Ok(())
    }
}

/// Upstream endpoints, overridable for tests and mirrors
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    pub fred: String,
    pub yahoo: String,
    pub binance: String,
    pub okx: String,
    pub coinglass: String,
    pub fear_greed: String,
    pub coinmetrics: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            fred: "https://api.stlouisfed.org/fred".to_string(),
            yahoo: "https://query1.finance.yahoo.com/v8/finance/chart".to_string(),
            binance: "https://fapi.binance.com".to_string(),
            okx: "https://www.okx.com".to_string(),
            coinglass: "https://open-api.coinglass.com".to_string(),
            fear_greed: "https://api.alternative.me".to_string(),
            coinmetrics: "https://community-api.coinmetrics.io/v4".to_string(),
        }
    }
}

/// Complete service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub port: u16,
    pub fred_api_key: Option<String>,
    pub etf_gist_url: Option<String>,
    pub redis_url: Option<String>,
    /// Process-wide composite score mode, overridable per request
    pub score_mode: ScoreMode,
    pub request_timeout_secs: u64,
    pub etf_cache_ttl_secs: i64,
    pub hidden_qe: HiddenQeThresholds,
    pub market: MarketThresholds,
    pub endpoints: EndpointConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            port: 8080,
            fred_api_key: None,
            etf_gist_url: None,
            redis_url: None,
            score_mode: ScoreMode::Momentum,
            request_timeout_secs: 20,
            etf_cache_ttl_secs: 3600,
            hidden_qe: HiddenQeThresholds::default(),
            market: MarketThresholds::default(),
            endpoints: EndpointConfig::default(),
        }
    }
}

impl Settings {
    /// Load settings from `signals.toml` (optional) and the environment
    pub fn load() -> std::result::Result<Self, config::ConfigError> {
        let legacy = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());

        config::Config::builder()
            .add_source(config::File::with_name("signals").required(false))
            .add_source(
                config::Environment::with_prefix("SIGNALS")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("fred_api_key", legacy("FRED_API_KEY"))?
            .set_override_option("etf_gist_url", legacy("ETF_GIST_URL"))?
            .set_override_option("redis_url", legacy("REDIS_URL"))?
            .set_override_option("port", legacy("PORT"))?
            .build()?
            .try_deserialize()
    }

    /// Fail fast on invalid thresholds
    pub fn validate(&self) -> Result<()> {
        self.hidden_qe.validate()?;
        self.market.validate()?;
        if self.etf_cache_ttl_secs <= 0 {
            return Err(SignalError::InvalidConfiguration(
                "etf_cache_ttl_secs must be positive".to_string(),
            ));
        }
        if let Some(gist) = &self.etf_gist_url {
            url::Url::parse(gist).map_err(|e| {
                SignalError::InvalidConfiguration(format!("etf_gist_url: {}", e))
            })?;
        }
        Ok(())
    }
}
