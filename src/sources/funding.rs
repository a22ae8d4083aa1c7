//! BTC perpetual funding rate with an exchange fallback chain

use serde::Deserialize;
use std::time::Duration;
use tracing::{info, warn};

use super::{endpoint, number_from_json, HttpFetcher};
use crate::types::*;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinanceFunding {
    funding_rate: String,
}

#[derive(Debug, Deserialize)]
struct OkxResponse {
    #[serde(default)]
    data: Vec<OkxFunding>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OkxFunding {
    funding_rate: String,
}

#[derive(Debug, Deserialize)]
struct CoinGlassResponse {
    #[serde(default)]
    data: Vec<serde_json::Value>,
}

/// Funding rate client: Binance, then OKX, then CoinGlass
pub struct FundingRateClient {
    fetcher: HttpFetcher,
    binance_url: String,
    okx_url: String,
    coinglass_url: String,
}

impl FundingRateClient {
    pub fn new(
        binance_url: impl Into<String>,
        okx_url: impl Into<String>,
        coinglass_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            fetcher: HttpFetcher::new("funding", timeout)?,
            binance_url: binance_url.into(),
            okx_url: okx_url.into(),
            coinglass_url: coinglass_url.into(),
        })
    }

    /// Latest funding rate in percent, from the first exchange that answers
    pub async fn latest_rate(&self) -> Result<f64> {
        match self.binance().await {
            Ok(rate) => return Ok(rate),
            Err(e) => warn!("Binance funding rate failed: {}", e),
        }
        match self.okx().await {
            Ok(rate) => return Ok(rate),
            Err(e) => warn!("OKX funding rate failed: {}", e),
        }
        match self.coinglass().await {
            Ok(rate) => Ok(rate),
            Err(e) => {
                warn!("CoinGlass funding rate failed: {}", e);
                Err(SignalError::SourceUnhealthy(
                    "all funding rate sources failed".to_string(),
                ))
            }
        }
    }

    async fn binance(&self) -> Result<f64> {
        let url = endpoint(
            &self.binance_url,
            "/fapi/v1/fundingRate",
            &[("symbol", "BTCUSDT"), ("limit", "1")],
        )?;
        let rows: Vec<BinanceFunding> = self.fetcher.get_json(url).await?;
        let rate = rows
            .last()
            .and_then(|r| r.funding_rate.parse::<f64>().ok())
            .ok_or_else(|| SignalError::InvalidResponse("empty Binance funding".to_string()))?;
        info!(exchange = "binance", rate, "Funding rate");
        Ok(rate * 100.0)
    }

    async fn okx(&self) -> Result<f64> {
        let url = endpoint(
            &self.okx_url,
            "/api/v5/public/funding-rate",
            &[("instId", "BTC-USDT-SWAP")],
        )?;
        let response: OkxResponse = self.fetcher.get_json(url).await?;
        let rate = response
            .data
            .first()
            .and_then(|r| r.funding_rate.parse::<f64>().ok())
            .ok_or_else(|| SignalError::InvalidResponse("empty OKX funding".to_string()))?;
        info!(exchange = "okx", rate, "Funding rate");
        Ok(rate * 100.0)
    }

    async fn coinglass(&self) -> Result<f64> {
        let url = endpoint(
            &self.coinglass_url,
            "/public/v2/funding",
            &[("symbol", "BTC"), ("time_type", "all")],
        )?;
        let response: CoinGlassResponse = self.fetcher.get_json(url).await?;
        let rate = response
            .data
            .first()
            .and_then(|row| row.get("rate"))
            .and_then(number_from_json)
            .ok_or_else(|| SignalError::InvalidResponse("empty CoinGlass funding".to_string()))?;
        info!(exchange = "coinglass", rate, "Funding rate");
        Ok(rate * 100.0)
    }

    pub async fn health(&self) -> SourceHealth {
        self.fetcher.health()
    }
}
