//! CoinMetrics community API - BTC exchange flows

use serde::Deserialize;
use std::time::Duration;

use super::{endpoint, number_from_json, HttpFetcher};
use crate::types::*;

const INFLOW_METRIC: &str = "FlowInExNtv";
const OUTFLOW_METRIC: &str = "FlowOutExNtv";

#[derive(Debug, Deserialize)]
struct MetricsResponse {
    #[serde(default)]
    data: Vec<serde_json::Map<String, serde_json::Value>>,
}

pub struct ExchangeFlowClient {
    fetcher: HttpFetcher,
    base_url: String,
}

impl ExchangeFlowClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            fetcher: HttpFetcher::new("coinmetrics", timeout)?,
            base_url: base_url.into(),
        })
    }

    /// Latest daily exchange flow; net is outflow minus inflow
    pub async fn latest(&self) -> Result<ExchangeFlow> {
        let metrics = format!("{},{}", INFLOW_METRIC, OUTFLOW_METRIC);
        let url = endpoint(
            &self.base_url,
            "/timeseries/asset-metrics",
            &[
                ("assets", "btc"),
                ("metrics", metrics.as_str()),
                ("page_size", "1"),
                ("paging_from", "end"),
            ],
        )?;
        let response: MetricsResponse = self.fetcher.get_json(url).await?;
        let row = response
            .data
            .last()
            .ok_or_else(|| SignalError::InvalidResponse("empty CoinMetrics data".to_string()))?;

        let metric = |name: &str| row.get(name).and_then(number_from_json).unwrap_or(0.0);
        let inflow = metric(INFLOW_METRIC);
        let outflow = metric(OUTFLOW_METRIC);

        Ok(ExchangeFlow {
            net_flow: outflow - inflow,
            inflow,
            outflow,
        })
    }

    pub async fn health(&self) -> SourceHealth {
        self.fetcher.health()
    }
}
