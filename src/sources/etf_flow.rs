//! Spot BTC ETF daily flows, published as JSON to a GitHub Gist by a scheduled scraper

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

use super::HttpFetcher;
use crate::cache::TtlCache;
use crate::types::*;

const CACHE_KEY: &str = "etf_flow";

pub struct EtfFlowClient {
    fetcher: HttpFetcher,
    gist_url: Option<String>,
    cache: Arc<TtlCache<EtfFlowReport>>,
}

impl EtfFlowClient {
    pub fn new(
        gist_url: Option<String>,
        cache: Arc<TtlCache<EtfFlowReport>>,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            fetcher: HttpFetcher::new("etf_flow", timeout)?,
            gist_url: gist_url.filter(|u| !u.trim().is_empty()),
            cache,
        })
    }

    /// Latest report: cached within the TTL, otherwise refetched.
    ///
    /// A failed refetch falls back to the stale cached report if there is one.
    pub async fn latest(&self) -> Result<EtfFlowReport> {
        let cached = self.cache.get(CACHE_KEY).await;
        if let Some(hit) = cached.as_ref().filter(|c| !c.is_stale) {
            return Ok(hit.value.clone());
        }

        match self.fetch().await {
            Ok(report) => {
                info!(
                    date = %report.date,
                    total_daily_flow = report.total_daily_flow,
                    "ETF flow fetched"
                );
                self.cache.put(CACHE_KEY, report.clone(), Utc::now()).await;
                Ok(report)
            }
            Err(e) => match cached {
                Some(stale) => {
                    warn!(
                        stored_at = %stale.stored_at,
                        "ETF flow fetch failed ({}), serving stale cache",
                        e
                    );
                    Ok(stale.value)
                }
                None => Err(e),
            },
        }
    }

    async fn fetch(&self) -> Result<EtfFlowReport> {
        let raw = self.gist_url.as_deref().ok_or_else(|| {
            SignalError::InvalidConfiguration("ETF gist URL not configured".to_string())
        })?;
        let url = Url::parse(raw)
            .map_err(|e| SignalError::InvalidConfiguration(format!("etf_gist_url: {}", e)))?;

        let report: EtfFlowReport = self.fetcher.get_json(url).await?;
        if !report.total_daily_flow.is_finite() {
            return Err(SignalError::InvalidResponse(
                "ETF total_daily_flow is not a number".to_string(),
            ));
        }
        Ok(report)
    }

    pub async fn health(&self) -> SourceHealth {
        self.fetcher.health()
    }
}
