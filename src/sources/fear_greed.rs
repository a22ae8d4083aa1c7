//! Alternative.me Crypto Fear & Greed index

use serde::Deserialize;
use std::time::Duration;

use super::{endpoint, HttpFetcher};
use crate::types::*;

#[derive(Debug, Deserialize)]
struct FngResponse {
    #[serde(default)]
    data: Vec<FngEntry>,
}

#[derive(Debug, Deserialize)]
struct FngEntry {
    value: String,
    #[serde(default)]
    value_classification: Option<String>,
}

/// Latest index reading
#[derive(Debug, Clone, PartialEq)]
pub struct FearGreedReading {
    pub value: u8,
    pub classification: Option<String>,
}

pub struct FearGreedClient {
    fetcher: HttpFetcher,
    base_url: String,
}

impl FearGreedClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            fetcher: HttpFetcher::new("fear_greed", timeout)?,
            base_url: base_url.into(),
        })
    }

    pub async fn latest(&self) -> Result<FearGreedReading> {
        let url = endpoint(&self.base_url, "/fng/", &[("limit", "1")])?;
        let response: FngResponse = self.fetcher.get_json(url).await?;
        let entry = response
            .data
            .into_iter()
            .next()
            .ok_or_else(|| SignalError::InvalidResponse("empty Fear & Greed data".to_string()))?;

        let value: u8 = entry
            .value
            .trim()
            .parse()
            .ok()
            .filter(|v| *v <= 100)
            .ok_or_else(|| {
                SignalError::InvalidResponse(format!("Fear & Greed value {}", entry.value))
            })?;

        Ok(FearGreedReading {
            value,
            classification: entry.value_classification,
        })
    }

    pub async fn health(&self) -> SourceHealth {
        self.fetcher.health()
    }
}
