//! Yahoo Finance chart API client (indices, FX, futures, BTC spot)

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use phf::phf_map;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::{endpoint, HttpFetcher};
use crate::types::*;

/// Instrument keys to Yahoo symbols
static SYMBOLS: phf::Map<&'static str, &'static str> = phf_map! {
    "dxy" => "DX-Y.NYB",
    "gold" => "GC=F",
    "btc" => "BTC-USD",
    "usdjpy" => "USDJPY=X",
};

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteSeries>,
}

#[derive(Debug, Deserialize)]
struct QuoteSeries {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

/// Yahoo Finance chart client
pub struct YahooClient {
    fetcher: HttpFetcher,
    base_url: String,
}

impl YahooClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            fetcher: HttpFetcher::new("yahoo", timeout)?,
            base_url: base_url.into(),
        })
    }

    /// Resolve an instrument key (`dxy`, `gold`, ...) or pass a raw symbol through
    pub fn symbol_for(key: &str) -> &str {
        SYMBOLS.get(key.to_ascii_lowercase().as_str()).copied().unwrap_or(key)
    }

    async fn chart(&self, key: &str, query: &[(&str, &str)]) -> Result<Vec<SeriesPoint>> {
        let symbol = Self::symbol_for(key);
        let mut url = endpoint(&self.base_url, "", query)?;
        url.path_segments_mut()
            .map_err(|_| SignalError::InvalidConfiguration(format!("bad Yahoo base URL {}", self.base_url)))?
            .pop_if_empty()
            .push(symbol);

        let response: ChartResponse = self.fetcher.get_json(url).await?;
        let points = closes_from_chart(response)?;
        debug!(symbol, points = points.len(), "Yahoo chart");
        Ok(points)
    }

    /// Last daily close and its change against the prior close
    pub async fn quote(&self, key: &str) -> Result<QuoteChange> {
        let closes = self.chart(key, &[("range", "5d"), ("interval", "1d")]).await?;
        quote_from_closes(&closes).ok_or_else(|| {
            SignalError::InvalidResponse(format!("no closes for {}", Self::symbol_for(key)))
        })
    }

    /// Weekly closes between `start` and `end`, ascending
    pub async fn weekly_history(
        &self,
        key: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<SeriesPoint>> {
        let period1 = start.and_time(NaiveTime::MIN).and_utc().timestamp().to_string();
        let period2 = end.and_time(NaiveTime::MIN).and_utc().timestamp().to_string();
        self.chart(
            key,
            &[
                ("period1", period1.as_str()),
                ("period2", period2.as_str()),
                ("interval", "1wk"),
            ],
        )
        .await
    }

    /// BTC/USD spot from the latest daily close
    pub async fn btc_price(&self) -> Result<PricePoint> {
        let quote = self.quote("btc").await?;
        if quote.value <= 0.0 {
            return Err(SignalError::InvalidResponse(
                "BTC price must be positive".to_string(),
            ));
        }

        Ok(PricePoint {
            symbol: "BTC/USD".to_string(),
            price: Decimal::try_from(quote.value)
                .map_err(|e| SignalError::InvalidResponse(format!("BTC price: {}", e)))?
                .round_dp(2),
            source: "yahoo".to_string(),
            timestamp: Utc::now(),
        })
    }

    pub async fn health(&self) -> SourceHealth {
        self.fetcher.health()
    }
}

fn closes_from_chart(response: ChartResponse) -> Result<Vec<SeriesPoint>> {
    if let Some(error) = response.chart.error.filter(|e| !e.is_null()) {
        return Err(SignalError::ApiError(format!("Yahoo chart error: {}", error)));
    }
    let result = response
        .chart
        .result
        .and_then(|r| r.into_iter().next())
        .ok_or_else(|| SignalError::InvalidResponse("empty Yahoo chart result".to_string()))?;
    let closes = result
        .indicators
        .quote
        .into_iter()
        .next()
        .map(|q| q.close)
        .unwrap_or_default();

    // null closes (holidays, the still-open bar) are dropped
    let mut points: Vec<SeriesPoint> = result
        .timestamp
        .iter()
        .zip(closes)
        .filter_map(|(ts, close)| {
            let close = close.filter(|c| c.is_finite())?;
            let date = DateTime::from_timestamp(*ts, 0)?.date_naive();
            Some(SeriesPoint::new(date, close))
        })
        .collect();
    points.sort_by_key(|p| p.date);
    Ok(points)
}

fn quote_from_closes(closes: &[SeriesPoint]) -> Option<QuoteChange> {
    let last = closes.last()?;
    let change_pct = match closes.len().checked_sub(2).map(|i| closes[i].value) {
        Some(prev) if prev != 0.0 => (last.value - prev) / prev * 100.0,
        _ => 0.0,
    };
    Some(QuoteChange {
        value: last.value,
        change_pct,
    })
}

#[async_trait::async_trait]
impl SeriesSource for YahooClient {
    async fn history(
        &self,
        series: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<SeriesPoint>> {
        self.weekly_history(series, start, end).await
    }

    async fn health(&self) -> SourceHealth {
        YahooClient::health(self).await
    }

    fn name(&self) -> &str {
        "yahoo"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn chart(timestamps: &[i64], closes: serde_json::Value) -> ChartResponse {
        serde_json::from_value(json!({
            "chart": {
                "result": [{
                    "meta": { "symbol": "GC=F" },
                    "timestamp": timestamps,
                    "indicators": { "quote": [{ "close": closes }] }
                }],
                "error": null
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_symbol_lookup() {
        assert_eq!(YahooClient::symbol_for("usdjpy"), "USDJPY=X");
        assert_eq!(YahooClient::symbol_for("DXY"), "DX-Y.NYB");
        assert_eq!(YahooClient::symbol_for("AAPL"), "AAPL");
        assert_eq!(YahooClient::symbol_for("btc"), "BTC-USD");
    }

    #[test]
    fn test_null_closes_dropped() {
        let points = closes_from_chart(chart(
            &[1_709_510_400, 1_709_596_800, 1_709_683_200],
            json!([2100.0, null, 2142.0]),
        ))
        .unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].date, NaiveDate::from_ymd_opt(2024, 3, 4).unwrap());

        let quote = quote_from_closes(&points).unwrap();
        assert_eq!(quote.value, 2142.0);
        assert!((quote.change_pct - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_chart_error_surfaces() {
        let response: ChartResponse = serde_json::from_value(json!({
            "chart": { "result": null, "error": { "code": "Not Found" } }
        }))
        .unwrap();
        assert!(matches!(closes_from_chart(response), Err(SignalError::ApiError(_))));
    }

    #[test]
    fn test_single_close_has_zero_change() {
        let quote = quote_from_closes(&[SeriesPoint::new(
            NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(),
            104.2,
        )])
        .unwrap();
        assert_eq!(quote.change_pct, 0.0);
    }
}
