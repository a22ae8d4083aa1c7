pub mod types;
pub mod aggregators;
pub mod cache;
pub mod config;
pub mod normalizers;
pub mod signals;
pub mod sources;

pub use aggregators::{composite_score, CompositeScore, ScoreMode, ScoreSummary};
pub use config::{HiddenQeThresholds, MarketThresholds, Settings};
pub use signals::{
    HiddenQeClassifier, HiddenQeSignal, HistoryInputs, HistoryScan, HistoryScanner, MarketSignal,
    QeState, SignalStatus,
};
pub use sources::coinmetrics::ExchangeFlowClient;
pub use sources::etf_flow::EtfFlowClient;
pub use sources::fear_greed::FearGreedClient;
pub use sources::fred::FredClient;
pub use sources::funding::FundingRateClient;
pub use sources::yahoo::YahooClient;
pub use types::*;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use cache::{SnapshotStore, TtlCache};
use signals::observation::{DerivedSeries, MetricObservation, ROLLING_WINDOW};
use signals::HiddenQeInputs;
use sources::fred::{
    CENTRAL_BANK_SWAPS, REVERSE_REPO, TOTAL_ASSETS, TREASURY_GENERAL_ACCOUNT, TREASURY_HOLDINGS,
};

pub const DEFAULT_HISTORY_YEARS: u32 = 5;
pub const MAX_HISTORY_YEARS: u32 = 20;

/// Yahoo key for the USDJPY weekly series
const USDJPY: &str = "usdjpy";
/// Weekly points fetched for the latest hidden-QE reading
const RECENT_WEEKS: usize = 8;

/// Dashboard payload served by `/api/data`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedPayload {
    pub timestamp: DateTime<Utc>,
    pub btc_price: PricePoint,
    pub composite: CompositeScore,
    pub summary: ScoreSummary,
    pub signals: Vec<MarketSignal>,
    pub hidden_qe: HiddenQeSignal,
    /// True when served from the last-good snapshot
    pub is_fallback: bool,
}

impl FeedPayload {
    /// Recompute the composite for another mode; signals are unchanged
    pub fn rescored(mut self, mode: ScoreMode) -> Self {
        if self.composite.mode != mode {
            self.composite = composite_score(&self.signals, mode);
            self.summary.text = ScoreSummary::for_score(self.composite.score).text;
        }
        self
    }
}

/// Every upstream client the feed fans out to
pub struct SignalSources {
    pub fred: Arc<FredClient>,
    pub yahoo: Arc<YahooClient>,
    pub funding: Arc<FundingRateClient>,
    pub fear_greed: Arc<FearGreedClient>,
    pub exchange_flow: Arc<ExchangeFlowClient>,
    pub etf_flow: Arc<EtfFlowClient>,
}

impl SignalSources {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let timeout = std::time::Duration::from_secs(settings.request_timeout_secs);
        let endpoints = &settings.endpoints;
        let etf_cache = Arc::new(TtlCache::new(Duration::seconds(settings.etf_cache_ttl_secs)));

        Ok(Self {
            fred: Arc::new(FredClient::new(
                endpoints.fred.clone(),
                settings.fred_api_key.clone(),
                timeout,
            )?),
            yahoo: Arc::new(YahooClient::new(endpoints.yahoo.clone(), timeout)?),
            funding: Arc::new(FundingRateClient::new(
                endpoints.binance.clone(),
                endpoints.okx.clone(),
                endpoints.coinglass.clone(),
                timeout,
            )?),
            fear_greed: Arc::new(FearGreedClient::new(endpoints.fear_greed.clone(), timeout)?),
            exchange_flow: Arc::new(ExchangeFlowClient::new(endpoints.coinmetrics.clone(), timeout)?),
            etf_flow: Arc::new(EtfFlowClient::new(
                settings.etf_gist_url.clone(),
                etf_cache,
                timeout,
            )?),
        })
    }
}

/// Builds the dashboard feed from all sources, falling back to the last good
/// snapshot when a fresh build fails.
pub struct SignalFeed {
    sources: SignalSources,
    classifier: HiddenQeClassifier,
    market: MarketThresholds,
    default_mode: ScoreMode,
    snapshots: Arc<dyn SnapshotStore>,
}

impl SignalFeed {
    pub fn new(
        sources: SignalSources,
        settings: &Settings,
        snapshots: Arc<dyn SnapshotStore>,
    ) -> Result<Self> {
        settings.market.validate()?;
        Ok(Self {
            sources,
            classifier: HiddenQeClassifier::new(settings.hidden_qe)?,
            market: settings.market,
            default_mode: settings.score_mode,
            snapshots,
        })
    }

    pub fn default_mode(&self) -> ScoreMode {
        self.default_mode
    }

    pub fn snapshot_store(&self) -> &str {
        self.snapshots.name()
    }

    /// Fresh payload, or the last good one marked as fallback
    pub async fn payload(&self, mode: ScoreMode) -> Result<FeedPayload> {
        match self.build(mode).await {
            Ok(payload) => Ok(payload),
            Err(e) => {
                warn!("Feed build failed: {}", e);
                match self.snapshots.load().await {
                    Ok(Some(mut snapshot)) => {
                        info!(snapshot_at = %snapshot.timestamp, "Serving last good feed");
                        snapshot.is_fallback = true;
                        snapshot.summary.title = "Showing previous data".to_string();
                        Ok(snapshot.rescored(mode))
                    }
                    Ok(None) => Err(e),
                    Err(cache_err) => {
                        warn!("Snapshot load failed: {}", cache_err);
                        Err(e)
                    }
                }
            }
        }
    }

    /// Fetch every source concurrently and score. Fails only when the BTC price is missing.
    pub async fn build(&self, mode: ScoreMode) -> Result<FeedPayload> {
        let started = Instant::now();
        let s = &self.sources;

        let (assets, rrp, tga, dxy, gold, btc, fear_greed, flow, funding, etf, hidden_qe) = futures::join!(
            s.fred.latest(TOTAL_ASSETS),
            s.fred.latest(REVERSE_REPO),
            s.fred.latest(TREASURY_GENERAL_ACCOUNT),
            s.yahoo.quote("dxy"),
            s.yahoo.quote("gold"),
            s.yahoo.btc_price(),
            s.fear_greed.latest(),
            s.exchange_flow.latest(),
            s.funding.latest_rate(),
            s.etf_flow.latest(),
            self.hidden_qe_latest(),
        );

        let btc_price = btc.map_err(|e| {
            SignalError::SourceUnhealthy(format!("BTC price unavailable: {}", e))
        })?;

        let assets = ok_or_warn("total assets", assets).flatten();
        let rrp = ok_or_warn("reverse repo", rrp).flatten();
        let tga = ok_or_warn("TGA", tga).flatten();
        let liquidity = match (assets, rrp, tga) {
            (Some(a), Some(r), Some(t)) => Some(normalizers::usd_liquidity(a, r, t)),
            _ => None,
        };

        let m = &self.market;
        let signals = vec![
            normalizers::liquidity_signal(liquidity, m),
            normalizers::dxy_signal(ok_or_warn("DXY", dxy).map(|q| q.value), m),
            normalizers::fear_greed_signal(
                ok_or_warn("Fear & Greed", fear_greed).map(|r| r.value as f64),
                m,
            ),
            normalizers::exchange_flow_signal(ok_or_warn("exchange flow", flow), m),
            normalizers::funding_rate_signal(ok_or_warn("funding rate", funding), m),
            normalizers::gold_signal(ok_or_warn("gold", gold).map(|q| q.change_pct), m),
            normalizers::etf_flow_signal(ok_or_warn("ETF flow", etf).as_ref(), m),
            normalizers::hidden_qe_signal(Some(&hidden_qe)),
        ];

        let composite = composite_score(&signals, mode);
        let summary = ScoreSummary::for_score(composite.score);

        let payload = FeedPayload {
            timestamp: Utc::now(),
            btc_price,
            composite,
            summary,
            signals,
            hidden_qe,
            is_fallback: false,
        };

        if let Err(e) = self.snapshots.save(&payload).await {
            warn!(store = self.snapshots.name(), "Snapshot save failed: {}", e);
        }

        info!(
            score = payload.composite.score,
            coverage = payload.composite.coverage,
            mode = mode.as_str(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Feed built"
        );
        Ok(payload)
    }

    /// Classify the latest week. Missing series degrade to unavailable conditions.
    pub async fn hidden_qe_latest(&self) -> HiddenQeSignal {
        let today = Utc::now().date_naive();
        let s = &self.sources;

        let (assets, treasury, swaps, usdjpy) = futures::join!(
            s.fred.recent(TOTAL_ASSETS, RECENT_WEEKS),
            s.fred.recent(TREASURY_HOLDINGS, RECENT_WEEKS),
            // enough history for the rolling z-score
            s.fred.recent(CENTRAL_BANK_SWAPS, ROLLING_WINDOW + RECENT_WEEKS),
            s.yahoo.weekly_history(
                USDJPY,
                today - Duration::weeks(RECENT_WEEKS as i64),
                today + Duration::days(1),
            ),
        );

        let swaps = ok_or_warn("central bank swaps", swaps).map(|points| DerivedSeries::from_points(&points));
        let swaps_latest = swaps.as_ref().and_then(|series| series.latest().copied());

        let inputs = HiddenQeInputs {
            total_assets: ok_or_warn("total assets", assets)
                .and_then(|points| MetricObservation::latest_of(&points)),
            treasury: ok_or_warn("treasury holdings", treasury)
                .and_then(|points| MetricObservation::latest_of(&points)),
            swaps: swaps_latest.map(|row| row.observation),
            swaps_stats: swaps_latest.and_then(|row| row.stats),
            usdjpy: ok_or_warn("USDJPY", usdjpy).and_then(|points| MetricObservation::latest_of(&points)),
        };

        let result = self.classifier.evaluate(&inputs);
        info!(
            signal = %result.signal,
            score = result.score,
            flags = %result.conditions.flags(),
            "Hidden QE evaluated"
        );
        result
    }

    /// Scan the last `years` years (clamped to 1..=20) for ON transitions
    pub async fn history(&self, years: u32) -> Result<HistoryScan> {
        let years = years.clamp(1, MAX_HISTORY_YEARS);
        let (start, end) = history_window(years, Utc::now().date_naive());
        let inputs = fetch_history_inputs(
            self.sources.fred.as_ref(),
            self.sources.yahoo.as_ref(),
            start,
            end,
        )
        .await?;

        let scan = HistoryScanner::new(self.classifier.clone()).scan(&inputs);
        info!(
            years,
            weeks = scan.evaluations.len(),
            transitions = scan.transitions.len(),
            watch_to_on = scan.watch_to_on.len(),
            "Hidden QE history scanned"
        );
        Ok(scan)
    }

    /// Health of every source, from recorded request outcomes
    pub async fn health_check(&self) -> Vec<SourceHealth> {
        let s = &self.sources;
        let (fred, yahoo, funding, fear_greed, flow, etf) = futures::join!(
            s.fred.health(),
            s.yahoo.health(),
            s.funding.health(),
            s.fear_greed.health(),
            s.exchange_flow.health(),
            s.etf_flow.health(),
        );
        vec![fred, yahoo, funding, fear_greed, flow, etf]
    }
}

/// `[end - years*365 days, end]`
pub fn history_window(years: u32, end: NaiveDate) -> (NaiveDate, NaiveDate) {
    (end - Duration::days(years as i64 * 365), end)
}

/// Fetch the four weekly histories for a scan.
///
/// A failing series is logged and left empty; the scan then reports its
/// condition as unavailable. Fails only when every balance-sheet series failed.
pub async fn fetch_history_inputs(
    fred: &dyn SeriesSource,
    fx: &dyn SeriesSource,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<HistoryInputs> {
    let (assets, treasury, swaps, usdjpy) = futures::join!(
        fred.history(TOTAL_ASSETS, start, end),
        fred.history(TREASURY_HOLDINGS, start, end),
        fred.history(CENTRAL_BANK_SWAPS, start, end),
        fx.history(USDJPY, start, end),
    );

    if let (Err(e), Err(_), Err(_)) = (&assets, &treasury, &swaps) {
        return Err(SignalError::SourceUnhealthy(format!(
            "{} history unavailable: {}",
            fred.name(),
            e
        )));
    }

    Ok(HistoryInputs {
        total_assets: ok_or_warn(TOTAL_ASSETS, assets).unwrap_or_default(),
        treasury: ok_or_warn(TREASURY_HOLDINGS, treasury).unwrap_or_default(),
        swaps: ok_or_warn(CENTRAL_BANK_SWAPS, swaps).unwrap_or_default(),
        usdjpy: ok_or_warn(USDJPY, usdjpy).unwrap_or_default(),
    })
}

fn ok_or_warn<T>(what: &str, result: Result<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("{} unavailable: {}", what, e);
            None
        }
    }
}

#[cfg(test)]
impl FeedPayload {
    pub(crate) fn sample_for_tests() -> Self {
        let signals = vec![
            MarketSignal::bullish("DXY", 2, "98.0".into(), "Weak dollar".into()),
            MarketSignal::neutral("Gold", "+0.2%".into(), "Gold flat".into()),
        ];
        let composite = composite_score(&signals, ScoreMode::Momentum);
        let classifier = HiddenQeClassifier::new(HiddenQeThresholds::default())
            .expect("default thresholds are valid");
        Self {
            timestamp: Utc::now(),
            btc_price: PricePoint {
                symbol: "BTC/USD".to_string(),
                price: rust_decimal::Decimal::new(6_500_000, 2),
                source: "yahoo".to_string(),
                timestamp: Utc::now(),
            },
            summary: ScoreSummary::for_score(composite.score),
            composite,
            signals,
            hidden_qe: classifier.evaluate(&HiddenQeInputs::default()),
            is_fallback: false,
        }
    }
}
