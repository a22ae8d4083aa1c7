// Normalization of raw indicator readings into market signals
use serde_json::json;

use crate::config::MarketThresholds;
use crate::signals::{HiddenQeSignal, MarketSignal, QeState};
use crate::types::{EtfFlowReport, ExchangeFlow};

pub const LIQUIDITY: &str = "USD Liquidity";
pub const DXY: &str = "DXY";
pub const FEAR_GREED: &str = "Fear & Greed";
pub const EXCHANGE_FLOW: &str = "Exchange Flow";
pub const FUNDING_RATE: &str = "Funding Rate";
pub const GOLD: &str = "Gold";
pub const ETF_FLOW: &str = "ETF Flow";
pub const HIDDEN_QE: &str = "Hidden QE";

/// Net USD liquidity in millions: Fed assets minus reverse repo (billions) minus TGA
pub fn usd_liquidity(total_assets: f64, reverse_repo_bn: f64, tga: f64) -> f64 {
    total_assets - reverse_repo_bn * 1000.0 - tga
}

/// USD liquidity ($M)
pub fn liquidity_signal(liquidity: Option<f64>, t: &MarketThresholds) -> MarketSignal {
    let Some(value) = finite(liquidity) else {
        return MarketSignal::unavailable(LIQUIDITY, "Fed balance sheet, RRP or TGA missing");
    };
    let display = format!("${:.2}T", value / 1e6);

    if value > t.liquidity_bullish_strong {
        MarketSignal::bullish(LIQUIDITY, 2, display, "Net liquidity well above normal".into())
    } else if value > t.liquidity_bullish_weak {
        MarketSignal::bullish(LIQUIDITY, 1, display, "Net liquidity above normal".into())
    } else if value < t.liquidity_bearish_strong {
        MarketSignal::bearish(LIQUIDITY, 2, display, "Net liquidity contracting".into())
    } else {
        MarketSignal::neutral(LIQUIDITY, display, "Net liquidity in normal range".into())
    }
}

/// Dollar index level
pub fn dxy_signal(dxy: Option<f64>, t: &MarketThresholds) -> MarketSignal {
    let Some(value) = finite(dxy) else {
        return MarketSignal::unavailable(DXY, "Dollar index quote unavailable");
    };
    let display = format!("{:.1}", value);

    if value > t.dxy_bearish_strong {
        MarketSignal::bearish(DXY, 2, display, "Very strong dollar".into())
    } else if value > t.dxy_bearish_weak {
        MarketSignal::bearish(DXY, 1, display, "Strong dollar".into())
    } else if value < t.dxy_bullish_strong {
        MarketSignal::bullish(DXY, 2, display, "Weak dollar".into())
    } else {
        MarketSignal::neutral(DXY, display, "Dollar in normal range".into())
    }
}

/// Fear & Greed index is contrarian: fear is bullish
pub fn fear_greed_signal(index: Option<f64>, t: &MarketThresholds) -> MarketSignal {
    let Some(value) = finite(index) else {
        return MarketSignal::unavailable(FEAR_GREED, "Fear & Greed index unavailable");
    };
    let display = format!("{:.0}", value);

    if value <= t.fear_greed_extreme_fear {
        MarketSignal::bullish(FEAR_GREED, 2, display, "Extreme fear".into())
    } else if value <= t.fear_greed_fear {
        MarketSignal::bullish(FEAR_GREED, 1, display, "Fear".into())
    } else if value >= t.fear_greed_extreme_greed {
        MarketSignal::bearish(FEAR_GREED, 2, display, "Extreme greed".into())
    } else if value >= t.fear_greed_greed {
        MarketSignal::bearish(FEAR_GREED, 1, display, "Greed".into())
    } else {
        MarketSignal::neutral(FEAR_GREED, display, "Sentiment neutral".into())
    }
}

/// Exchange net flow (BTC). Anything at or below the weak threshold is bearish.
pub fn exchange_flow_signal(flow: Option<ExchangeFlow>, t: &MarketThresholds) -> MarketSignal {
    let Some(flow) = flow.filter(|f| f.net_flow.is_finite()) else {
        return MarketSignal::unavailable(EXCHANGE_FLOW, "Exchange flow data unavailable");
    };
    let net = flow.net_flow;
    let display = format!("{:+.0} BTC", net);
    let details = json!({ "inflow": flow.inflow, "outflow": flow.outflow });

    let signal = if net > t.exchange_flow_bullish_strong {
        MarketSignal::bullish(EXCHANGE_FLOW, 2, display, "Heavy outflow from exchanges".into())
    } else if net > t.exchange_flow_bullish_weak {
        MarketSignal::bullish(EXCHANGE_FLOW, 1, display, "Coins leaving exchanges".into())
    } else if net < t.exchange_flow_bearish_strong {
        MarketSignal::bearish(EXCHANGE_FLOW, 2, display, "Heavy inflow to exchanges".into())
    } else {
        MarketSignal::bearish(EXCHANGE_FLOW, 1, display, "Coins moving to exchanges".into())
    };
    signal.with_details(details)
}

/// Perpetual funding rate in percent
pub fn funding_rate_signal(rate: Option<f64>, t: &MarketThresholds) -> MarketSignal {
    let Some(value) = finite(rate) else {
        return MarketSignal::unavailable(FUNDING_RATE, "Funding rate unavailable from all exchanges");
    };
    let display = format!("{:+.4}%", value);

    if value > t.funding_rate_overheat {
        MarketSignal::bearish(FUNDING_RATE, 1, display, "Longs overheated".into())
    } else if value < t.funding_rate_cooling {
        MarketSignal::bullish(FUNDING_RATE, 1, display, "Shorts crowded".into())
    } else {
        MarketSignal::neutral(FUNDING_RATE, display, "Funding balanced".into())
    }
}

/// Gold daily change in percent
pub fn gold_signal(change_pct: Option<f64>, t: &MarketThresholds) -> MarketSignal {
    let Some(change) = finite(change_pct) else {
        return MarketSignal::unavailable(GOLD, "Gold quote unavailable");
    };
    let display = format!("{:+.1}%", change);

    if change.abs() > t.gold_change_threshold {
        if change > 0.0 {
            MarketSignal::bullish(GOLD, 1, display, "Gold rallying".into())
        } else {
            MarketSignal::bearish(GOLD, 1, display, "Gold selling off".into())
        }
    } else {
        MarketSignal::neutral(GOLD, display, "Gold flat".into())
    }
}

/// Spot BTC ETF daily flow ($M)
pub fn etf_flow_signal(report: Option<&EtfFlowReport>, t: &MarketThresholds) -> MarketSignal {
    let Some(report) = report.filter(|r| r.total_daily_flow.is_finite()) else {
        return MarketSignal::unavailable(ETF_FLOW, "ETF flow report unavailable");
    };
    let flow = report.total_daily_flow;
    let display = format!("{:+.1}M USD", flow);
    let details = json!({ "date": report.date, "top_flows": report.top_flows });

    let signal = if flow >= t.etf_flow_bullish_strong {
        MarketSignal::bullish(ETF_FLOW, 2, display, "Strong ETF inflows".into())
    } else if flow >= t.etf_flow_bullish_weak {
        MarketSignal::bullish(ETF_FLOW, 1, display, "ETF inflows".into())
    } else if flow <= t.etf_flow_bearish_strong {
        MarketSignal::bearish(ETF_FLOW, 2, display, "Strong ETF outflows".into())
    } else if flow <= t.etf_flow_bearish_weak {
        MarketSignal::bearish(ETF_FLOW, 1, display, "ETF outflows".into())
    } else {
        MarketSignal::neutral(ETF_FLOW, display, "ETF flows muted".into())
    };
    signal.with_details(details)
}

/// Hidden-QE state as a market signal
pub fn hidden_qe_signal(result: Option<&HiddenQeSignal>) -> MarketSignal {
    let Some(result) = result.filter(|r| !r.conditions.all_unavailable()) else {
        return MarketSignal::unavailable(HIDDEN_QE, "No hidden-QE inputs available");
    };
    let display = format!("{} ({}/4)", result.signal, result.score);
    let details = json!({ "flags": result.conditions.flags() });

    let signal = match result.signal {
        QeState::On => MarketSignal::bullish(HIDDEN_QE, 2, display, result.explanation.clone()),
        QeState::Watch => MarketSignal::bullish(HIDDEN_QE, 1, display, result.explanation.clone()),
        QeState::Off => MarketSignal::neutral(HIDDEN_QE, display, result.explanation.clone()),
    };
    signal.with_details(details)
}

fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}
