//! Hidden-QE conditions
//!
//! Each condition reads one metric observation and a threshold set and
//! returns a `ConditionResult`. Missing data is reported as unavailable, never
//! as a failed condition.

use serde::{Deserialize, Serialize};

use super::observation::{MetricObservation, RollingStats};
use crate::config::HiddenQeThresholds;

/// Swap balances arrive in USD millions; thresholds are in billions
const MILLIONS_PER_BILLION: f64 = 1000.0;

/// The four conditions of the hidden-QE thesis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionKind {
    /// Central-bank balance sheet growing
    TotalAssets,
    /// Domestic treasury purchases not driving the growth
    Treasury,
    /// Central-bank liquidity swap lines surging
    Swaps,
    /// Yen weakening or intervention-level volatility
    Usdjpy,
}

impl ConditionKind {
    pub const ALL: [ConditionKind; 4] = [
        ConditionKind::TotalAssets,
        ConditionKind::Treasury,
        ConditionKind::Swaps,
        ConditionKind::Usdjpy,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            ConditionKind::TotalAssets => "Total Assets",
            ConditionKind::Treasury => "Treasury Holdings",
            ConditionKind::Swaps => "Central Bank Swaps",
            ConditionKind::Usdjpy => "USDJPY",
        }
    }

    /// Evaluate this condition against its observation
    pub fn evaluate(
        &self,
        obs: Option<&MetricObservation>,
        stats: Option<&RollingStats>,
        thresholds: &HiddenQeThresholds,
    ) -> ConditionResult {
        match self {
            ConditionKind::TotalAssets => {
                evaluate_total_assets(obs, thresholds.total_assets_threshold)
            }
            ConditionKind::Treasury => evaluate_treasury(obs, thresholds.treasury_threshold),
            ConditionKind::Swaps => evaluate_swaps(
                obs,
                stats,
                thresholds.swaps_pct_threshold,
                thresholds.swaps_abs_threshold,
                thresholds.swaps_zscore_threshold,
                thresholds.swaps_min_value,
            ),
            ConditionKind::Usdjpy => evaluate_usdjpy(
                obs,
                thresholds.usdjpy_weakening_threshold,
                thresholds.usdjpy_high_level,
                thresholds.usdjpy_high_volatility,
            ),
        }
    }
}

/// Status label of an evaluated condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionStatus {
    /// Balance sheet grew past the threshold
    Expanding,
    /// Balance sheet flat or shrinking
    NotExpanding,
    /// Treasury holdings growth below the threshold
    Subdued,
    /// Treasury holdings growing at or above the threshold
    Active,
    Surge,
    Normal,
    Weakening,
    InterventionWatch,
    Strengthening,
    Stable,
    #[serde(rename = "data unavailable")]
    DataUnavailable,
}

/// Outcome of one condition evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionResult {
    pub kind: ConditionKind,
    pub met: bool,
    /// False when the observation could not be resolved
    pub available: bool,
    pub status: ConditionStatus,
    pub reason: String,
    /// Readings behind the decision, for display
    pub indicators: Vec<String>,
}

impl ConditionResult {
    pub fn met(
        kind: ConditionKind,
        status: ConditionStatus,
        reason: String,
        indicators: Vec<String>,
    ) -> Self {
        Self {
            kind,
            met: true,
            available: true,
            status,
            reason,
            indicators,
        }
    }

    pub fn not_met(
        kind: ConditionKind,
        status: ConditionStatus,
        reason: String,
        indicators: Vec<String>,
    ) -> Self {
        Self {
            kind,
            met: false,
            available: true,
            status,
            reason,
            indicators,
        }
    }

    pub fn unavailable(kind: ConditionKind) -> Self {
        Self {
            kind,
            met: false,
            available: false,
            status: ConditionStatus::DataUnavailable,
            reason: "data unavailable".to_string(),
            indicators: Vec::new(),
        }
    }

    fn decide(
        kind: ConditionKind,
        met: bool,
        status: ConditionStatus,
        reason: String,
        indicators: Vec<String>,
    ) -> Self {
        if met {
            Self::met(kind, status, reason, indicators)
        } else {
            Self::not_met(kind, status, reason, indicators)
        }
    }
}

/// Observation and its weekly % change, or `None` when either is missing
fn with_change(obs: Option<&MetricObservation>) -> Option<(&MetricObservation, f64)> {
    obs.and_then(|o| o.change_pct.map(|pct| (o, pct)))
}

/// Met iff weekly change is strictly above `threshold`
pub fn evaluate_total_assets(obs: Option<&MetricObservation>, threshold: f64) -> ConditionResult {
    let kind = ConditionKind::TotalAssets;
    let Some((obs, change)) = with_change(obs) else {
        return ConditionResult::unavailable(kind);
    };

    let met = change > threshold;
    let (status, reason) = if met {
        (
            ConditionStatus::Expanding,
            format!("weekly change {:+.2}% > {:.2}%", change, threshold),
        )
    } else {
        (
            ConditionStatus::NotExpanding,
            format!("weekly change {:+.2}% <= {:.2}%", change, threshold),
        )
    };
    let indicators = vec![
        format!("value ${:.0}M", obs.value),
        format!("change {:+.2}%", change),
    ];

    ConditionResult::decide(kind, met, status, reason, indicators)
}

/// Met iff weekly change is strictly below `threshold`.
///
/// Polarity is inverted relative to total assets: balance-sheet growth that is
/// not explained by treasury buying points at indirect channels.
pub fn evaluate_treasury(obs: Option<&MetricObservation>, threshold: f64) -> ConditionResult {
    let kind = ConditionKind::Treasury;
    let Some((obs, change)) = with_change(obs) else {
        return ConditionResult::unavailable(kind);
    };

    let met = change < threshold;
    let (status, reason) = if met {
        (
            ConditionStatus::Subdued,
            format!("weekly change {:+.2}% < {:.2}%", change, threshold),
        )
    } else {
        (
            ConditionStatus::Active,
            format!("weekly change {:+.2}% >= {:.2}%", change, threshold),
        )
    };
    let indicators = vec![
        format!("value ${:.0}M", obs.value),
        format!("change {:+.2}%", change),
    ];

    ConditionResult::decide(kind, met, status, reason, indicators)
}

/// Swap-line surge: either a large % and absolute increase on a meaningful
/// base, or an anomalous 52-week z-score. Both paths are evaluated and OR-ed.
pub fn evaluate_swaps(
    obs: Option<&MetricObservation>,
    stats: Option<&RollingStats>,
    pct_threshold: f64,
    abs_threshold: f64,
    zscore_threshold: f64,
    min_value: f64,
) -> ConditionResult {
    let kind = ConditionKind::Swaps;
    let Some((obs, change_pct)) = with_change(obs) else {
        return ConditionResult::unavailable(kind);
    };

    let value_b = obs.value / MILLIONS_PER_BILLION;
    let change_abs_b = obs.change_abs.unwrap_or(0.0) / MILLIONS_PER_BILLION;
    let zscore = stats.map(|s| s.zscore).unwrap_or(0.0);

    let growth_path = value_b >= min_value
        && change_pct >= pct_threshold
        && change_abs_b >= abs_threshold;
    // No min_value gate on the z-score path.
    let zscore_path = zscore >= zscore_threshold;

    let mut fired = Vec::new();
    if growth_path {
        fired.push(format!(
            "growth: {:+.1}% and {:+.2}B on ${:.2}B base",
            change_pct, change_abs_b, value_b
        ));
    }
    if zscore_path {
        fired.push(format!("z-score {:.2} >= {:.2}", zscore, zscore_threshold));
    }

    let met = growth_path || zscore_path;
    let (status, reason) = if met {
        (ConditionStatus::Surge, fired.join("; "))
    } else {
        (
            ConditionStatus::Normal,
            format!(
                "no surge: {:+.1}% / {:+.2}B on ${:.2}B base, z-score {:.2}",
                change_pct, change_abs_b, value_b, zscore
            ),
        )
    };
    let indicators = vec![
        format!("value ${:.2}B", value_b),
        format!("change {:+.1}%", change_pct),
        format!("change {:+.2}B", change_abs_b),
        format!("z-score {:.2}", zscore),
    ];

    ConditionResult::decide(kind, met, status, reason, indicators)
}

/// Yen weakening, or high level combined with high volatility
pub fn evaluate_usdjpy(
    obs: Option<&MetricObservation>,
    weakening_threshold: f64,
    high_level: f64,
    high_volatility: f64,
) -> ConditionResult {
    let kind = ConditionKind::Usdjpy;
    let Some((obs, change)) = with_change(obs) else {
        return ConditionResult::unavailable(kind);
    };

    let volatility = change.abs();
    let weakening = change >= weakening_threshold;
    let intervention_watch = obs.value >= high_level && volatility >= high_volatility;

    let (status, reason) = if weakening {
        (
            ConditionStatus::Weakening,
            format!("yen weakening: {:+.2}% >= {:.2}%", change, weakening_threshold),
        )
    } else if intervention_watch {
        (
            ConditionStatus::InterventionWatch,
            format!(
                "level {:.2} >= {:.2} with volatility {:.2}% >= {:.2}%",
                obs.value, high_level, volatility, high_volatility
            ),
        )
    } else if change < 0.0 {
        (
            ConditionStatus::Strengthening,
            format!("yen strengthening: {:+.2}%", change),
        )
    } else {
        (ConditionStatus::Stable, format!("stable: {:+.2}%", change))
    };
    let indicators = vec![
        format!("level {:.2}", obs.value),
        format!("change {:+.2}%", change),
        format!("volatility {:.2}%", volatility),
    ];

    ConditionResult::decide(kind, weakening || intervention_watch, status, reason, indicators)
}
