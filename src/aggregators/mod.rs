// Composite market score - weighted blend of independent market signals
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::signals::{MarketSignal, SignalStatus};

/// Coverage (%) below which the composite carries a warning
pub const LOW_COVERAGE_THRESHOLD: f64 = 80.0;

/// How neutral signals influence the score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreMode {
    /// Neutral signals do not dilute the score
    #[default]
    Momentum,
    /// Neutral signals pull the score toward zero
    Conservative,
}

impl ScoreMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScoreMode::Momentum => "momentum",
            ScoreMode::Conservative => "conservative",
        }
    }

    /// Parse a mode name; unknown values fall back to momentum
    pub fn parse_or_default(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "conservative" => ScoreMode::Conservative,
            "momentum" => ScoreMode::Momentum,
            other => {
                warn!(mode = other, "Unknown score mode, falling back to momentum");
                ScoreMode::Momentum
            }
        }
    }

    fn formula(&self) -> &'static str {
        match self {
            ScoreMode::Momentum => "(bull_w - bear_w) / max(bull_w + bear_w, 1) * 100",
            ScoreMode::Conservative => "(bull_w - bear_w) / (bull_w + bear_w + neut_w) * 100",
        }
    }
}

/// Weighted directional score with confidence and coverage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeScore {
    /// -100 (all bearish) to 100 (all bullish)
    pub score: f64,
    /// Share of available weight that is directional, 0-100
    pub confidence: f64,
    /// Share of signals with usable data, 0-100
    pub coverage: f64,
    pub bullish_weight: u32,
    pub bearish_weight: u32,
    pub neutral_weight: u32,
    pub mode: ScoreMode,
    /// Formula actually applied
    pub formula: String,
    pub available_signals: usize,
    pub total_signals: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl CompositeScore {
    pub fn is_low_coverage(&self) -> bool {
        self.coverage < LOW_COVERAGE_THRESHOLD
    }
}

/// Blend market signals into one score. Pure: same input, same output.
pub fn composite_score(signals: &[MarketSignal], mode: ScoreMode) -> CompositeScore {
    let total = signals.len();
    let (available, unavailable): (Vec<&MarketSignal>, Vec<&MarketSignal>) =
        signals.iter().partition(|s| s.available);

    let coverage = if total > 0 {
        available.len() as f64 / total as f64 * 100.0
    } else {
        0.0
    };

    let weight_of = |status: SignalStatus| -> u32 {
        available
            .iter()
            .filter(|s| s.status == status)
            .map(|s| s.weight as u32)
            .sum()
    };
    let bull_w = weight_of(SignalStatus::Bullish);
    let bear_w = weight_of(SignalStatus::Bearish);
    let neut_w = weight_of(SignalStatus::Neutral);

    let active_w = bull_w + bear_w;
    let total_w = active_w + neut_w;
    let net = bull_w as f64 - bear_w as f64;

    let confidence = if total_w > 0 {
        active_w as f64 / total_w as f64 * 100.0
    } else {
        0.0
    };

    let score = match mode {
        ScoreMode::Momentum => net / active_w.max(1) as f64 * 100.0,
        ScoreMode::Conservative if total_w > 0 => net / total_w as f64 * 100.0,
        ScoreMode::Conservative => 0.0,
    };

    let warning = (coverage < LOW_COVERAGE_THRESHOLD).then(|| {
        let missing: Vec<&str> = unavailable.iter().map(|s| s.name.as_str()).collect();
        warn!(
            coverage = coverage,
            missing = ?missing,
            "Composite score computed on partial data"
        );
        format!(
            "Low confidence: only {}/{} signals available ({:.0}% coverage){}",
            available.len(),
            total,
            coverage,
            if missing.is_empty() {
                String::new()
            } else {
                format!("; missing {}", missing.join(", "))
            }
        )
    });

    CompositeScore {
        score,
        confidence,
        coverage,
        bullish_weight: bull_w,
        bearish_weight: bear_w,
        neutral_weight: neut_w,
        mode,
        formula: mode.formula().to_string(),
        available_signals: available.len(),
        total_signals: total,
        warning,
    }
}

/// Dashboard headline for a composite score
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreSummary {
    pub title: String,
    pub text: String,
}

impl ScoreSummary {
    pub fn for_score(score: f64) -> Self {
        let text = if score > 30.0 {
            "Bullish signals dominate. A softer dollar and improving sentiment are tailwinds."
        } else if score > 10.0 {
            "Mildly bullish. The trend is up, but watch for overheating."
        } else if score < -30.0 {
            "Bearish signals dominate. Macro uncertainty argues for caution on the short term."
        } else if score < -10.0 {
            "Mildly bearish. Mind downside risk and consider trimming exposure."
        } else {
            "No clear direction. Waiting is reasonable."
        };

        Self {
            title: "Analysis summary".to_string(),
            text: text.to_string(),
        }
    }
}
