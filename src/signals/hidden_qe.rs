//! Hidden-QE classifier - four conditions to an OFF/WATCH/ON signal

use serde::{Deserialize, Serialize};

use super::conditions::{ConditionKind, ConditionResult};
use super::observation::{MetricObservation, RollingStats};
use crate::config::HiddenQeThresholds;
use crate::types::Result;

/// Classified hidden-QE state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QeState {
    Off,
    Watch,
    On,
}

impl QeState {
    pub fn as_str(&self) -> &'static str {
        match self {
            QeState::Off => "OFF",
            QeState::Watch => "WATCH",
            QeState::On => "ON",
        }
    }
}

impl std::fmt::Display for QeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Latest observations feeding one classification; any may be missing
#[derive(Debug, Clone, Default)]
pub struct HiddenQeInputs {
    pub total_assets: Option<MetricObservation>,
    pub treasury: Option<MetricObservation>,
    pub swaps: Option<MetricObservation>,
    pub swaps_stats: Option<RollingStats>,
    pub usdjpy: Option<MetricObservation>,
}

/// Per-condition results of one classification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HiddenQeConditions {
    pub total_assets: ConditionResult,
    pub treasury: ConditionResult,
    pub swaps: ConditionResult,
    pub usdjpy: ConditionResult,
}

impl HiddenQeConditions {
    pub fn iter(&self) -> impl Iterator<Item = &ConditionResult> {
        [&self.total_assets, &self.treasury, &self.swaps, &self.usdjpy].into_iter()
    }

    /// Number of met conditions
    pub fn score(&self) -> u8 {
        self.iter().filter(|c| c.met).count() as u8
    }

    /// True when no condition had data
    pub fn all_unavailable(&self) -> bool {
        self.iter().all(|c| !c.available)
    }

    /// Compact `Assets:+ Treasury:- ...` flags
    pub fn flags(&self) -> String {
        let flag = |c: &ConditionResult| match (c.available, c.met) {
            (false, _) => '?',
            (true, true) => '+',
            (true, false) => '-',
        };
        format!(
            "Assets:{}, Treasury:{}, Swaps:{}, USDJPY:{}",
            flag(&self.total_assets),
            flag(&self.treasury),
            flag(&self.swaps),
            flag(&self.usdjpy)
        )
    }
}

/// Result of one hidden-QE evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HiddenQeSignal {
    pub signal: QeState,
    pub score: u8,
    pub conditions: HiddenQeConditions,
    pub explanation: String,
}

/// Hidden-QE classifier with validated thresholds
#[derive(Debug, Clone)]
pub struct HiddenQeClassifier {
    thresholds: HiddenQeThresholds,
}

impl HiddenQeClassifier {
    /// Create a classifier; rejects invalid threshold sets
    pub fn new(thresholds: HiddenQeThresholds) -> Result<Self> {
        thresholds.validate()?;
        Ok(Self { thresholds })
    }

    /// Map a 0..=4 score to a state
    pub fn classify_score(&self, score: u8) -> QeState {
        if score >= self.thresholds.on_threshold {
            QeState::On
        } else if score >= self.thresholds.watch_threshold {
            QeState::Watch
        } else {
            QeState::Off
        }
    }

    /// Evaluate all four conditions and classify
    pub fn evaluate(&self, inputs: &HiddenQeInputs) -> HiddenQeSignal {
        let t = &self.thresholds;
        let conditions = HiddenQeConditions {
            total_assets: ConditionKind::TotalAssets.evaluate(inputs.total_assets.as_ref(), None, t),
            treasury: ConditionKind::Treasury.evaluate(inputs.treasury.as_ref(), None, t),
            swaps: ConditionKind::Swaps.evaluate(
                inputs.swaps.as_ref(),
                inputs.swaps_stats.as_ref(),
                t,
            ),
            usdjpy: ConditionKind::Usdjpy.evaluate(inputs.usdjpy.as_ref(), None, t),
        };

        let score = conditions.score();
        let signal = self.classify_score(score);
        let explanation = explain(signal, score, &conditions);

        HiddenQeSignal {
            signal,
            score,
            conditions,
            explanation,
        }
    }
}

fn explain(signal: QeState, score: u8, conditions: &HiddenQeConditions) -> String {
    let names = |pred: fn(&ConditionResult) -> bool| {
        conditions
            .iter()
            .filter(|c| pred(c))
            .map(|c| c.kind.display_name())
            .collect::<Vec<_>>()
    };
    let fired = names(|c| c.met);
    let missing = names(|c| !c.available);

    let mut text = format!("{} ({}/4)", signal, score);
    if fired.is_empty() {
        text.push_str(": no conditions met");
    } else {
        text.push_str(&format!(": met {}", fired.join(", ")));
    }
    if !missing.is_empty() {
        text.push_str(&format!("; no data for {}", missing.join(", ")));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn obs(value: f64, change_pct: f64, change_abs: f64) -> Option<MetricObservation> {
        Some(MetricObservation {
            value,
            prev_value: Some(value - change_abs),
            change_pct: Some(change_pct),
            change_abs: Some(change_abs),
            date: NaiveDate::from_ymd_opt(2024, 3, 6).unwrap(),
        })
    }

    fn all_met() -> HiddenQeInputs {
        HiddenQeInputs {
            total_assets: obs(7_500_000.0, 0.5, 37_000.0),
            treasury: obs(4_500_000.0, 0.1, 4500.0),
            swaps: obs(60_000.0, 20.0, 10_000.0),
            swaps_stats: None,
            usdjpy: obs(148.0, 1.2, 1.7),
        }
    }

    #[test]
    fn test_score_to_state_is_exhaustive() {
        let classifier = HiddenQeClassifier::new(HiddenQeThresholds::default()).unwrap();
        assert_eq!(classifier.classify_score(0), QeState::Off);
        assert_eq!(classifier.classify_score(1), QeState::Off);
        assert_eq!(classifier.classify_score(2), QeState::Watch);
        assert_eq!(classifier.classify_score(3), QeState::Watch);
        assert_eq!(classifier.classify_score(4), QeState::On);
    }

    #[test]
    fn test_all_conditions_met_is_on() {
        let classifier = HiddenQeClassifier::new(HiddenQeThresholds::default()).unwrap();
        let signal = classifier.evaluate(&all_met());
        assert_eq!(signal.score, 4);
        assert_eq!(signal.signal, QeState::On);
        assert!(signal.explanation.starts_with("ON (4/4)"));
    }

    #[test]
    fn test_missing_inputs_lower_score_and_are_named() {
        let classifier = HiddenQeClassifier::new(HiddenQeThresholds::default()).unwrap();
        let inputs = HiddenQeInputs {
            swaps: None,
            usdjpy: None,
            ..all_met()
        };
        let signal = classifier.evaluate(&inputs);
        assert_eq!(signal.score, 2);
        assert_eq!(signal.signal, QeState::Watch);
        assert!(!signal.conditions.swaps.available);
        assert!(signal.explanation.contains("no data for Central Bank Swaps, USDJPY"));
        assert_eq!(
            signal.conditions.flags(),
            "Assets:+, Treasury:+, Swaps:?, USDJPY:?"
        );
    }

    #[test]
    fn test_empty_inputs_still_produce_a_result() {
        let classifier = HiddenQeClassifier::new(HiddenQeThresholds::default()).unwrap();
        let signal = classifier.evaluate(&HiddenQeInputs::default());
        assert_eq!(signal.signal, QeState::Off);
        assert_eq!(signal.score, 0);
        assert!(signal.conditions.all_unavailable());
    }

    #[test]
    fn test_invalid_thresholds_rejected_at_construction() {
        let thresholds = HiddenQeThresholds {
            on_threshold: 2,
            watch_threshold: 3,
            ..Default::default()
        };
        assert!(HiddenQeClassifier::new(thresholds).is_err());
    }

    #[test]
    fn test_state_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&QeState::Watch).unwrap(), "\"WATCH\"");
    }
}
