//! Historical transition scanner
//!
//! Replays the hidden-QE classifier week by week and records the dates where
//! the signal switches to ON.

use std::collections::BTreeSet;
use std::io::{self, Write};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::conditions::ConditionResult;
use super::hidden_qe::{HiddenQeClassifier, HiddenQeConditions, HiddenQeInputs, QeState};
use super::observation::DerivedSeries;
use crate::types::SeriesPoint;

/// Weekly histories of the four hidden-QE metrics
#[derive(Debug, Clone, Default)]
pub struct HistoryInputs {
    pub total_assets: Vec<SeriesPoint>,
    pub treasury: Vec<SeriesPoint>,
    pub swaps: Vec<SeriesPoint>,
    pub usdjpy: Vec<SeriesPoint>,
}

/// Classification on one scan date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatedEvaluation {
    pub date: NaiveDate,
    pub signal: QeState,
    pub score: u8,
    pub conditions: HiddenQeConditions,
}

/// A scan date where the signal became ON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionEvent {
    pub date: NaiveDate,
    pub score: u8,
    pub from: QeState,
    pub conditions: HiddenQeConditions,
}

/// Output of one scan
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoryScan {
    pub evaluations: Vec<DatedEvaluation>,
    /// Any non-ON state to ON
    pub transitions: Vec<TransitionEvent>,
    /// WATCH to ON only; a subset of `transitions`
    pub watch_to_on: Vec<TransitionEvent>,
}

impl HistoryScan {
    pub const CSV_HEADER: &'static str = "date,signal,score,total_assets,treasury,swaps,usdjpy";

    /// One row per scan date; condition columns are 1 (met), 0 (not met) or empty (no data)
    pub fn write_csv<W: Write>(&self, mut out: W) -> io::Result<()> {
        writeln!(out, "{}", Self::CSV_HEADER)?;
        for eval in &self.evaluations {
            let c = &eval.conditions;
            writeln!(
                out,
                "{},{},{},{},{},{},{}",
                eval.date,
                eval.signal,
                eval.score,
                csv_flag(&c.total_assets),
                csv_flag(&c.treasury),
                csv_flag(&c.swaps),
                csv_flag(&c.usdjpy)
            )?;
        }
        out.flush()
    }
}

fn csv_flag(condition: &ConditionResult) -> &'static str {
    match (condition.available, condition.met) {
        (false, _) => "",
        (true, true) => "1",
        (true, false) => "0",
    }
}

/// Replays a classifier across weekly histories
#[derive(Debug, Clone)]
pub struct HistoryScanner {
    classifier: HiddenQeClassifier,
}

impl HistoryScanner {
    pub fn new(classifier: HiddenQeClassifier) -> Self {
        Self { classifier }
    }

    /// Classify every scan date and collect ON transitions.
    ///
    /// Scan dates are the union of the total-assets, treasury and swaps dates.
    /// Those three resolve to their last point on or before the scan date;
    /// USDJPY, sampled on its own calendar, resolves to the nearest point.
    pub fn scan(&self, inputs: &HistoryInputs) -> HistoryScan {
        let total_assets = DerivedSeries::from_points(&inputs.total_assets);
        let treasury = DerivedSeries::from_points(&inputs.treasury);
        let swaps = DerivedSeries::from_points(&inputs.swaps);
        let usdjpy = DerivedSeries::from_points(&inputs.usdjpy);

        let dates: BTreeSet<NaiveDate> = total_assets
            .dates()
            .chain(treasury.dates())
            .chain(swaps.dates())
            .collect();

        let evaluations: Vec<DatedEvaluation> = dates
            .into_iter()
            .map(|date| {
                let swaps_row = swaps.as_of(date);
                let inputs = HiddenQeInputs {
                    total_assets: total_assets.as_of(date).map(|r| r.observation),
                    treasury: treasury.as_of(date).map(|r| r.observation),
                    swaps: swaps_row.map(|r| r.observation),
                    swaps_stats: swaps_row.and_then(|r| r.stats),
                    usdjpy: usdjpy.nearest(date).map(|r| r.observation),
                };
                let result = self.classifier.evaluate(&inputs);
                DatedEvaluation {
                    date,
                    signal: result.signal,
                    score: result.score,
                    conditions: result.conditions,
                }
            })
            .collect();

        let (transitions, watch_to_on) = find_transitions(&evaluations);

        HistoryScan {
            evaluations,
            transitions,
            watch_to_on,
        }
    }
}

/// Single pass over ascending evaluations, starting from OFF.
///
/// `prev != ON && cur == ON` marks a transition; `prev == WATCH && cur == ON`
/// additionally marks a WATCH-to-ON transition.
pub fn find_transitions(
    evaluations: &[DatedEvaluation],
) -> (Vec<TransitionEvent>, Vec<TransitionEvent>) {
    let mut transitions = Vec::new();
    let mut watch_to_on = Vec::new();
    let mut prev = QeState::Off;

    for eval in evaluations {
        if eval.signal == QeState::On && prev != QeState::On {
            let event = TransitionEvent {
                date: eval.date,
                score: eval.score,
                from: prev,
                conditions: eval.conditions.clone(),
            };
            if prev == QeState::Watch {
                watch_to_on.push(event.clone());
            }
            transitions.push(event);
        }
        prev = eval.signal;
    }

    (transitions, watch_to_on)
}
