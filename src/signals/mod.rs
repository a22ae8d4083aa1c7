//! Signal core - condition evaluation, hidden-QE classification and
//! historical transition scanning.
//!
//! Everything here is synchronous and pure: inputs are already-fetched
//! observations and immutable thresholds.

pub mod conditions;
pub mod hidden_qe;
pub mod history;
pub mod market;
pub mod observation;

pub use conditions::{
    evaluate_swaps, evaluate_total_assets, evaluate_treasury, evaluate_usdjpy, ConditionKind,
    ConditionResult, ConditionStatus,
};
pub use hidden_qe::{HiddenQeClassifier, HiddenQeConditions, HiddenQeInputs, HiddenQeSignal, QeState};
pub use history::{DatedEvaluation, HistoryInputs, HistoryScan, HistoryScanner, TransitionEvent};
pub use market::{MarketSignal, SignalStatus};
pub use observation::{DerivedSeries, MetricObservation, RollingStats, RollingWindow};
