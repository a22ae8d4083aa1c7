//! Observation types and rolling statistics

use std::collections::VecDeque;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::types::SeriesPoint;

/// Maximum samples retained for rolling statistics (52 weeks)
pub const ROLLING_WINDOW: usize = 52;
/// Minimum samples before rolling statistics are defined
pub const MIN_ROLLING_SAMPLES: usize = 10;

/// Latest reading of one metric and its change against the previous reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricObservation {
    pub value: f64,
    pub prev_value: Option<f64>,
    pub change_pct: Option<f64>,
    pub change_abs: Option<f64>,
    pub date: NaiveDate,
}

impl MetricObservation {
    /// Build an observation; `change_pct` stays `None` when the previous
    /// value is missing or zero.
    pub fn new(date: NaiveDate, value: f64, prev_value: Option<f64>) -> Self {
        let change_abs = prev_value.map(|prev| value - prev);
        let change_pct = prev_value
            .filter(|prev| *prev != 0.0)
            .map(|prev| (value - prev) / prev * 100.0)
            .filter(|pct| pct.is_finite());

        Self {
            value,
            prev_value,
            change_pct,
            change_abs,
            date,
        }
    }

    /// Observation from the last two points of an ascending series
    pub fn latest_of(points: &[SeriesPoint]) -> Option<Self> {
        let last = points.last()?;
        let prev = points.len().checked_sub(2).map(|i| points[i].value);
        Some(Self::new(last.date, last.value, prev))
    }
}

/// Mean, sample standard deviation and z-score of the newest sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RollingStats {
    pub mean: f64,
    pub stddev: f64,
    pub zscore: f64,
}

/// Bounded trailing window; memory stays constant however long the series
#[derive(Debug, Clone)]
pub struct RollingWindow {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl RollingWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, value: f64) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(value);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Stats with the most recent sample as the scored value.
    ///
    /// `None` below `MIN_ROLLING_SAMPLES` or when the window is flat.
    pub fn stats(&self) -> Option<RollingStats> {
        let n = self.samples.len();
        if n < MIN_ROLLING_SAMPLES {
            return None;
        }
        let latest = *self.samples.back()?;
        let mean = self.samples.iter().sum::<f64>() / n as f64;
        let variance = self
            .samples
            .iter()
            .map(|v| (v - mean).powi(2))
            .sum::<f64>()
            / (n - 1) as f64;
        let stddev = variance.sqrt();
        if !(stddev > 0.0) {
            return None;
        }

        Some(RollingStats {
            mean,
            stddev,
            zscore: (latest - mean) / stddev,
        })
    }
}

impl Default for RollingWindow {
    fn default() -> Self {
        Self::new(ROLLING_WINDOW)
    }
}

/// A series with per-point change and rolling statistics, ascending by date
#[derive(Debug, Clone, Default)]
pub struct DerivedSeries {
    rows: Vec<DerivedPoint>,
}

/// One point of a derived series
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DerivedPoint {
    pub observation: MetricObservation,
    pub stats: Option<RollingStats>,
}

impl DerivedSeries {
    /// Derive changes and rolling stats; input is sorted by date first
    pub fn from_points(points: &[SeriesPoint]) -> Self {
        let mut sorted = points.to_vec();
        sorted.sort_by_key(|p| p.date);

        let mut window = RollingWindow::default();
        let mut prev: Option<f64> = None;
        let rows = sorted
            .iter()
            .map(|p| {
                window.push(p.value);
                let row = DerivedPoint {
                    observation: MetricObservation::new(p.date, p.value, prev),
                    stats: window.stats(),
                };
                prev = Some(p.value);
                row
            })
            .collect();

        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.rows.iter().map(|r| r.observation.date)
    }

    pub fn latest(&self) -> Option<&DerivedPoint> {
        self.rows.last()
    }

    /// Last point dated on or before `date`
    pub fn as_of(&self, date: NaiveDate) -> Option<&DerivedPoint> {
        let idx = self.rows.partition_point(|r| r.observation.date <= date);
        idx.checked_sub(1).map(|i| &self.rows[i])
    }

    /// Point closest to `date`; ties resolve to the later point
    pub fn nearest(&self, date: NaiveDate) -> Option<&DerivedPoint> {
        let idx = self.rows.partition_point(|r| r.observation.date < date);
        let after = self.rows.get(idx);
        let before = idx.checked_sub(1).and_then(|i| self.rows.get(i));

        match (before, after) {
            (Some(b), Some(a)) => {
                let to_before = (date - b.observation.date).num_days();
                let to_after = (a.observation.date - date).num_days();
                if to_after <= to_before {
                    Some(a)
                } else {
                    Some(b)
                }
            }
            (Some(b), None) => Some(b),
            (None, a) => a,
        }
    }
}
