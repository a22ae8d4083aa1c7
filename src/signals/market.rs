//! Market signals - one directional reading per indicator

use serde::{Deserialize, Serialize};

/// Direction of a market signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalStatus {
    Bullish,
    Bearish,
    Neutral,
}

/// One independent market indicator, weighted 1 or 2
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSignal {
    pub name: String,
    pub status: SignalStatus,
    pub weight: u8,
    /// Unavailable signals are reported but excluded from scoring
    pub available: bool,
    pub reason: String,
    pub value_display: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl MarketSignal {
    pub fn bullish(name: impl Into<String>, weight: u8, value_display: String, reason: String) -> Self {
        Self::available(name, SignalStatus::Bullish, weight, value_display, reason)
    }

    pub fn bearish(name: impl Into<String>, weight: u8, value_display: String, reason: String) -> Self {
        Self::available(name, SignalStatus::Bearish, weight, value_display, reason)
    }

    pub fn neutral(name: impl Into<String>, value_display: String, reason: String) -> Self {
        Self::available(name, SignalStatus::Neutral, 1, value_display, reason)
    }

    /// No data: neutral, weight 1, excluded from scoring
    pub fn unavailable(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: SignalStatus::Neutral,
            weight: 1,
            available: false,
            reason: reason.into(),
            value_display: "N/A".to_string(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    fn available(
        name: impl Into<String>,
        status: SignalStatus,
        weight: u8,
        value_display: String,
        reason: String,
    ) -> Self {
        Self {
            name: name.into(),
            status,
            weight: weight.clamp(1, 2),
            available: true,
            reason,
            value_display,
            details: None,
        }
    }
}
