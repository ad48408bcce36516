//! Sell signals emitted by the exit rules.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a position is being closed. Declaration order is rule priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SellReason {
    Day1StopLoss,
    LaterStopLoss,
    DynamicTakeProfit,
    FixedTakeProfit,
    MaxHoldExceeded,
    ResistanceBreach,
}

impl SellReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Day1StopLoss => "day1_stop_loss",
            Self::LaterStopLoss => "later_stop_loss",
            Self::DynamicTakeProfit => "dynamic_take_profit",
            Self::FixedTakeProfit => "fixed_take_profit",
            Self::MaxHoldExceeded => "max_hold_exceeded",
            Self::ResistanceBreach => "resistance_breach",
        }
    }
}

impl fmt::Display for SellReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Instruction to close a position, with the numbers that fired the rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SellSignal {
    pub symbol: String,
    pub reason: SellReason,
    pub detail: String,
}

impl SellSignal {
    pub fn new(symbol: impl Into<String>, reason: SellReason, detail: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            reason,
            detail: detail.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_order_is_rule_priority() {
        assert!(SellReason::Day1StopLoss < SellReason::FixedTakeProfit);
        assert!(SellReason::MaxHoldExceeded < SellReason::ResistanceBreach);
    }

    #[test]
    fn reason_serializes_snake_case() {
        let json = serde_json::to_string(&SellReason::DynamicTakeProfit).unwrap();
        assert_eq!(json, "\"dynamic_take_profit\"");
        assert_eq!(SellReason::DynamicTakeProfit.to_string(), "dynamic_take_profit");
    }
}
