//! Exit rules for an open first-board position.
//!
//! Six rules are checked in priority order and the first match wins:
//!
//! 1. `day1_stop_loss`: on hold day 1, price below `limit_up_high * 0.96`
//! 2. `later_stop_loss`: after day 1, price below `limit_up_high * 0.99`
//! 3. `dynamic_take_profit`: rebound of 7% or more from today's low
//! 4. `fixed_take_profit`: profit against cost basis at or above the threshold
//! 5. `max_hold_exceeded`: held for `max_hold_days` or longer
//! 6. `resistance_breach`: price at or above the estimated resistance level
//!
//! The resistance level reads sixty daily bars. It is passed as a closure and
//! only called when rules 1 to 5 all pass.

use crate::config::{ExitThresholds, StrategyConfig};
use crate::domain::{SellReason, SellSignal};

/// Prices for one position at one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExitInputs<'a> {
    pub symbol: &'a str,
    /// Trading days since entry, the entry day being 0.
    pub hold_days: u32,
    pub current_price: f64,
    pub today_low: f64,
    pub cost_basis: f64,
    pub limit_up_high: f64,
}

impl ExitInputs<'_> {
    fn profit_rate(&self) -> Option<f64> {
        (self.cost_basis > 0.0).then(|| self.current_price / self.cost_basis - 1.0)
    }
}

#[derive(Debug, Clone)]
pub struct ExitRuleEvaluator {
    thresholds: ExitThresholds,
    profit_threshold: f64,
    max_hold_days: u32,
}

impl Default for ExitRuleEvaluator {
    fn default() -> Self {
        Self::from_config(&StrategyConfig::default())
    }
}

impl ExitRuleEvaluator {
    pub fn new(thresholds: ExitThresholds, profit_threshold: f64, max_hold_days: u32) -> Self {
        Self {
            thresholds,
            profit_threshold,
            max_hold_days,
        }
    }

    pub fn from_config(config: &StrategyConfig) -> Self {
        Self::new(config.exit.clone(), config.profit_threshold, config.max_hold_days)
    }

    /// First rule that fires, if any. `resistance` is called at most once.
    pub fn evaluate<F>(&self, inputs: &ExitInputs<'_>, resistance: F) -> Option<SellSignal>
    where
        F: FnOnce() -> Option<f64>,
    {
        if let Some(signal) = self.price_rules(inputs) {
            return Some(signal);
        }

        let level = resistance()?;
        (inputs.current_price >= level).then(|| {
            SellSignal::new(
                inputs.symbol,
                SellReason::ResistanceBreach,
                format!(
                    "price {:.2} reached resistance {:.2}",
                    inputs.current_price, level
                ),
            )
        })
    }

    fn price_rules(&self, inputs: &ExitInputs<'_>) -> Option<SellSignal> {
        let t = &self.thresholds;
        let price = inputs.current_price;
        let signal = |reason, detail: String| Some(SellSignal::new(inputs.symbol, reason, detail));

        if inputs.hold_days == 1 {
            let stop = inputs.limit_up_high * t.day1_stop_ratio;
            if price < stop {
                return signal(
                    SellReason::Day1StopLoss,
                    format!(
                        "day 1 price {price:.2} below stop {stop:.2} (limit-up high {:.2})",
                        inputs.limit_up_high
                    ),
                );
            }
        } else if inputs.hold_days > 1 {
            let stop = inputs.limit_up_high * t.later_stop_ratio;
            if price < stop {
                return signal(
                    SellReason::LaterStopLoss,
                    format!(
                        "day {} price {price:.2} below stop {stop:.2} (limit-up high {:.2})",
                        inputs.hold_days, inputs.limit_up_high
                    ),
                );
            }
        }

        if inputs.today_low > 0.0 {
            let rebound = (price - inputs.today_low) / inputs.today_low;
            if rebound >= t.rebound_take_profit {
                let profit = inputs
                    .profit_rate()
                    .map(|p| format!("{:.2}%", p * 100.0))
                    .unwrap_or_else(|| "n/a".to_string());
                return signal(
                    SellReason::DynamicTakeProfit,
                    format!(
                        "rebound {:.2}% from low {:.2}, profit {profit}",
                        rebound * 100.0,
                        inputs.today_low
                    ),
                );
            }
        }

        if let Some(profit) = inputs.profit_rate() {
            if profit >= self.profit_threshold {
                return signal(
                    SellReason::FixedTakeProfit,
                    format!(
                        "profit {:.2}% >= {:.2}% (cost {:.2})",
                        profit * 100.0,
                        self.profit_threshold * 100.0,
                        inputs.cost_basis
                    ),
                );
            }
        }

        if inputs.hold_days >= self.max_hold_days {
            return signal(
                SellReason::MaxHoldExceeded,
                format!("held {} days >= {}", inputs.hold_days, self.max_hold_days),
            );
        }

        None
    }
}
