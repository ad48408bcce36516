//! Position bookkeeping: the strategy's own records and the broker's view.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Strategy-side bookkeeping for one held symbol.
///
/// Created when an entry order succeeds and removed when the position is
/// closed or evicted as stale. The broker knows nothing about it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionRecord {
    pub symbol: String,
    pub buy_date: NaiveDate,
    /// Limit-up price of the first-board session, the high-water reference
    /// for the stop-loss rules.
    pub limit_up_high: f64,
    /// Hold days as of the last exit evaluation. `None` until evaluated.
    pub hold_days_cache: Option<u32>,
    /// Sessions since entry without a print above `limit_up_high`.
    pub days_without_new_high: u32,
    /// Session last counted into `days_without_new_high`.
    #[serde(default)]
    pub high_checked_on: Option<NaiveDate>,
}

impl PositionRecord {
    pub fn new(symbol: impl Into<String>, buy_date: NaiveDate, limit_up_high: f64) -> Self {
        Self {
            symbol: symbol.into(),
            buy_date,
            limit_up_high,
            hold_days_cache: None,
            days_without_new_high: 0,
            high_checked_on: None,
        }
    }

    /// Calendar (not trading) days elapsed since the buy date.
    pub fn calendar_age(&self, today: NaiveDate) -> i64 {
        (today - self.buy_date).num_days()
    }
}

/// The broker's live view of one open position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerPosition {
    pub symbol: String,
    pub quantity: u64,
    /// Shares that may be sold this session (settlement rules lock same-day buys).
    pub available_quantity: u64,
    /// Average price paid for the held quantity.
    pub cost_basis: f64,
}

impl BrokerPosition {
    pub fn is_sellable(&self) -> bool {
        self.available_quantity > 0
    }

    /// Profit rate against cost basis, `None` when cost basis is not positive.
    pub fn profit_rate(&self, current_price: f64) -> Option<f64> {
        (self.cost_basis > 0.0).then(|| current_price / self.cost_basis - 1.0)
    }
}
