//! Entry allocator: equal-split cash across the qualified candidates.
//!
//! Each buy gets `remaining_cash / (buy_count - i)`, so cash left over by a
//! skipped or failed candidate rolls into the later ones. Cash is only
//! decremented once an order succeeds.

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::broker::{OrderExecutor, OrderReceipt};
use crate::config::StrategyConfig;
use crate::data::{limit_up_price, MarketDataFeed};
use crate::domain::{PositionRecord, Symbol};
use crate::engine::{EngineError, PositionBook};

/// What happened to one candidate during entry.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryOutcome {
    Bought {
        receipt: OrderReceipt,
        allocation: f64,
        limit_up_high: f64,
    },
    /// Sealed at the limit price; orders would not fill.
    SkippedAtLimitUp { symbol: Symbol, price: f64, limit: f64 },
    SkippedBelowMinimum { symbol: Symbol, allocation: f64 },
    Failed(EngineError),
}

impl EntryOutcome {
    pub fn symbol(&self) -> &str {
        match self {
            Self::Bought { receipt, .. } => &receipt.symbol,
            Self::SkippedAtLimitUp { symbol, .. } | Self::SkippedBelowMinimum { symbol, .. } => {
                symbol
            }
            Self::Failed(e) => e.symbol(),
        }
    }

    pub fn is_bought(&self) -> bool {
        matches!(self, Self::Bought { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntryAllocator {
    pub max_positions: usize,
    pub min_order_value: f64,
    pub limit_up_ratio: f64,
    pub limit_up_tolerance: f64,
}

impl Default for EntryAllocator {
    fn default() -> Self {
        Self::from_config(&StrategyConfig::default())
    }
}

impl EntryAllocator {
    pub fn from_config(config: &StrategyConfig) -> Self {
        Self {
            max_positions: config.max_positions,
            min_order_value: config.min_order_value,
            limit_up_ratio: config.limit_up_ratio,
            limit_up_tolerance: config.limit_up_tolerance,
        }
    }

    /// Free position slots given `open` held positions.
    pub fn slots(&self, open: usize) -> usize {
        self.max_positions.saturating_sub(open)
    }

    /// Cash for the `i`-th of `buy_count` buys.
    pub fn allocation(remaining_cash: f64, i: usize, buy_count: usize) -> f64 {
        let left = buy_count.saturating_sub(i);
        if left == 0 {
            0.0
        } else {
            remaining_cash / left as f64
        }
    }

    /// Is `price` sealed at today's limit, given yesterday's close?
    pub fn is_at_limit_up(&self, price: f64, yesterday_close: f64) -> bool {
        let limit = limit_up_price(yesterday_close, self.limit_up_ratio);
        (price - limit).abs() <= self.limit_up_tolerance
    }

    /// Buy into the qualified candidates, recording a position for each fill.
    pub fn execute(
        &self,
        qualified: &[Symbol],
        open_positions: usize,
        cash: f64,
        today: NaiveDate,
        feed: &dyn MarketDataFeed,
        executor: &mut dyn OrderExecutor,
        book: &mut PositionBook,
    ) -> Vec<EntryOutcome> {
        let slots = self.slots(open_positions);
        if slots == 0 {
            info!(open_positions, max = self.max_positions, "no free slots, skipping entries");
            return Vec::new();
        }
        let buy_count = qualified.len().min(slots);
        if buy_count == 0 {
            return Vec::new();
        }
        info!(buy_count, slots, cash, "allocating entries");

        let mut remaining = cash;
        let mut outcomes = Vec::with_capacity(buy_count);
        for (i, symbol) in qualified.iter().take(buy_count).enumerate() {
            let outcome = match self.enter(symbol, remaining, i, buy_count, today, feed, executor) {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(symbol = %symbol, error = %e, "entry failed");
                    EntryOutcome::Failed(e)
                }
            };

            if let EntryOutcome::Bought {
                receipt,
                allocation,
                limit_up_high,
            } = &outcome
            {
                remaining -= allocation;
                book.open(PositionRecord::new(symbol.clone(), today, *limit_up_high));
                info!(
                    symbol = %symbol,
                    quantity = receipt.filled_quantity,
                    price = receipt.price,
                    allocation,
                    limit_up_high,
                    "bought"
                );
            }
            outcomes.push(outcome);
        }
        outcomes
    }

    #[allow(clippy::too_many_arguments)]
    fn enter(
        &self,
        symbol: &str,
        remaining: f64,
        i: usize,
        buy_count: usize,
        today: NaiveDate,
        feed: &dyn MarketDataFeed,
        executor: &mut dyn OrderExecutor,
    ) -> Result<EntryOutcome, EngineError> {
        let data_err = |e| EngineError::data(symbol, e);

        let price = feed.current_price(symbol).map_err(data_err)?;
        let history = feed.daily_bars(symbol, 1).map_err(data_err)?;
        if let Some(yesterday) = history.last() {
            if self.is_at_limit_up(price, yesterday.close) {
                let limit = limit_up_price(yesterday.close, self.limit_up_ratio);
                debug!(symbol, price, limit, "sealed at limit-up, skipping");
                return Ok(EntryOutcome::SkippedAtLimitUp {
                    symbol: symbol.to_string(),
                    price,
                    limit,
                });
            }
        }

        let allocation = Self::allocation(remaining, i, buy_count);
        if allocation < self.min_order_value {
            debug!(symbol, allocation, min = self.min_order_value, "allocation below minimum");
            return Ok(EntryOutcome::SkippedBelowMinimum {
                symbol: symbol.to_string(),
                allocation,
            });
        }

        // Read before ordering so a data failure leaves no half-open position.
        let limit_up_high = feed.limit_up_reference_price(symbol).map_err(data_err)?;

        let receipt = executor
            .order_by_value(symbol, allocation)
            .map_err(|e| EngineError::execution(symbol, e))?;
        debug!(symbol, %today, order_id = receipt.order_id, "entry order filled");
        Ok(EntryOutcome::Bought {
            receipt,
            allocation,
            limit_up_high,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocation_splits_remaining_cash() {
        assert_eq!(EntryAllocator::allocation(100_000.0, 0, 2), 50_000.0);
        assert_eq!(EntryAllocator::allocation(50_000.0, 1, 2), 50_000.0);
        assert_eq!(EntryAllocator::allocation(100_000.0, 1, 2), 100_000.0);
        assert_eq!(EntryAllocator::allocation(100_000.0, 2, 2), 0.0);
    }

    #[test]
    fn slots_saturate() {
        let alloc = EntryAllocator::default();
        assert_eq!(alloc.slots(0), 2);
        assert_eq!(alloc.slots(2), 0);
        assert_eq!(alloc.slots(5), 0);
    }

    #[test]
    fn limit_up_detection_uses_tolerance() {
        let alloc = EntryAllocator::default();
        assert!(alloc.is_at_limit_up(11.00, 10.0));
        assert!(alloc.is_at_limit_up(10.995, 10.0));
        assert!(!alloc.is_at_limit_up(10.95, 10.0));
    }
}
