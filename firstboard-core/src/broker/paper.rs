//! Paper broker: fills every order at the last marked price.
//!
//! Tracks only what the broker interfaces expose: cash, share counts,
//! sellable share counts and cost basis. Buys settle T+1: shares bought in a
//! session become sellable when the next session starts.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::NaiveDate;

use super::{AccountView, ExecutionError, OrderExecutor, OrderReceipt};
use crate::domain::BrokerPosition;

#[derive(Debug, Clone, PartialEq)]
struct PaperPosition {
    quantity: u64,
    available: u64,
    cost_basis: f64,
}

#[derive(Debug, Clone)]
pub struct PaperBroker {
    cash: f64,
    lot_size: u64,
    positions: BTreeMap<String, PaperPosition>,
    prices: HashMap<String, f64>,
    rejected: BTreeSet<String>,
    session: Option<NaiveDate>,
    next_order_id: u64,
}

impl PaperBroker {
    /// Exchange-standard board lot of 100 shares.
    pub const DEFAULT_LOT: u64 = 100;

    pub fn new(cash: f64) -> Self {
        Self::with_lot_size(cash, Self::DEFAULT_LOT)
    }

    pub fn with_lot_size(cash: f64, lot_size: u64) -> Self {
        assert!(lot_size > 0, "lot_size must be > 0");
        Self {
            cash,
            lot_size,
            positions: BTreeMap::new(),
            prices: HashMap::new(),
            rejected: BTreeSet::new(),
            session: None,
            next_order_id: 1,
        }
    }

    /// Start a new session: everything held before today becomes sellable.
    pub fn start_session(&mut self, date: NaiveDate) {
        if self.session != Some(date) {
            for pos in self.positions.values_mut() {
                pos.available = pos.quantity;
            }
            self.session = Some(date);
        }
    }

    pub fn set_price(&mut self, symbol: impl Into<String>, price: f64) {
        self.prices.insert(symbol.into(), price);
    }

    /// Seed a position that is already settled (sellable today).
    pub fn seed_position(&mut self, symbol: impl Into<String>, quantity: u64, cost_basis: f64) {
        self.positions.insert(
            symbol.into(),
            PaperPosition {
                quantity,
                available: quantity,
                cost_basis,
            },
        );
    }

    /// Reject every future order for `symbol`.
    pub fn reject_orders_for(&mut self, symbol: impl Into<String>) {
        self.rejected.insert(symbol.into());
    }

    fn price_of(&self, symbol: &str) -> Result<f64, ExecutionError> {
        if self.rejected.contains(symbol) {
            return Err(ExecutionError::Rejected {
                symbol: symbol.to_string(),
                reason: "symbol blocked".into(),
            });
        }
        self.prices
            .get(symbol)
            .copied()
            .filter(|p| *p > 0.0)
            .ok_or_else(|| ExecutionError::NoPrice {
                symbol: symbol.to_string(),
            })
    }

    fn receipt(&mut self, symbol: &str, filled_quantity: i64, price: f64) -> OrderReceipt {
        let order_id = self.next_order_id;
        self.next_order_id += 1;
        OrderReceipt {
            order_id,
            symbol: symbol.to_string(),
            filled_quantity,
            price,
        }
    }

    fn buy(&mut self, symbol: &str, quantity: u64, price: f64) -> Result<OrderReceipt, ExecutionError> {
        let cost = quantity as f64 * price;
        if cost > self.cash {
            return Err(ExecutionError::InsufficientCash {
                needed: cost,
                available: self.cash,
            });
        }
        self.cash -= cost;
        let pos = self.positions.entry(symbol.to_string()).or_insert(PaperPosition {
            quantity: 0,
            available: 0,
            cost_basis: 0.0,
        });
        let total = pos.quantity + quantity;
        pos.cost_basis = (pos.cost_basis * pos.quantity as f64 + cost) / total as f64;
        pos.quantity = total;
        Ok(self.receipt(symbol, quantity as i64, price))
    }

    fn sell(&mut self, symbol: &str, quantity: u64, price: f64) -> Result<OrderReceipt, ExecutionError> {
        let pos = self
            .positions
            .get_mut(symbol)
            .ok_or_else(|| ExecutionError::NoPosition {
                symbol: symbol.to_string(),
            })?;
        if quantity > pos.available {
            return Err(ExecutionError::NotSellable {
                symbol: symbol.to_string(),
                requested: quantity,
                available: pos.available,
            });
        }
        pos.quantity -= quantity;
        pos.available -= quantity;
        if pos.quantity == 0 {
            self.positions.remove(symbol);
        }
        self.cash += quantity as f64 * price;
        Ok(self.receipt(symbol, -(quantity as i64), price))
    }
}

impl OrderExecutor for PaperBroker {
    fn order_by_value(&mut self, symbol: &str, notional: f64) -> Result<OrderReceipt, ExecutionError> {
        let price = self.price_of(symbol)?;
        let lots = (notional / (price * self.lot_size as f64)).floor();
        if lots < 1.0 {
            return Err(ExecutionError::BelowLotSize {
                symbol: symbol.to_string(),
                value: notional,
            });
        }
        self.buy(symbol, lots as u64 * self.lot_size, price)
    }

    fn order_to_target(
        &mut self,
        symbol: &str,
        target_quantity: u64,
    ) -> Result<OrderReceipt, ExecutionError> {
        let price = self.price_of(symbol)?;
        let held = self.positions.get(symbol).map_or(0, |p| p.quantity);
        match held.cmp(&target_quantity) {
            std::cmp::Ordering::Greater => self.sell(symbol, held - target_quantity, price),
            std::cmp::Ordering::Less => self.buy(symbol, target_quantity - held, price),
            std::cmp::Ordering::Equal if held == 0 => Err(ExecutionError::NoPosition {
                symbol: symbol.to_string(),
            }),
            std::cmp::Ordering::Equal => Ok(self.receipt(symbol, 0, price)),
        }
    }
}

impl AccountView for PaperBroker {
    fn positions(&self) -> Vec<BrokerPosition> {
        self.positions
            .iter()
            .map(|(symbol, p)| BrokerPosition {
                symbol: symbol.clone(),
                quantity: p.quantity,
                available_quantity: p.available,
                cost_basis: p.cost_basis,
            })
            .collect()
    }

    fn available_cash(&self) -> f64 {
        self.cash
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn broker() -> PaperBroker {
        let mut b = PaperBroker::new(100_000.0);
        b.set_price("A", 10.0);
        b
    }

    #[test]
    fn buy_rounds_down_to_lots() {
        let mut b = broker();
        let r = b.order_by_value("A", 25_050.0).unwrap();
        assert_eq!(r.filled_quantity, 2500);
        assert!((b.available_cash() - 75_000.0).abs() < 1e-6);
    }

    #[test]
    fn buy_below_one_lot_fails_without_state_change() {
        let mut b = broker();
        let err = b.order_by_value("A", 999.0).unwrap_err();
        assert!(matches!(err, ExecutionError::BelowLotSize { .. }));
        assert!(b.positions().is_empty());
        assert_eq!(b.available_cash(), 100_000.0);
    }

    #[test]
    fn same_day_buy_is_locked_until_next_session() {
        let mut b = broker();
        b.start_session(NaiveDate::from_ymd_opt(2024, 3, 5).unwrap());
        b.order_by_value("A", 10_000.0).unwrap();
        assert_eq!(b.positions()[0].available_quantity, 0);
        assert!(matches!(
            b.order_to_target("A", 0),
            Err(ExecutionError::NotSellable { .. })
        ));

        b.start_session(NaiveDate::from_ymd_opt(2024, 3, 6).unwrap());
        assert_eq!(b.positions()[0].available_quantity, 1000);
        let r = b.order_to_target("A", 0).unwrap();
        assert_eq!(r.filled_quantity, -1000);
        assert!(b.positions().is_empty());
        assert!((b.available_cash() - 100_000.0).abs() < 1e-6);
    }

    #[test]
    fn cost_basis_is_average_price() {
        let mut b = broker();
        b.order_by_value("A", 1_000.0).unwrap();
        b.set_price("A", 12.0);
        b.order_by_value("A", 1_200.0).unwrap();
        assert!((b.positions()[0].cost_basis - 11.0).abs() < 1e-9);
    }

    #[test]
    fn rejected_symbol_fails() {
        let mut b = broker();
        b.reject_orders_for("A");
        assert!(matches!(
            b.order_by_value("A", 10_000.0),
            Err(ExecutionError::Rejected { .. })
        ));
    }

    #[test]
    fn missing_price_fails() {
        let mut b = broker();
        assert!(matches!(
            b.order_by_value("B", 10_000.0),
            Err(ExecutionError::NoPrice { .. })
        ));
    }

    #[test]
    fn insufficient_cash_fails() {
        let mut b = PaperBroker::new(500.0);
        b.set_price("A", 10.0);
        assert!(matches!(
            b.order_by_value("A", 5_000.0),
            Err(ExecutionError::InsufficientCash { .. })
        ));
    }
}
