//! Broker collaborators: order execution and the live account view.
//!
//! Orders are synchronous from the engine's point of view: a call either
//! returns a receipt or an `ExecutionError`. There are no retries; a failed
//! order is logged by the caller and the opportunity is dropped for that tick.

pub mod paper;

pub use paper::PaperBroker;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::BrokerPosition;

/// Why an order was not executed.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ExecutionError {
    #[error("no price available for {symbol}")]
    NoPrice { symbol: String },

    #[error("order value {value:.2} for {symbol} buys less than one lot")]
    BelowLotSize { symbol: String, value: f64 },

    #[error("insufficient cash: need {needed:.2}, have {available:.2}")]
    InsufficientCash { needed: f64, available: f64 },

    #[error("cannot sell {requested} of {symbol}: only {available} sellable")]
    NotSellable {
        symbol: String,
        requested: u64,
        available: u64,
    },

    #[error("no position in {symbol}")]
    NoPosition { symbol: String },

    #[error("order for {symbol} rejected: {reason}")]
    Rejected { symbol: String, reason: String },
}

/// Acknowledgement of an executed order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderReceipt {
    pub order_id: u64,
    pub symbol: String,
    /// Signed share change: positive for buys, negative for sells.
    pub filled_quantity: i64,
    pub price: f64,
}

pub trait OrderExecutor {
    /// Buy `notional` worth of `symbol`.
    fn order_by_value(&mut self, symbol: &str, notional: f64) -> Result<OrderReceipt, ExecutionError>;

    /// Trade until the position holds `target_quantity` shares. 0 closes it.
    fn order_to_target(
        &mut self,
        symbol: &str,
        target_quantity: u64,
    ) -> Result<OrderReceipt, ExecutionError>;
}

/// Read-only view of the account the strategy trades.
pub trait AccountView {
    /// Open positions, in a stable order.
    fn positions(&self) -> Vec<BrokerPosition>;

    fn available_cash(&self) -> f64;
}

/// A broker is something that both executes and reports.
pub trait Broker: OrderExecutor + AccountView {
    fn as_executor(&mut self) -> &mut dyn OrderExecutor;
}

impl<T: OrderExecutor + AccountView> Broker for T {
    fn as_executor(&mut self) -> &mut dyn OrderExecutor {
        self
    }
}
