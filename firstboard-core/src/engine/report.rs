//! Reports returned by each scheduler callback.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::broker::OrderReceipt;
use crate::components::{EntryOutcome, ScreenOutcome};
use crate::domain::{BrokerPosition, SellSignal, Symbol};
use crate::engine::error::EngineError;
use crate::engine::state::{Eviction, SessionStats};

#[derive(Debug, Clone, PartialEq)]
pub struct PreMarketReport {
    pub date: NaiveDate,
    pub candidates: Vec<Symbol>,
    /// Broker positions carried into the session.
    pub holdings: Vec<BrokerPosition>,
    pub evictions: Vec<Eviction>,
    /// Held symbols the strategy has no record for.
    pub untracked: Vec<Symbol>,
    /// Set when the candidate source failed; the session runs with no candidates.
    pub candidate_error: Option<String>,
}

/// A position closed by an exit rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExitFill {
    pub signal: SellSignal,
    pub receipt: OrderReceipt,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub timestamp: NaiveDateTime,
    /// Present only on the tick that evaluated entries.
    pub screen: Option<ScreenOutcome>,
    pub entries: Vec<EntryOutcome>,
    pub exits: Vec<ExitFill>,
    /// Symbols skipped this tick. Failed sells keep their record.
    pub errors: Vec<EngineError>,
}

impl TickReport {
    pub fn new(timestamp: NaiveDateTime) -> Self {
        Self {
            timestamp,
            screen: None,
            entries: Vec::new(),
            exits: Vec::new(),
            errors: Vec::new(),
        }
    }
}

/// One holding at the end of the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldingSummary {
    pub symbol: Symbol,
    pub quantity: u64,
    pub cost_basis: f64,
    pub last_price: Option<f64>,
    pub profit_rate: Option<f64>,
    pub hold_days: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub date: NaiveDate,
    pub holdings: Vec<HoldingSummary>,
    pub cash: f64,
    pub stats: SessionStats,
}
