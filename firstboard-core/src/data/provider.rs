//! Market data and candidate source traits, with structured error types.
//!
//! The engine never fetches data itself. A platform adapter (or the in-memory
//! replay feed) implements these traits so the decision logic can be driven
//! by live quotes, recorded sessions, or hand-built fixtures in tests.

use chrono::NaiveDate;
use thiserror::Error;

use crate::domain::{DailyBar, SessionBar, Symbol};

/// Structured error types for data operations.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DataError {
    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("insufficient history for {symbol}: need {needed} bars, have {available}")]
    InsufficientHistory {
        symbol: String,
        needed: usize,
        available: usize,
    },

    #[error("no current price for {symbol}")]
    PriceUnavailable { symbol: String },

    #[error("no trades yet this session for {symbol}")]
    NoSessionData { symbol: String },

    #[error("feed clock not set: call set_clock before querying")]
    ClockNotSet,

    #[error("parse error: {0}")]
    Parse(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("data error: {0}")]
    Other(String),
}

/// Quote and history source for the decision engine.
///
/// All prices refer to the moment of the current tick. `daily_bars` returns
/// completed sessions only, most recent last; today's running bar is
/// `session_bar`.
pub trait MarketDataFeed {
    /// Up to `count` completed daily bars before today, most recent last.
    fn daily_bars(&self, symbol: &str, count: usize) -> Result<Vec<DailyBar>, DataError>;

    /// Today's open/high/low so far plus the last trade.
    fn session_bar(&self, symbol: &str) -> Result<SessionBar, DataError>;

    /// Latest traded price.
    fn current_price(&self, symbol: &str) -> Result<f64, DataError>;

    /// Limit-up price of the most recent completed session (the first board).
    fn limit_up_reference_price(&self, symbol: &str) -> Result<f64, DataError>;
}

/// Produces the externally screened universe once per session.
pub trait CandidateSource {
    fn candidates(&self, date: NaiveDate) -> Result<Vec<Symbol>, DataError>;
}

/// Candidate source backed by a fixed per-date list.
#[derive(Debug, Clone, Default)]
pub struct StaticCandidates {
    by_date: std::collections::BTreeMap<NaiveDate, Vec<Symbol>>,
}

impl StaticCandidates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a candidate for `date`, keeping insertion order.
    pub fn push(&mut self, date: NaiveDate, symbol: impl Into<Symbol>) {
        self.by_date.entry(date).or_default().push(symbol.into());
    }

    pub fn with(mut self, date: NaiveDate, symbols: &[&str]) -> Self {
        for s in symbols {
            self.push(date, *s);
        }
        self
    }
}

impl CandidateSource for StaticCandidates {
    fn candidates(&self, date: NaiveDate) -> Result<Vec<Symbol>, DataError> {
        Ok(self.by_date.get(&date).cloned().unwrap_or_default())
    }
}

/// Limit-up price for a session given the previous close, rounded to the cent.
pub fn limit_up_price(prev_close: f64, limit_ratio: f64) -> f64 {
    (prev_close * (1.0 + limit_ratio) * 100.0).round() / 100.0
}
