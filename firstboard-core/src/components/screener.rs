//! Candidate screener: same-day price-action gate for first-board candidates.
//!
//! Checks run in a fixed order and stop at the first failure:
//! history, floor, ceiling, body ratio, extension, already held.
//! The ceiling check compares today's *high* and the extension check the
//! *current* price against yesterday's close; the two are independent.

use std::collections::HashSet;
use std::fmt;

use tracing::{debug, info, warn};

use crate::config::ScreenerThresholds;
use crate::data::MarketDataFeed;
use crate::domain::Symbol;
use crate::engine::EngineError;

/// Prices the screen reads for one candidate at the current tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceSnapshot {
    /// Close of the first-board (limit-up) session.
    pub yesterday_close: f64,
    pub today_open: f64,
    pub today_high: f64,
    pub today_low: f64,
    pub current_price: f64,
}

impl PriceSnapshot {
    /// `|current - open| / (high - low)`, or 0 when the range is empty.
    pub fn body_ratio(&self) -> f64 {
        let range = self.today_high - self.today_low;
        if range > 0.0 {
            (self.current_price - self.today_open).abs() / range
        } else {
            0.0
        }
    }
}

/// Why a candidate did not qualify.
#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    InsufficientHistory { available: usize },
    /// Traded below the previous limit-up close.
    GapDown { low: f64, floor: f64 },
    /// Already re-touched the limit today; chasing is not allowed.
    ReachedCeiling { high: f64, ceiling: f64 },
    /// Real body too large relative to the day's range.
    LargeBody { ratio: f64 },
    /// Already ran too far above yesterday's close.
    Overextended { price: f64, limit: f64 },
    AlreadyHeld,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InsufficientHistory { available } => {
                write!(f, "insufficient history ({available} bars)")
            }
            Self::GapDown { low, floor } => write!(f, "low {low:.2} < floor {floor:.2}"),
            Self::ReachedCeiling { high, ceiling } => {
                write!(f, "high {high:.2} >= ceiling {ceiling:.2}")
            }
            Self::LargeBody { ratio } => write!(f, "body ratio {ratio:.3} too large"),
            Self::Overextended { price, limit } => {
                write!(f, "price {price:.2} > extension limit {limit:.2}")
            }
            Self::AlreadyHeld => write!(f, "already held"),
        }
    }
}

/// Result of screening a candidate list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScreenOutcome {
    /// Qualified symbols in candidate order.
    pub qualified: Vec<Symbol>,
    pub rejected: Vec<(Symbol, Rejection)>,
    /// Candidates skipped because their data could not be read.
    pub errors: Vec<EngineError>,
}

#[derive(Debug, Clone, Default)]
pub struct CandidateScreener {
    thresholds: ScreenerThresholds,
}

impl CandidateScreener {
    pub fn new(thresholds: ScreenerThresholds) -> Self {
        Self { thresholds }
    }

    /// Apply the price checks and the held check to one snapshot.
    pub fn check(&self, snap: &PriceSnapshot, held: bool) -> Result<(), Rejection> {
        let t = &self.thresholds;

        let floor = snap.yesterday_close * t.floor_ratio;
        if snap.today_low < floor {
            return Err(Rejection::GapDown {
                low: snap.today_low,
                floor,
            });
        }

        let ceiling = snap.yesterday_close * t.ceiling_ratio;
        if snap.today_high >= ceiling {
            return Err(Rejection::ReachedCeiling {
                high: snap.today_high,
                ceiling,
            });
        }

        let ratio = snap.body_ratio();
        if ratio > t.max_body_ratio {
            return Err(Rejection::LargeBody { ratio });
        }

        let limit = snap.yesterday_close * t.max_extension_ratio;
        if snap.current_price > limit {
            return Err(Rejection::Overextended {
                price: snap.current_price,
                limit,
            });
        }

        if held {
            return Err(Rejection::AlreadyHeld);
        }
        Ok(())
    }

    /// Read one candidate's snapshot from the feed, then check it.
    pub fn screen_symbol(
        &self,
        symbol: &str,
        feed: &dyn MarketDataFeed,
        held: bool,
    ) -> Result<Result<(), Rejection>, EngineError> {
        let history = feed
            .daily_bars(symbol, self.thresholds.min_history_bars)
            .map_err(|e| EngineError::data(symbol, e))?;
        let Some(yesterday) = history
            .last()
            .filter(|_| history.len() >= self.thresholds.min_history_bars)
        else {
            return Ok(Err(Rejection::InsufficientHistory {
                available: history.len(),
            }));
        };

        let session = feed.session_bar(symbol).map_err(|e| EngineError::data(symbol, e))?;
        let current_price = feed.current_price(symbol).map_err(|e| EngineError::data(symbol, e))?;

        let snap = PriceSnapshot {
            yesterday_close: yesterday.close,
            today_open: session.open,
            today_high: session.high,
            today_low: session.low,
            current_price,
        };
        debug!(
            symbol,
            open = snap.today_open,
            low = snap.today_low,
            high = snap.today_high,
            price = current_price,
            "screening candidate"
        );
        Ok(self.check(&snap, held))
    }

    /// Screen every candidate. A data failure on one symbol is recorded and
    /// screening continues with the next.
    pub fn screen(
        &self,
        candidates: &[Symbol],
        feed: &dyn MarketDataFeed,
        held: &HashSet<Symbol>,
    ) -> ScreenOutcome {
        let mut outcome = ScreenOutcome::default();
        info!(count = candidates.len(), "screening candidates");

        for symbol in candidates {
            match self.screen_symbol(symbol, feed, held.contains(symbol)) {
                Ok(Ok(())) => {
                    info!(symbol = %symbol, "candidate qualifies");
                    outcome.qualified.push(symbol.clone());
                }
                Ok(Err(rejection)) => {
                    debug!(symbol = %symbol, %rejection, "candidate rejected");
                    outcome.rejected.push((symbol.clone(), rejection));
                }
                Err(e) => {
                    warn!(symbol = %symbol, error = %e, "screening skipped");
                    outcome.errors.push(e);
                }
            }
        }

        info!(qualified = outcome.qualified.len(), "screening complete");
        outcome
    }
}
