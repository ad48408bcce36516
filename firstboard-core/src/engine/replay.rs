//! Session replay: drive the scheduler over recorded ticks.
//!
//! For every date that has ticks, the feed clock is moved to midnight for the
//! pre-market callback, then to each distinct tick timestamp in turn. The
//! paper broker is marked to the latest prices before every tick so orders
//! fill at what the strategy saw.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::broker::{AccountView, PaperBroker};
use crate::components::EntryOutcome;
use crate::data::{CandidateSource, InMemoryFeed, TradingCalendar};
use crate::domain::{PositionRecord, SellReason, Symbol};
use crate::engine::report::SessionReport;
use crate::engine::scheduler::{SessionContext, StrategyScheduler};
use crate::engine::state::StrategyState;

/// A filled order, flattened for reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeLine {
    pub timestamp: String,
    pub symbol: Symbol,
    /// Positive for buys, negative for sells.
    pub quantity: i64,
    pub price: f64,
    /// Exit rule, for sells.
    pub reason: Option<SellReason>,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub date: NaiveDate,
    pub candidates: usize,
    pub qualified: Vec<Symbol>,
    pub trades: Vec<TradeLine>,
    /// Display strings of every per-symbol error.
    pub errors: Vec<String>,
    pub report: SessionReport,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplaySummary {
    pub config_fingerprint: String,
    pub sessions: Vec<SessionSummary>,
    pub final_cash: f64,
    /// Strategy records still open after the last session.
    pub open_records: Vec<PositionRecord>,
}

impl ReplaySummary {
    pub fn trade_count(&self) -> usize {
        self.sessions.iter().map(|s| s.trades.len()).sum()
    }
}

/// Replay every recorded session in date order.
pub fn replay_sessions(
    scheduler: &StrategyScheduler,
    feed: &mut InMemoryFeed,
    calendar: &dyn TradingCalendar,
    candidates: &dyn CandidateSource,
    broker: &mut PaperBroker,
) -> ReplaySummary {
    let mut state = StrategyState::new();
    let mut sessions = Vec::new();

    for date in feed.session_dates() {
        if !calendar.is_trading_day(date) {
            warn!(%date, "ticks recorded on a non-trading day, skipped");
            continue;
        }
        sessions.push(replay_session(
            scheduler, &mut state, feed, calendar, candidates, broker, date,
        ));
    }

    let summary = ReplaySummary {
        config_fingerprint: scheduler.fingerprint().to_string(),
        final_cash: broker.available_cash(),
        open_records: state.positions.iter().cloned().collect(),
        sessions,
    };
    info!(
        sessions = summary.sessions.len(),
        trades = summary.trade_count(),
        cash = summary.final_cash,
        "replay complete"
    );
    summary
}

#[allow(clippy::too_many_arguments)]
fn replay_session(
    scheduler: &StrategyScheduler,
    state: &mut StrategyState,
    feed: &mut InMemoryFeed,
    calendar: &dyn TradingCalendar,
    candidates: &dyn CandidateSource,
    broker: &mut PaperBroker,
    date: NaiveDate,
) -> SessionSummary {
    broker.start_session(date);
    feed.set_clock(date.and_time(NaiveTime::MIN));

    let pre = {
        let mut ctx = SessionContext {
            feed: &*feed,
            calendar,
            broker: &mut *broker,
            candidates,
        };
        scheduler.before_trading(state, &mut ctx, date)
    };

    let mut qualified = Vec::new();
    let mut trades = Vec::new();
    let mut errors = Vec::new();

    for ts in feed.tick_times(date) {
        feed.set_clock(ts);
        for (symbol, price) in feed.last_prices() {
            broker.set_price(symbol, price);
        }

        let mut ctx = SessionContext {
            feed: &*feed,
            calendar,
            broker: &mut *broker,
            candidates,
        };
        let tick = scheduler.on_tick(state, &mut ctx, ts);
        let stamp = ts.format("%Y-%m-%d %H:%M:%S").to_string();

        if let Some(screen) = &tick.screen {
            qualified.clone_from(&screen.qualified);
        }
        for entry in &tick.entries {
            if let EntryOutcome::Bought { receipt, .. } = entry {
                trades.push(TradeLine {
                    timestamp: stamp.clone(),
                    symbol: receipt.symbol.clone(),
                    quantity: receipt.filled_quantity,
                    price: receipt.price,
                    reason: None,
                    detail: None,
                });
            }
        }
        for fill in &tick.exits {
            trades.push(TradeLine {
                timestamp: stamp.clone(),
                symbol: fill.receipt.symbol.clone(),
                quantity: fill.receipt.filled_quantity,
                price: fill.receipt.price,
                reason: Some(fill.signal.reason),
                detail: Some(fill.signal.detail.clone()),
            });
        }
        errors.extend(tick.errors.iter().map(|e| e.to_string()));
        errors.extend(tick.entries.iter().filter_map(|e| match e {
            EntryOutcome::Failed(err) => Some(err.to_string()),
            _ => None,
        }));
    }

    let report = {
        let mut ctx = SessionContext {
            feed: &*feed,
            calendar,
            broker: &mut *broker,
            candidates,
        };
        scheduler.after_trading(state, &mut ctx, date)
    };

    SessionSummary {
        date,
        candidates: pre.candidates.len(),
        qualified,
        trades,
        errors,
        report,
    }
}
