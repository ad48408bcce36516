//! Session scheduler: drives the decision components from clock callbacks.
//!
//! 1. `before_trading`: load candidates, reconcile records with the broker
//! 2. `on_tick`: entries once at or after `entry_time`, then exits on every tick
//! 3. `after_trading`: update new-high counters, summarize holdings
//!
//! Every collaborator is passed in through a [`SessionContext`]; the
//! scheduler itself holds only the immutable configuration.

use chrono::{NaiveDate, NaiveDateTime};
use std::collections::HashSet;
use tracing::{debug, error, info, warn};

use crate::broker::Broker;
use crate::components::{
    CandidateScreener, EntryAllocator, EntryOutcome, ExitInputs, ExitRuleEvaluator,
};
use crate::config::{ConfigError, ResistanceReference, StrategyConfig};
use crate::data::{hold_days, CandidateSource, MarketDataFeed, TradingCalendar};
use crate::domain::{SellSignal, Symbol};
use crate::engine::error::EngineError;
use crate::engine::report::{ExitFill, HoldingSummary, PreMarketReport, SessionReport, TickReport};
use crate::engine::state::StrategyState;
use crate::fingerprint::ConfigFingerprint;
use crate::indicators::ResistanceEstimator;

/// Collaborators for one scheduler callback.
pub struct SessionContext<'a> {
    pub feed: &'a dyn MarketDataFeed,
    pub calendar: &'a dyn TradingCalendar,
    pub broker: &'a mut dyn Broker,
    pub candidates: &'a dyn CandidateSource,
}

/// A position the exit pass decided to close, before the order is sent.
struct PendingExit {
    symbol: Symbol,
    hold_days: u32,
    signal: Option<SellSignal>,
}

#[derive(Debug, Clone)]
pub struct StrategyScheduler {
    config: StrategyConfig,
    fingerprint: ConfigFingerprint,
    screener: CandidateScreener,
    allocator: EntryAllocator,
    exits: ExitRuleEvaluator,
    estimator: ResistanceEstimator,
}

impl StrategyScheduler {
    /// Validates `config` before building the components from it.
    pub fn new(config: StrategyConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            fingerprint: config.fingerprint(),
            screener: CandidateScreener::new(config.screener.clone()),
            allocator: EntryAllocator::from_config(&config),
            exits: ExitRuleEvaluator::from_config(&config),
            estimator: ResistanceEstimator::new(config.resistance.clone()),
            config,
        })
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    pub fn fingerprint(&self) -> &ConfigFingerprint {
        &self.fingerprint
    }

    pub fn before_trading(
        &self,
        state: &mut StrategyState,
        ctx: &mut SessionContext<'_>,
        date: NaiveDate,
    ) -> PreMarketReport {
        state.begin_session(date);
        info!(%date, config = %self.fingerprint.short(), "session start");

        let candidate_error = match ctx.candidates.candidates(date) {
            Ok(list) => {
                state.candidates = list;
                None
            }
            Err(e) => {
                error!(%date, error = %e, "candidate source failed, no entries this session");
                Some(e.to_string())
            }
        };
        info!(count = state.candidates.len(), "candidates loaded");

        let holdings = ctx.broker.positions();
        for pos in &holdings {
            info!(
                symbol = %pos.symbol,
                quantity = pos.quantity,
                sellable = pos.available_quantity,
                cost = pos.cost_basis,
                "holding"
            );
        }

        let held: HashSet<Symbol> = holdings.iter().map(|p| p.symbol.clone()).collect();
        let evictions = state
            .positions
            .reconcile(&held, date, self.config.stale_record_days);
        for eviction in &evictions {
            info!(symbol = %eviction.symbol, reason = %eviction.reason, "record evicted");
        }

        let untracked: Vec<Symbol> = holdings
            .iter()
            .filter(|p| !state.positions.contains(&p.symbol))
            .map(|p| p.symbol.clone())
            .collect();
        for symbol in &untracked {
            warn!(symbol = %symbol, "held without a strategy record, exits will skip it");
        }

        PreMarketReport {
            date,
            candidates: state.candidates.clone(),
            holdings,
            evictions,
            untracked,
            candidate_error,
        }
    }

    pub fn on_tick(
        &self,
        state: &mut StrategyState,
        ctx: &mut SessionContext<'_>,
        now: NaiveDateTime,
    ) -> TickReport {
        let today = now.date();
        if state.session_date != Some(today) {
            warn!(%today, "tick outside a started session, starting one without candidates");
            state.begin_session(today);
        }
        state.stats.ticks += 1;
        let mut report = TickReport::new(now);

        if !state.entry_evaluated && now.time() >= self.config.entry_time {
            state.entry_evaluated = true;
            self.run_entries(state, ctx, today, &mut report);
        }
        self.run_exits(state, ctx, today, &mut report);

        let failed_entries = report
            .entries
            .iter()
            .filter(|e| matches!(e, EntryOutcome::Failed(_)))
            .count();
        state.stats.errors += report.errors.len() + failed_entries;
        report
    }

    pub fn after_trading(
        &self,
        state: &mut StrategyState,
        ctx: &mut SessionContext<'_>,
        date: NaiveDate,
    ) -> SessionReport {
        self.update_new_high_counters(state, ctx.feed, date);

        let holdings: Vec<HoldingSummary> = ctx
            .broker
            .positions()
            .into_iter()
            .map(|pos| {
                let last_price = match ctx.feed.current_price(&pos.symbol) {
                    Ok(p) => Some(p),
                    Err(e) => {
                        warn!(symbol = %pos.symbol, error = %e, "no closing price");
                        None
                    }
                };
                let profit_rate = last_price.and_then(|p| pos.profit_rate(p));
                let hold = state
                    .positions
                    .get(&pos.symbol)
                    .map(|rec| hold_days(ctx.calendar, rec.buy_date, date));
                info!(
                    symbol = %pos.symbol,
                    quantity = pos.quantity,
                    cost = pos.cost_basis,
                    last = ?last_price,
                    profit_pct = ?profit_rate.map(|r| r * 100.0),
                    hold_days = ?hold,
                    "end of session holding"
                );
                HoldingSummary {
                    symbol: pos.symbol,
                    quantity: pos.quantity,
                    cost_basis: pos.cost_basis,
                    last_price,
                    profit_rate,
                    hold_days: hold,
                }
            })
            .collect();

        let cash = ctx.broker.available_cash();
        info!(
            %date,
            holdings = holdings.len(),
            cash,
            buys = state.stats.buys,
            sells = state.stats.sells,
            errors = state.stats.errors,
            "session end"
        );
        SessionReport {
            date,
            holdings,
            cash,
            stats: state.stats,
        }
    }

    fn run_entries(
        &self,
        state: &mut StrategyState,
        ctx: &mut SessionContext<'_>,
        today: NaiveDate,
        report: &mut TickReport,
    ) {
        let positions = ctx.broker.positions();
        let held: HashSet<Symbol> = positions.iter().map(|p| p.symbol.clone()).collect();

        let screen = self.screener.screen(&state.candidates, ctx.feed, &held);
        let cash = ctx.broker.available_cash();
        let entries = self.allocator.execute(
            &screen.qualified,
            positions.len(),
            cash,
            today,
            ctx.feed,
            ctx.broker.as_executor(),
            &mut state.positions,
        );

        state.stats.buys += entries.iter().filter(|e| e.is_bought()).count();
        report.errors.extend(screen.errors.iter().cloned());
        report.screen = Some(screen);
        report.entries = entries;
    }

    /// Decide every exit from one snapshot of the positions, then send sells.
    fn run_exits(
        &self,
        state: &mut StrategyState,
        ctx: &mut SessionContext<'_>,
        today: NaiveDate,
        report: &mut TickReport,
    ) {
        let mut pending = Vec::new();
        for pos in ctx.broker.positions() {
            if !pos.is_sellable() {
                debug!(symbol = %pos.symbol, "nothing sellable yet");
                continue;
            }
            let Some(record) = state.positions.get(&pos.symbol) else {
                debug!(symbol = %pos.symbol, "no record, skipping exit rules");
                continue;
            };

            let held_days = hold_days(ctx.calendar, record.buy_date, today);
            let prices = ctx
                .feed
                .current_price(&pos.symbol)
                .and_then(|price| Ok((price, ctx.feed.session_bar(&pos.symbol)?.low)));
            let (price, today_low) = match prices {
                Ok(p) => p,
                Err(e) => {
                    warn!(symbol = %pos.symbol, error = %e, "exit check skipped");
                    report.errors.push(EngineError::data(&pos.symbol, e));
                    continue;
                }
            };

            let inputs = ExitInputs {
                symbol: &pos.symbol,
                hold_days: held_days,
                current_price: price,
                today_low,
                cost_basis: pos.cost_basis,
                limit_up_high: record.limit_up_high,
            };
            let reference = match self.config.resistance.reference {
                ResistanceReference::CurrentPrice => price,
                ResistanceReference::CostBasis => pos.cost_basis,
            };
            let signal = self.exits.evaluate(&inputs, || {
                self.estimator
                    .estimate(ctx.feed, &pos.symbol, reference)
                    .unwrap_or_else(|e| {
                        warn!(symbol = %pos.symbol, error = %e, "resistance unavailable");
                        None
                    })
            });
            pending.push(PendingExit {
                symbol: pos.symbol.clone(),
                hold_days: held_days,
                signal,
            });
        }

        for exit in pending {
            if let Some(record) = state.positions.get_mut(&exit.symbol) {
                record.hold_days_cache = Some(exit.hold_days);
            }
            let Some(signal) = exit.signal else {
                continue;
            };

            info!(
                symbol = %signal.symbol,
                reason = %signal.reason,
                detail = %signal.detail,
                "sell signal"
            );
            match ctx.broker.order_to_target(&signal.symbol, 0) {
                Ok(receipt) => {
                    state.positions.remove(&signal.symbol);
                    state.stats.sells += 1;
                    info!(
                        symbol = %signal.symbol,
                        quantity = receipt.filled_quantity,
                        price = receipt.price,
                        "position closed"
                    );
                    report.exits.push(ExitFill { signal, receipt });
                }
                Err(e) => {
                    warn!(symbol = %signal.symbol, error = %e, "sell failed, record kept");
                    report.errors.push(EngineError::execution(&signal.symbol, e));
                }
            }
        }
    }

    /// A session counts toward `days_without_new_high` when its high stays
    /// at or below the first-board limit price. Each date is counted once.
    fn update_new_high_counters(
        &self,
        state: &mut StrategyState,
        feed: &dyn MarketDataFeed,
        date: NaiveDate,
    ) {
        let symbols: Vec<Symbol> = state
            .positions
            .iter()
            .filter(|rec| rec.buy_date < date && rec.high_checked_on != Some(date))
            .map(|rec| rec.symbol.clone())
            .collect();

        for symbol in symbols {
            let high = match feed.session_bar(&symbol) {
                Ok(bar) => bar.high,
                Err(e) => {
                    debug!(symbol = %symbol, error = %e, "no session bar for new-high check");
                    continue;
                }
            };
            if let Some(record) = state.positions.get_mut(&symbol) {
                record.high_checked_on = Some(date);
                if high > record.limit_up_high {
                    record.days_without_new_high = 0;
                } else {
                    record.days_without_new_high += 1;
                }
            }
        }
    }
}
