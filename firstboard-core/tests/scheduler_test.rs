//! Integration tests for the session scheduler.
//!
//! Tests:
//! 1. Full cycle: buy at the entry time, day-1 stop the next session
//! 2. Entries run once per session and never before the entry time
//! 3. Same-day buys are never exit-evaluated
//! 4. A failed sell keeps the record for the next tick
//! 5. Pre-market reconciliation evicts unheld and stale records
//! 6. A candidate source failure is reported and the session continues
//! 7. End-of-session report and new-high counters
//! 8. One symbol's data failure does not stop exits for the others
//! 9. A repeated end-of-session call counts a date once
//! 10. An invalid config is rejected at construction

use chrono::{NaiveDate, NaiveDateTime};

use firstboard_core::broker::{AccountView, PaperBroker};
use firstboard_core::components::EntryOutcome;
use firstboard_core::config::{ConfigError, StrategyConfig};
use firstboard_core::data::{
    CandidateSource, DataError, InMemoryFeed, StaticCandidates, WeekdayCalendar,
};
use firstboard_core::domain::{DailyBar, PositionRecord, SellReason, Tick};
use firstboard_core::engine::{
    EngineError, EvictionReason, SessionContext, StrategyScheduler, StrategyState, TickReport,
};

// ──────────────────────────────────────────────
// Fixture
// ──────────────────────────────────────────────

const SYM: &str = "600001.SH";

fn d(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
}

fn at(day: u32, hhmm: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(&format!("2024-03-{day:02} {hhmm}"), "%Y-%m-%d %H:%M").unwrap()
}

fn bar(day: u32, open: f64, high: f64, low: f64, close: f64) -> DailyBar {
    DailyBar {
        symbol: SYM.into(),
        date: d(day),
        open,
        high,
        low,
        close,
        volume: 3_000_000,
    }
}

fn tick(day: u32, hhmm: &str, price: f64) -> Tick {
    Tick {
        symbol: SYM.into(),
        timestamp: at(day, hhmm),
        price,
    }
}

/// First board on Mon 4th (9.09 -> 10.00), a quiet Tue 5th, a gap down on Wed 6th.
struct Fixture {
    scheduler: StrategyScheduler,
    state: StrategyState,
    feed: InMemoryFeed,
    calendar: WeekdayCalendar,
    candidates: StaticCandidates,
    broker: PaperBroker,
}

impl Fixture {
    fn new() -> Self {
        let mut feed = InMemoryFeed::default();
        feed.add_daily_bars([
            bar(1, 9.00, 9.12, 8.95, 9.09),
            bar(4, 9.30, 10.00, 9.25, 10.00),
            bar(5, 10.10, 10.30, 10.02, 10.15),
        ]);
        feed.add_ticks([
            tick(5, "09:30", 10.10),
            tick(5, "10:00", 10.30),
            tick(5, "11:00", 10.02),
            tick(5, "14:50", 10.12),
            tick(5, "14:55", 10.15),
            tick(5, "14:57", 10.16),
            tick(6, "09:30", 9.50),
            tick(6, "09:31", 9.45),
        ]);
        Self {
            scheduler: StrategyScheduler::new(StrategyConfig::default()).unwrap(),
            state: StrategyState::new(),
            feed,
            calendar: WeekdayCalendar::new(),
            candidates: StaticCandidates::new().with(d(5), &[SYM]),
            broker: PaperBroker::new(100_000.0),
        }
    }

    fn pre_market(&mut self, day: u32) -> firstboard_core::engine::PreMarketReport {
        self.broker.start_session(d(day));
        self.feed.set_clock(d(day).and_hms_opt(0, 0, 0).unwrap());
        let mut ctx = SessionContext {
            feed: &self.feed,
            calendar: &self.calendar,
            broker: &mut self.broker,
            candidates: &self.candidates,
        };
        self.scheduler.before_trading(&mut self.state, &mut ctx, d(day))
    }

    fn tick(&mut self, day: u32, hhmm: &str) -> TickReport {
        let now = at(day, hhmm);
        self.feed.set_clock(now);
        for (symbol, price) in self.feed.last_prices() {
            self.broker.set_price(symbol, price);
        }
        let mut ctx = SessionContext {
            feed: &self.feed,
            calendar: &self.calendar,
            broker: &mut self.broker,
            candidates: &self.candidates,
        };
        self.scheduler.on_tick(&mut self.state, &mut ctx, now)
    }

    fn post_market(&mut self, day: u32) -> firstboard_core::engine::SessionReport {
        let mut ctx = SessionContext {
            feed: &self.feed,
            calendar: &self.calendar,
            broker: &mut self.broker,
            candidates: &self.candidates,
        };
        self.scheduler.after_trading(&mut self.state, &mut ctx, d(day))
    }

    /// Run the 5th through the 14:55 entry.
    fn buy_on_fifth(&mut self) {
        self.pre_market(5);
        self.tick(5, "09:30");
        self.tick(5, "10:00");
        self.tick(5, "11:00");
        let report = self.tick(5, "14:55");
        assert!(report.entries.iter().any(|e| e.is_bought()));
    }
}

fn other_bar(symbol: &str, day: u32, close: f64) -> DailyBar {
    DailyBar {
        symbol: symbol.into(),
        ..bar(day, close * 0.98, close, close * 0.97, close)
    }
}

fn other_tick(symbol: &str, day: u32, hhmm: &str, price: f64) -> Tick {
    Tick {
        symbol: symbol.into(),
        ..tick(day, hhmm, price)
    }
}

struct FailingSource;

impl CandidateSource for FailingSource {
    fn candidates(&self, _date: NaiveDate) -> Result<Vec<String>, DataError> {
        Err(DataError::Other("screening service down".into()))
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[test]
fn buy_then_day1_stop_next_session() {
    let mut fx = Fixture::new();
    fx.buy_on_fifth();

    let rec = fx.state.positions.get(SYM).unwrap();
    assert_eq!(rec.buy_date, d(5));
    assert!((rec.limit_up_high - 10.0).abs() < 1e-9);
    let qty = fx.broker.positions()[0].quantity;
    assert_eq!(qty, 9_800);

    fx.post_market(5);
    let pre = fx.pre_market(6);
    assert!(pre.evictions.is_empty());
    assert_eq!(pre.holdings[0].available_quantity, 9_800);

    // 9.50 < 10.00 * 0.96
    let report = fx.tick(6, "09:30");
    assert_eq!(report.exits.len(), 1);
    let fill = &report.exits[0];
    assert_eq!(fill.signal.reason, SellReason::Day1StopLoss);
    assert_eq!(fill.receipt.filled_quantity, -9_800);
    assert!((fill.receipt.price - 9.50).abs() < 1e-9);
    assert!(fx.state.positions.is_empty());
    assert!(fx.broker.positions().is_empty());

    let expected_cash = 100_000.0 - 9_800.0 * 10.15 + 9_800.0 * 9.50;
    assert!((fx.broker.available_cash() - expected_cash).abs() < 1e-6);
}

#[test]
fn entries_wait_for_entry_time_and_run_once() {
    let mut fx = Fixture::new();
    fx.pre_market(5);

    let early = fx.tick(5, "14:50");
    assert!(early.screen.is_none());
    assert!(early.entries.is_empty());

    let entry = fx.tick(5, "14:55");
    let screen = entry.screen.as_ref().unwrap();
    assert_eq!(screen.qualified, vec![SYM.to_string()]);
    assert_eq!(entry.entries.len(), 1);

    let later = fx.tick(5, "14:57");
    assert!(later.screen.is_none());
    assert!(later.entries.is_empty());
    assert_eq!(fx.state.stats.buys, 1);
    assert_eq!(fx.state.stats.ticks, 3);
}

#[test]
fn late_first_tick_still_runs_entries() {
    let mut fx = Fixture::new();
    fx.pre_market(5);
    let report = fx.tick(5, "14:57");
    assert!(report.screen.is_some());
    assert!(matches!(report.entries[0], EntryOutcome::Bought { .. }));
}

#[test]
fn same_day_buy_is_not_exit_evaluated() {
    let mut fx = Fixture::new();
    fx.buy_on_fifth();

    // an intraday collapse on the buy day cannot be sold
    fx.feed.add_ticks([tick(5, "14:58", 9.0)]);
    let report = fx.tick(5, "14:58");
    assert!(report.exits.is_empty());
    assert!(report.errors.is_empty());
    assert_eq!(fx.state.positions.get(SYM).unwrap().hold_days_cache, None);
}

#[test]
fn failed_sell_keeps_record_until_it_succeeds() {
    let mut fx = Fixture::new();
    fx.buy_on_fifth();
    fx.pre_market(6);

    fx.broker.reject_orders_for(SYM);
    let report = fx.tick(6, "09:30");
    assert!(report.exits.is_empty());
    assert!(matches!(
        &report.errors[0],
        EngineError::ExecutionFailure { symbol, .. } if symbol == SYM
    ));
    let rec = fx.state.positions.get(SYM).unwrap();
    assert_eq!(rec.hold_days_cache, Some(1));

    // a fresh broker handle with the same holdings accepts the retry
    let mut retry = PaperBroker::new(0.0);
    retry.seed_position(SYM, 9_800, 10.15);
    fx.broker = retry;
    let report = fx.tick(6, "09:31");
    assert_eq!(report.exits.len(), 1);
    assert_eq!(report.exits[0].signal.reason, SellReason::Day1StopLoss);
    assert!(fx.state.positions.is_empty());
    assert_eq!(fx.state.stats.sells, 1);
    assert_eq!(fx.state.stats.errors, 1);
}

#[test]
fn pre_market_evicts_unheld_and_stale_records() {
    let mut fx = Fixture::new();
    fx.broker.seed_position("OLD.SZ", 1_000, 8.0);
    fx.broker.seed_position("UNTRACKED.SZ", 500, 5.0);
    fx.state
        .positions
        .open(PositionRecord::new("OLD.SZ", d(1) - chrono::Duration::days(20), 8.8));
    fx.state
        .positions
        .open(PositionRecord::new("SOLD.SZ", d(4), 12.0));

    let pre = fx.pre_market(5);

    assert_eq!(pre.evictions.len(), 2);
    let reasons: Vec<_> = pre
        .evictions
        .iter()
        .map(|e| (e.symbol.as_str(), e.reason.clone()))
        .collect();
    assert!(reasons.contains(&("SOLD.SZ", EvictionReason::NotHeld)));
    assert!(reasons.contains(&("OLD.SZ", EvictionReason::Stale { age_days: 24 })));
    assert!(fx.state.positions.is_empty());
    assert_eq!(pre.untracked, vec!["OLD.SZ".to_string(), "UNTRACKED.SZ".to_string()]);
}

#[test]
fn candidate_failure_reported_and_session_continues() {
    let mut fx = Fixture::new();
    fx.broker.start_session(d(5));
    fx.feed.set_clock(at(5, "09:00"));
    let failing = FailingSource;
    let mut ctx = SessionContext {
        feed: &fx.feed,
        calendar: &fx.calendar,
        broker: &mut fx.broker,
        candidates: &failing,
    };
    let pre = fx.scheduler.before_trading(&mut fx.state, &mut ctx, d(5));
    assert!(pre.candidate_error.unwrap().contains("screening service down"));
    assert!(pre.candidates.is_empty());

    let report = fx.tick(5, "14:55");
    assert!(report.screen.unwrap().qualified.is_empty());
    assert!(report.entries.is_empty());
}

#[test]
fn session_report_lists_holdings_and_counts_new_highs() {
    let mut fx = Fixture::new();
    fx.buy_on_fifth();

    let report = fx.post_market(5);
    assert_eq!(report.date, d(5));
    assert_eq!(report.holdings.len(), 1);
    let h = &report.holdings[0];
    assert_eq!(h.symbol, SYM);
    assert_eq!(h.hold_days, Some(0));
    assert!((h.last_price.unwrap() - 10.15).abs() < 1e-9);
    assert!(h.profit_rate.unwrap().abs() < 1e-9);
    assert_eq!(report.stats.buys, 1);
    // the buy day itself is not counted
    assert_eq!(fx.state.positions.get(SYM).unwrap().days_without_new_high, 0);

    // on the 6th the high is 9.50, under the 10.00 limit-up high
    let mut quiet = StrategyConfig::default();
    quiet.exit.day1_stop_ratio = 0.5;
    quiet.exit.later_stop_ratio = 0.5;
    fx.scheduler = StrategyScheduler::new(quiet).unwrap();
    fx.pre_market(6);
    let tick = fx.tick(6, "09:31");
    assert!(tick.exits.is_empty());
    fx.post_market(6);
    assert_eq!(fx.state.positions.get(SYM).unwrap().days_without_new_high, 1);
}

#[test]
fn data_failure_on_one_symbol_does_not_block_other_exits() {
    let mut fx = Fixture::new();
    // AAA has history but no prints on the 6th; BBB gaps below its day-1 stop
    fx.feed.add_daily_bars([
        other_bar("AAA", 1, 9.09),
        other_bar("AAA", 4, 10.0),
        other_bar("BBB", 1, 9.09),
        other_bar("BBB", 4, 10.0),
        other_bar("UNTRACKED.SZ", 4, 5.0),
    ]);
    fx.feed.add_ticks([
        other_tick("BBB", 6, "09:30", 9.00),
        other_tick("UNTRACKED.SZ", 6, "09:30", 1.0),
    ]);
    for symbol in ["AAA", "BBB"] {
        fx.broker.seed_position(symbol, 1_000, 10.0);
        fx.state
            .positions
            .open(PositionRecord::new(symbol, d(5), 10.0));
    }
    fx.broker.seed_position("UNTRACKED.SZ", 500, 5.0);

    let pre = fx.pre_market(6);
    assert!(pre.evictions.is_empty());
    assert_eq!(pre.untracked, vec!["UNTRACKED.SZ".to_string()]);

    let report = fx.tick(6, "09:30");

    let exits: Vec<_> = report
        .exits
        .iter()
        .map(|f| (f.signal.symbol.as_str(), f.signal.reason))
        .collect();
    assert_eq!(exits, vec![("BBB", SellReason::Day1StopLoss)]);
    assert_eq!(report.errors.len(), 1);
    assert!(matches!(
        &report.errors[0],
        EngineError::DataUnavailable { symbol, source: DataError::PriceUnavailable { .. } }
            if symbol == "AAA"
    ));

    assert!(fx.state.positions.contains("AAA"));
    assert!(!fx.state.positions.contains("BBB"));
    assert!(!fx.state.positions.contains("UNTRACKED.SZ"));
    let held: Vec<String> = fx.broker.positions().into_iter().map(|p| p.symbol).collect();
    assert!(held.contains(&"AAA".to_string()));
    assert!(held.contains(&"UNTRACKED.SZ".to_string()));
    assert!(!held.contains(&"BBB".to_string()));
    assert_eq!(fx.state.stats.errors, 1);
}

#[test]
fn repeated_session_end_counts_new_high_once() {
    let mut fx = Fixture::new();
    fx.buy_on_fifth();
    fx.post_market(5);

    let mut quiet = StrategyConfig::default();
    quiet.exit.day1_stop_ratio = 0.5;
    quiet.exit.later_stop_ratio = 0.5;
    fx.scheduler = StrategyScheduler::new(quiet).unwrap();
    fx.pre_market(6);
    fx.tick(6, "09:31");

    fx.post_market(6);
    fx.post_market(6);
    let rec = fx.state.positions.get(SYM).unwrap();
    assert_eq!(rec.days_without_new_high, 1);
    assert_eq!(rec.high_checked_on, Some(d(6)));
}

#[test]
fn invalid_config_is_rejected_at_construction() {
    let mut config = StrategyConfig::default();
    config.resistance.pivot_window = 0;
    let err = StrategyScheduler::new(config).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid { field: "resistance.pivot_window", .. }));

    let mut config = StrategyConfig::default();
    config.max_positions = 0;
    assert!(StrategyScheduler::new(config).is_err());
}
