//! Strategy state: position bookkeeping and per-session flags.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

use crate::domain::{PositionRecord, Symbol};

/// Why a record was dropped during pre-market reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictionReason {
    /// The broker no longer reports the position.
    NotHeld,
    /// The record outlived `stale_record_days`.
    Stale { age_days: i64 },
}

impl fmt::Display for EvictionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotHeld => write!(f, "position no longer held"),
            Self::Stale { age_days } => write!(f, "record is {age_days} calendar days old"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Eviction {
    pub symbol: Symbol,
    pub reason: EvictionReason,
}

/// Strategy-side records keyed by symbol, one per open position.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PositionBook {
    records: BTreeMap<Symbol, PositionRecord>,
}

impl PositionBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record, returning the one it replaced.
    pub fn open(&mut self, record: PositionRecord) -> Option<PositionRecord> {
        self.records.insert(record.symbol.clone(), record)
    }

    pub fn get(&self, symbol: &str) -> Option<&PositionRecord> {
        self.records.get(symbol)
    }

    pub fn get_mut(&mut self, symbol: &str) -> Option<&mut PositionRecord> {
        self.records.get_mut(symbol)
    }

    pub fn remove(&mut self, symbol: &str) -> Option<PositionRecord> {
        self.records.remove(symbol)
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.records.contains_key(symbol)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in symbol order.
    pub fn iter(&self) -> impl Iterator<Item = &PositionRecord> {
        self.records.values()
    }

    /// Drop records whose position is gone or which are older than
    /// `stale_days` calendar days. Evictions are collected before any
    /// record is removed.
    pub fn reconcile(
        &mut self,
        held: &HashSet<Symbol>,
        today: NaiveDate,
        stale_days: i64,
    ) -> Vec<Eviction> {
        let evictions: Vec<Eviction> = self
            .records
            .values()
            .filter_map(|rec| {
                let reason = if !held.contains(&rec.symbol) {
                    EvictionReason::NotHeld
                } else {
                    let age_days = rec.calendar_age(today);
                    if age_days <= stale_days {
                        return None;
                    }
                    EvictionReason::Stale { age_days }
                };
                Some(Eviction {
                    symbol: rec.symbol.clone(),
                    reason,
                })
            })
            .collect();

        for eviction in &evictions {
            self.records.remove(&eviction.symbol);
        }
        evictions
    }
}

/// Counters for one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    pub ticks: usize,
    pub buys: usize,
    pub sells: usize,
    pub errors: usize,
}

/// Everything the scheduler carries between callbacks.
///
/// `positions` survives across sessions; the rest is reset by
/// `begin_session`.
#[derive(Debug, Clone, Default)]
pub struct StrategyState {
    pub session_date: Option<NaiveDate>,
    /// Today's candidate list, in source order.
    pub candidates: Vec<Symbol>,
    pub positions: PositionBook,
    /// Set once entries have been evaluated for the session.
    pub entry_evaluated: bool,
    pub stats: SessionStats,
}

impl StrategyState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_session(&mut self, date: NaiveDate) {
        self.session_date = Some(date);
        self.candidates.clear();
        self.entry_evaluated = false;
        self.stats = SessionStats::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    fn held(symbols: &[&str]) -> HashSet<Symbol> {
        symbols.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn open_replaces_existing_record() {
        let mut book = PositionBook::new();
        assert!(book.open(PositionRecord::new("A", d(1), 11.0)).is_none());
        let old = book.open(PositionRecord::new("A", d(4), 12.0)).unwrap();
        assert_eq!(old.limit_up_high, 11.0);
        assert_eq!(book.len(), 1);
        assert_eq!(book.get("A").unwrap().buy_date, d(4));
    }

    #[test]
    fn reconcile_evicts_unheld_and_stale() {
        let mut book = PositionBook::new();
        book.open(PositionRecord::new("GONE", d(10), 11.0));
        book.open(PositionRecord::new("OLD", d(1), 11.0));
        book.open(PositionRecord::new("KEEP", d(8), 11.0));

        let evictions = book.reconcile(&held(&["OLD", "KEEP"]), d(12), 10);

        assert_eq!(evictions.len(), 2);
        assert!(evictions.contains(&Eviction {
            symbol: "GONE".into(),
            reason: EvictionReason::NotHeld,
        }));
        assert!(evictions.contains(&Eviction {
            symbol: "OLD".into(),
            reason: EvictionReason::Stale { age_days: 11 },
        }));
        assert_eq!(book.iter().map(|r| r.symbol.as_str()).collect::<Vec<_>>(), vec!["KEEP"]);
    }

    #[test]
    fn record_exactly_at_stale_limit_is_kept() {
        let mut book = PositionBook::new();
        book.open(PositionRecord::new("A", d(1), 11.0));
        assert!(book.reconcile(&held(&["A"]), d(11), 10).is_empty());
        assert!(book.contains("A"));
    }

    #[test]
    fn begin_session_keeps_positions() {
        let mut state = StrategyState::new();
        state.positions.open(PositionRecord::new("A", d(1), 11.0));
        state.candidates.push("B".into());
        state.entry_evaluated = true;
        state.stats.buys = 1;

        state.begin_session(d(4));

        assert_eq!(state.session_date, Some(d(4)));
        assert!(state.candidates.is_empty());
        assert!(!state.entry_evaluated);
        assert_eq!(state.stats, SessionStats::default());
        assert_eq!(state.positions.len(), 1);
    }
}
