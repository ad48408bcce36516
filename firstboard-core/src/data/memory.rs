//! In-memory feed over recorded daily bars and intraday ticks.
//!
//! Used for session replay and tests. The feed has a clock: every query is
//! answered as of the current timestamp, so history never leaks today's bar
//! and the session bar only sees ticks at or before the clock.

use chrono::{NaiveDate, NaiveDateTime};
use std::collections::{BTreeSet, HashMap};

use super::provider::{limit_up_price, DataError, MarketDataFeed};
use crate::domain::{DailyBar, SessionBar, Tick};

#[derive(Debug, Clone)]
pub struct InMemoryFeed {
    daily: HashMap<String, Vec<DailyBar>>,
    ticks: HashMap<String, Vec<Tick>>,
    limit_ratio: f64,
    clock: Option<NaiveDateTime>,
}

impl Default for InMemoryFeed {
    fn default() -> Self {
        Self::new(0.10)
    }
}

impl InMemoryFeed {
    pub fn new(limit_ratio: f64) -> Self {
        Self {
            daily: HashMap::new(),
            ticks: HashMap::new(),
            limit_ratio,
            clock: None,
        }
    }

    /// Add completed daily bars. Bars are kept sorted by date.
    pub fn add_daily_bars(&mut self, bars: impl IntoIterator<Item = DailyBar>) {
        for bar in bars {
            self.daily.entry(bar.symbol.clone()).or_default().push(bar);
        }
        for series in self.daily.values_mut() {
            series.sort_by_key(|b| b.date);
        }
    }

    /// Add intraday ticks. Ticks are kept sorted by timestamp.
    pub fn add_ticks(&mut self, ticks: impl IntoIterator<Item = Tick>) {
        for tick in ticks {
            self.ticks.entry(tick.symbol.clone()).or_default().push(tick);
        }
        for series in self.ticks.values_mut() {
            series.sort_by_key(|t| t.timestamp);
        }
    }

    pub fn set_clock(&mut self, now: NaiveDateTime) {
        self.clock = Some(now);
    }

    /// Distinct dates that have at least one tick, ascending.
    pub fn session_dates(&self) -> Vec<NaiveDate> {
        let dates: BTreeSet<NaiveDate> = self
            .ticks
            .values()
            .flat_map(|series| series.iter().map(|t| t.timestamp.date()))
            .collect();
        dates.into_iter().collect()
    }

    /// Distinct tick timestamps on `date`, ascending.
    pub fn tick_times(&self, date: NaiveDate) -> Vec<NaiveDateTime> {
        let times: BTreeSet<NaiveDateTime> = self
            .ticks
            .values()
            .flat_map(|series| series.iter().map(|t| t.timestamp))
            .filter(|ts| ts.date() == date)
            .collect();
        times.into_iter().collect()
    }

    /// Latest price for every symbol that has traded today up to the clock.
    pub fn last_prices(&self) -> Vec<(String, f64)> {
        let mut out: Vec<(String, f64)> = self
            .ticks
            .keys()
            .filter_map(|sym| self.today_ticks(sym).ok()?.last().map(|t| (sym.clone(), t.price)))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    fn now(&self) -> Result<NaiveDateTime, DataError> {
        self.clock.ok_or(DataError::ClockNotSet)
    }

    fn today_ticks(&self, symbol: &str) -> Result<&[Tick], DataError> {
        let now = self.now()?;
        let Some(series) = self.ticks.get(symbol) else {
            if self.daily.contains_key(symbol) {
                return Ok(&[]);
            }
            return Err(DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            });
        };
        let start = series.partition_point(|t| t.timestamp.date() < now.date());
        let end = series.partition_point(|t| t.timestamp <= now);
        Ok(&series[start..end.max(start)])
    }

    fn history(&self, symbol: &str) -> Result<&[DailyBar], DataError> {
        let today = self.now()?.date();
        let Some(series) = self.daily.get(symbol) else {
            return Err(DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            });
        };
        let end = series.partition_point(|b| b.date < today);
        Ok(&series[..end])
    }
}

impl MarketDataFeed for InMemoryFeed {
    fn daily_bars(&self, symbol: &str, count: usize) -> Result<Vec<DailyBar>, DataError> {
        let history = self.history(symbol)?;
        let start = history.len().saturating_sub(count);
        Ok(history[start..].to_vec())
    }

    fn session_bar(&self, symbol: &str) -> Result<SessionBar, DataError> {
        let ticks = self.today_ticks(symbol)?;
        let (first, last) = match (ticks.first(), ticks.last()) {
            (Some(f), Some(l)) => (f, l),
            _ => {
                return Err(DataError::NoSessionData {
                    symbol: symbol.to_string(),
                })
            }
        };
        let (high, low) = ticks
            .iter()
            .fold((f64::MIN, f64::MAX), |(h, l), t| (h.max(t.price), l.min(t.price)));
        Ok(SessionBar {
            open: first.price,
            high,
            low,
            last: last.price,
        })
    }

    fn current_price(&self, symbol: &str) -> Result<f64, DataError> {
        self.today_ticks(symbol)?
            .last()
            .map(|t| t.price)
            .ok_or_else(|| DataError::PriceUnavailable {
                symbol: symbol.to_string(),
            })
    }

    fn limit_up_reference_price(&self, symbol: &str) -> Result<f64, DataError> {
        let history = self.history(symbol)?;
        match history {
            [.., prev, _] => Ok(limit_up_price(prev.close, self.limit_ratio)),
            [only] => Ok(only.high),
            [] => Err(DataError::InsufficientHistory {
                symbol: symbol.to_string(),
                needed: 1,
                available: 0,
            }),
        }
    }
}
