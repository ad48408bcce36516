//! Trading calendar: trading-day distance between dates.

use chrono::{Datelike, NaiveDate, Weekday};
use std::collections::BTreeSet;

pub trait TradingCalendar {
    /// Whether the exchange trades on `date`.
    fn is_trading_day(&self, date: NaiveDate) -> bool;

    /// Number of trading days in `[start, end]`, both ends inclusive.
    ///
    /// Returns 0 when `end < start`.
    fn trading_day_count(&self, start: NaiveDate, end: NaiveDate) -> u32 {
        if end < start {
            return 0;
        }
        start
            .iter_days()
            .take_while(|d| *d <= end)
            .filter(|d| self.is_trading_day(*d))
            .count() as u32
    }
}

/// Monday–Friday calendar with an explicit holiday list.
#[derive(Debug, Clone, Default)]
pub struct WeekdayCalendar {
    holidays: BTreeSet<NaiveDate>,
}

impl WeekdayCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_holidays(holidays: impl IntoIterator<Item = NaiveDate>) -> Self {
        Self {
            holidays: holidays.into_iter().collect(),
        }
    }
}

impl TradingCalendar for WeekdayCalendar {
    fn is_trading_day(&self, date: NaiveDate) -> bool {
        !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) && !self.holidays.contains(&date)
    }
}

/// Trading days elapsed since `buy_date`, the buy day itself counting as 0.
pub fn hold_days(calendar: &dyn TradingCalendar, buy_date: NaiveDate, today: NaiveDate) -> u32 {
    calendar.trading_day_count(buy_date, today).saturating_sub(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn counts_inclusive_weekdays() {
        let cal = WeekdayCalendar::new();
        // Fri 2024-03-01 .. Mon 2024-03-04
        assert_eq!(cal.trading_day_count(d(2024, 3, 1), d(2024, 3, 4)), 2);
        assert_eq!(cal.trading_day_count(d(2024, 3, 4), d(2024, 3, 4)), 1);
    }

    #[test]
    fn reversed_range_is_zero() {
        let cal = WeekdayCalendar::new();
        assert_eq!(cal.trading_day_count(d(2024, 3, 5), d(2024, 3, 4)), 0);
    }

    #[test]
    fn holidays_are_skipped() {
        let cal = WeekdayCalendar::with_holidays([d(2024, 4, 4), d(2024, 4, 5)]);
        // Wed 04-03 .. Mon 04-08 with Thu/Fri off
        assert_eq!(cal.trading_day_count(d(2024, 4, 3), d(2024, 4, 8)), 2);
    }

    #[test]
    fn hold_days_excludes_buy_day() {
        let cal = WeekdayCalendar::new();
        assert_eq!(hold_days(&cal, d(2024, 3, 4), d(2024, 3, 4)), 0);
        assert_eq!(hold_days(&cal, d(2024, 3, 1), d(2024, 3, 4)), 1);
        assert_eq!(hold_days(&cal, d(2024, 3, 1), d(2024, 3, 6)), 3);
    }
}
