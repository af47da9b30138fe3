//! Pluggable trading calendar: holidays and half-day schedules.
//!
//! spec.md §9 leaves "holidays deferred to a calendar database" as an open
//! question; SPEC_FULL resolves it by making the calendar a trait so a real
//! provider can be swapped in without touching `MarketClock`. `StaticCalendar`
//! is the in-memory reference implementation used by default and in tests.

use std::collections::HashSet;

use chrono::NaiveDate;
use proxypool_types::Market;

/// A date's classification for one market, independent of the clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalendarDay {
    /// Ordinary full trading day.
    Normal,
    /// Shortened session (morning-only by default; see `HalfDaySchedule`).
    HalfDay,
    /// Declared holiday — market does not trade even though it is a weekday.
    Holiday,
    /// Weekend — never a trading day.
    Weekend,
}

/// Source of holiday/half-day facts for a market. Implementors may be
/// in-memory tables (as here) or backed by an external calendar service;
/// that service is explicitly out of scope for this core (spec.md §1).
pub trait TradingCalendar: Send + Sync {
    /// Classify `date` for `market`, ignoring weekends (the caller applies
    /// the weekend rule uniformly — see `MarketClock::is_trading_day`).
    fn classify(&self, market: Market, date: NaiveDate) -> CalendarDay;
}

/// In-memory holiday/half-day table. The default and only calendar shipped
/// with this core; a real operator wires a live provider behind the same
/// trait.
#[derive(Debug, Clone, Default)]
pub struct StaticCalendar {
    holidays: HashSet<(Market, NaiveDate)>,
    half_days: HashSet<(Market, NaiveDate)>,
}

impl StaticCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_holiday(mut self, market: Market, date: NaiveDate) -> Self {
        self.holidays.insert((market, date));
        self
    }

    pub fn with_half_day(mut self, market: Market, date: NaiveDate) -> Self {
        self.half_days.insert((market, date));
        self
    }

    pub fn add_holiday(&mut self, market: Market, date: NaiveDate) {
        self.holidays.insert((market, date));
    }

    pub fn add_half_day(&mut self, market: Market, date: NaiveDate) {
        self.half_days.insert((market, date));
    }
}

impl TradingCalendar for StaticCalendar {
    fn classify(&self, market: Market, date: NaiveDate) -> CalendarDay {
        use chrono::Weekday;

        if matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            return CalendarDay::Weekend;
        }
        if self.holidays.contains(&(market, date)) {
            return CalendarDay::Holiday;
        }
        if self.half_days.contains(&(market, date)) {
            return CalendarDay::HalfDay;
        }
        CalendarDay::Normal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn weekend_wins_over_everything() {
        // 2024-01-06 is a Saturday.
        let cal = StaticCalendar::new()
            .with_holiday(Market::Cn, date(2024, 1, 6))
            .with_half_day(Market::Cn, date(2024, 1, 6));
        assert_eq!(cal.classify(Market::Cn, date(2024, 1, 6)), CalendarDay::Weekend);
    }

    #[test]
    fn weekday_defaults_to_normal() {
        let cal = StaticCalendar::new();
        // 2024-01-08 is a Monday.
        assert_eq!(cal.classify(Market::Us, date(2024, 1, 8)), CalendarDay::Normal);
    }

    #[test]
    fn holiday_and_half_day_are_per_market() {
        let cal = StaticCalendar::new().with_holiday(Market::Hk, date(2024, 1, 8));
        assert_eq!(cal.classify(Market::Hk, date(2024, 1, 8)), CalendarDay::Holiday);
        assert_eq!(cal.classify(Market::Cn, date(2024, 1, 8)), CalendarDay::Normal);
    }

    #[test]
    fn add_half_day_mutates_in_place() {
        let mut cal = StaticCalendar::new();
        cal.add_half_day(Market::Us, date(2024, 1, 8));
        assert_eq!(cal.classify(Market::Us, date(2024, 1, 8)), CalendarDay::HalfDay);
    }
}
