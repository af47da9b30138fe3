//! C1 — MarketClock: timezone-aware trading-session decisions.
//!
//! Collapses the source's `MarketClockService` + half-day subclass into one
//! type whose calendar is parameterized (spec.md §9, "inheritance-based
//! clock variants → strategy"): there is no subtype hierarchy, only a
//! `TradingCalendar` trait plugged in at construction.

mod calendar;

pub use calendar::{CalendarDay, StaticCalendar, TradingCalendar};

use chrono::{DateTime, Datelike, Duration as ChronoDuration, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use proxypool_types::{DayType, Market, MarketStatus, SessionKind};

/// The local open/close/lunch window for one trading day.
#[derive(Debug, Clone, Copy)]
pub struct TradingHours {
    pub open: NaiveTime,
    pub close: NaiveTime,
    pub lunch_break: Option<(NaiveTime, NaiveTime)>,
}

fn time(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).expect("static time literal is valid")
}

fn timezone_for(market: Market) -> Tz {
    match market {
        Market::Cn => chrono_tz::Asia::Shanghai,
        Market::Hk => chrono_tz::Asia::Hong_Kong,
        Market::Us => chrono_tz::America::New_York,
    }
}

fn full_day_hours(market: Market) -> TradingHours {
    match market {
        Market::Cn => {
            TradingHours { open: time(9, 30), close: time(15, 0), lunch_break: Some((time(11, 30), time(13, 0))) }
        },
        Market::Hk => {
            TradingHours { open: time(9, 30), close: time(16, 15), lunch_break: Some((time(12, 0), time(13, 0))) }
        },
        Market::Us => TradingHours { open: time(9, 30), close: time(16, 0), lunch_break: None },
    }
}

/// Default half-day schedule: "morning only", shortened to the market's
/// configured half-day window (spec.md §4.1). These defaults mirror common
/// early-close conventions and can be overridden by supplying a custom
/// `TradingCalendar` plus a different `MarketClock::half_day_hours` table
/// in a future revision; for now the table is fixed per market.
fn half_day_hours(market: Market) -> TradingHours {
    match market {
        Market::Cn => TradingHours { open: time(9, 30), close: time(11, 30), lunch_break: None },
        Market::Hk => TradingHours { open: time(9, 30), close: time(12, 0), lunch_break: None },
        Market::Us => TradingHours { open: time(9, 30), close: time(13, 0), lunch_break: None },
    }
}

/// Answers the three questions from spec.md §4.1 for any `(market, now)`.
pub struct MarketClock<C: TradingCalendar> {
    calendar: C,
}

impl MarketClock<StaticCalendar> {
    /// Clock backed by the bundled in-memory calendar (weekends only; no
    /// holidays/half-days until populated).
    pub fn with_static_calendar() -> Self {
        Self { calendar: StaticCalendar::new() }
    }
}

impl<C: TradingCalendar> MarketClock<C> {
    pub fn new(calendar: C) -> Self {
        Self { calendar }
    }

    fn local_now(&self, market: Market, now: DateTime<Utc>) -> DateTime<Tz> {
        now.with_timezone(&timezone_for(market))
    }

    /// `is_trading_day(market, date)` — false on weekends and declared
    /// holidays; true on normal and half-day dates.
    pub fn is_trading_day(&self, market: Market, date: chrono::NaiveDate) -> bool {
        matches!(
            self.calendar.classify(market, date),
            CalendarDay::Normal | CalendarDay::HalfDay
        )
    }

    /// `trading_hours(market, date)` — local open/close/lunch, selecting the
    /// half-day schedule when applicable. Returns `None` on non-trading days.
    pub fn trading_hours(&self, market: Market, date: chrono::NaiveDate) -> Option<TradingHours> {
        match self.calendar.classify(market, date) {
            CalendarDay::Normal => Some(full_day_hours(market)),
            CalendarDay::HalfDay => Some(half_day_hours(market)),
            CalendarDay::Holiday | CalendarDay::Weekend => None,
        }
    }

    /// Full derived status for `(market, now)`.
    pub fn status(&self, market: Market, now: DateTime<Utc>) -> MarketStatus {
        let local = self.local_now(market, now);
        let date = local.date_naive();
        let day_type = match self.calendar.classify(market, date) {
            CalendarDay::Normal => DayType::Normal,
            CalendarDay::HalfDay => DayType::HalfDay,
            CalendarDay::Holiday => DayType::Holiday,
            CalendarDay::Weekend => DayType::Weekend,
        };
        let is_trading_day = self.is_trading_day(market, date);
        let hours = self.trading_hours(market, date);
        let session = match (is_trading_day, day_type) {
            (false, _) => SessionKind::None,
            (true, DayType::HalfDay) => SessionKind::MorningOnly,
            (true, _) => SessionKind::FullDay,
        };
        MarketStatus {
            market,
            day_type,
            session,
            open_local: hours.map(|h| h.open),
            close_local: hours.map(|h| h.close),
            lunch_break: hours.and_then(|h| h.lunch_break),
            is_trading_day,
        }
    }

    /// `should_start(market, pre_minutes)` — true strictly once the
    /// pre-window opens (inclusive), by HH:MM comparison in market-local
    /// time.
    pub fn should_start(&self, market: Market, now: DateTime<Utc>, pre_minutes: u32) -> bool {
        let local = self.local_now(market, now);
        let date = local.date_naive();
        let Some(hours) = self.trading_hours(market, date) else {
            return false;
        };
        let threshold = hours.open - ChronoDuration::minutes(i64::from(pre_minutes));
        local.time() >= threshold
    }

    /// `should_stop(market, post_minutes)` — true once the post-window has
    /// been reached **or** the day is not a trading day.
    pub fn should_stop(&self, market: Market, now: DateTime<Utc>, post_minutes: u32) -> bool {
        let local = self.local_now(market, now);
        let date = local.date_naive();
        let Some(hours) = self.trading_hours(market, date) else {
            return true;
        };
        let threshold = hours.close + ChronoDuration::minutes(i64::from(post_minutes));
        local.time() >= threshold
    }

    /// The next start/stop boundary instant, for diagnostics
    /// (`GET /scheduler/status`) only — the scheduler itself still polls
    /// every 60s; this does not replace that loop.
    pub fn next_boundary(
        &self,
        market: Market,
        now: DateTime<Utc>,
        pre_minutes: u32,
        post_minutes: u32,
    ) -> Option<DateTime<Utc>> {
        let tz = timezone_for(market);
        let local = now.with_timezone(&tz);
        for day_offset in 0..8i64 {
            let date = local.date_naive() + ChronoDuration::days(day_offset);
            let Some(hours) = self.trading_hours(market, date) else { continue };
            let pre_open = hours.open - ChronoDuration::minutes(i64::from(pre_minutes));
            let post_close = hours.close + ChronoDuration::minutes(i64::from(post_minutes));
            for candidate_time in [pre_open, hours.open, hours.close, post_close] {
                if let Some(candidate_local) =
                    tz.from_local_datetime(&date.and_time(candidate_time)).earliest()
                {
                    if day_offset > 0 || candidate_local > local {
                        return Some(candidate_local.with_timezone(&Utc));
                    }
                }
            }
        }
        None
    }
}

impl Default for MarketClock<StaticCalendar> {
    fn default() -> Self {
        Self::with_static_calendar()
    }
}

/// `Utc::now()`'s weekday does not depend on the market timezone for the
/// purpose of this helper set; kept for callers that only need the date.
pub fn current_weekday(now: DateTime<Utc>) -> chrono::Weekday {
    now.weekday()
}

impl TradingCalendar for Box<dyn TradingCalendar> {
    fn classify(&self, market: Market, date: chrono::NaiveDate) -> CalendarDay {
        (**self).classify(market, date)
    }
}

/// A boxed calendar, so `PoolInstance`/`GlobalScheduler` can hold one
/// concrete `MarketClock` type without threading a generic parameter
/// through the rest of the crate.
pub type DynCalendar = Box<dyn TradingCalendar>;

impl MarketClock<DynCalendar> {
    /// Clock over a boxed calendar — the shape used everywhere outside this
    /// module and its tests.
    pub fn boxed(calendar: impl TradingCalendar + 'static) -> Self {
        Self::new(Box::new(calendar))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2024-01-08 is a Monday, so US/HK/CN are all in standard (non-DST) time.
    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn weekend_is_not_a_trading_day() {
        let clock = MarketClock::with_static_calendar();
        // 2024-01-06 is a Saturday.
        let date = chrono::NaiveDate::from_ymd_opt(2024, 1, 6).unwrap();
        assert!(!clock.is_trading_day(Market::Us, date));
        assert!(clock.trading_hours(Market::Us, date).is_none());
    }

    #[test]
    fn holiday_is_not_a_trading_day() {
        let date = chrono::NaiveDate::from_ymd_opt(2024, 1, 8).unwrap();
        let cal = StaticCalendar::new().with_holiday(Market::Us, date);
        let clock = MarketClock::new(cal);
        assert!(!clock.is_trading_day(Market::Us, date));
    }

    #[test]
    fn half_day_is_a_trading_day_with_shortened_hours() {
        let date = chrono::NaiveDate::from_ymd_opt(2024, 1, 8).unwrap();
        let cal = StaticCalendar::new().with_half_day(Market::Us, date);
        let clock = MarketClock::new(cal);
        assert!(clock.is_trading_day(Market::Us, date));
        let hours = clock.trading_hours(Market::Us, date).unwrap();
        assert_eq!(hours.open, time(9, 30));
        assert_eq!(hours.close, time(13, 0));
    }

    #[test]
    fn normal_day_status_reports_full_day_session() {
        let clock = MarketClock::with_static_calendar();
        // 2024-01-08 09:45 America/New_York == 14:45 UTC.
        let status = clock.status(Market::Us, utc(2024, 1, 8, 14, 45));
        assert_eq!(status.day_type, DayType::Normal);
        assert_eq!(status.session, SessionKind::FullDay);
        assert!(status.is_trading_day);
        assert_eq!(status.open_local, Some(time(9, 30)));
        assert_eq!(status.close_local, Some(time(16, 0)));
    }

    #[test]
    fn should_start_is_false_before_pre_window_and_true_at_threshold() {
        let clock = MarketClock::with_static_calendar();
        // pre_minutes = 30 -> threshold is 09:00 local == 14:00 UTC.
        assert!(!clock.should_start(Market::Us, utc(2024, 1, 8, 13, 59), 30));
        assert!(clock.should_start(Market::Us, utc(2024, 1, 8, 14, 0), 30));
    }

    #[test]
    fn should_start_is_false_on_non_trading_day() {
        let clock = MarketClock::with_static_calendar();
        // 2024-01-06 is a Saturday.
        assert!(!clock.should_start(Market::Us, utc(2024, 1, 6, 14, 0), 30));
    }

    #[test]
    fn should_stop_is_true_at_post_window_threshold() {
        let clock = MarketClock::with_static_calendar();
        // close 16:00 local + 30m post -> threshold 16:30 local == 21:30 UTC.
        assert!(!clock.should_stop(Market::Us, utc(2024, 1, 8, 21, 29), 30));
        assert!(clock.should_stop(Market::Us, utc(2024, 1, 8, 21, 30), 30));
    }

    #[test]
    fn should_stop_is_true_on_non_trading_day() {
        let clock = MarketClock::with_static_calendar();
        assert!(clock.should_stop(Market::Us, utc(2024, 1, 6, 12, 0), 30));
    }

    #[test]
    fn next_boundary_returns_a_future_instant() {
        let clock = MarketClock::with_static_calendar();
        let now = utc(2024, 1, 8, 14, 45);
        let next = clock.next_boundary(Market::Us, now, 30, 30).unwrap();
        assert!(next > now);
    }

    #[test]
    fn boxed_calendar_clock_behaves_identically() {
        let clock = MarketClock::boxed(StaticCalendar::new());
        let date = chrono::NaiveDate::from_ymd_opt(2024, 1, 8).unwrap();
        assert!(clock.is_trading_day(Market::Us, date));
    }
}
