//! Derived/persisted status snapshots.

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::market::{Market, PoolMode};

/// Classification of a trading date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayType {
    Normal,
    HalfDay,
    Holiday,
    Weekend,
}

/// Which session window applies on a trading day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
    FullDay,
    MorningOnly,
    AfternoonOnly,
    None,
}

/// `MarketClock`'s answer for `(market, date)` — derived, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketStatus {
    pub market: Market,
    pub day_type: DayType,
    pub session: SessionKind,
    pub open_local: Option<NaiveTime>,
    pub close_local: Option<NaiveTime>,
    pub lunch_break: Option<(NaiveTime, NaiveTime)>,
    pub is_trading_day: bool,
}

/// Which of the two A/B buffers is serving reads, for diagnostics only
/// (spec.md §9: "retains it for diagnostics only", not meaningfully
/// consumed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActiveSlot {
    A,
    B,
}

impl ActiveSlot {
    pub fn other(self) -> Self {
        match self {
            ActiveSlot::A => ActiveSlot::B,
            ActiveSlot::B => ActiveSlot::A,
        }
    }
}

/// Aggregate counters and buffer sizes persisted to the status table,
/// keyed by `(market, mode)`. Never holds individual proxy addresses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedStatus {
    pub is_running: bool,
    pub active_slot: ActiveSlot,
    pub active_size: usize,
    pub standby_size: usize,
    pub total_requests: u64,
    pub success_count: u64,
    pub failure_count: u64,
    pub last_rotation_time: Option<DateTime<Utc>>,
}

impl Default for PersistedStatus {
    fn default() -> Self {
        Self {
            is_running: false,
            active_slot: ActiveSlot::A,
            active_size: 0,
            standby_size: 0,
            total_requests: 0,
            success_count: 0,
            failure_count: 0,
            last_rotation_time: None,
        }
    }
}

/// Full status snapshot returned by `PoolInstance::status()` — combines
/// engine counters, buffer sizes, market clock, and health-checker summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolStatus {
    pub market: Market,
    pub mode: PoolMode,
    pub is_running: bool,
    pub manually_started: bool,
    pub active_slot: ActiveSlot,
    pub active_size: usize,
    pub standby_size: usize,
    pub total_requests: u64,
    pub success_count: u64,
    pub failure_count: u64,
    pub no_proxy_count: u64,
    pub last_rotation_time: Option<DateTime<Utc>>,
    pub last_fetch_time: Option<DateTime<Utc>>,
    pub last_fetch_count: usize,
    pub market_status: MarketStatus,
    pub healthy_count: usize,
    pub unhealthy_count: usize,
    pub watermark: WatermarkLevel,
}

/// Derived from `active_size` vs. `low_watermark` (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatermarkLevel {
    Ok,
    Warning,
    Critical,
}

impl WatermarkLevel {
    pub fn from_size(active_size: usize, low_watermark: u32) -> Self {
        if active_size == 0 {
            WatermarkLevel::Critical
        } else if (active_size as u64) < u64::from(low_watermark) {
            WatermarkLevel::Warning
        } else {
            WatermarkLevel::Ok
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_size_is_critical() {
        assert_eq!(WatermarkLevel::from_size(0, 5), WatermarkLevel::Critical);
    }

    #[test]
    fn below_low_watermark_is_warning() {
        assert_eq!(WatermarkLevel::from_size(4, 5), WatermarkLevel::Warning);
    }

    #[test]
    fn at_or_above_low_watermark_is_ok() {
        assert_eq!(WatermarkLevel::from_size(5, 5), WatermarkLevel::Ok);
        assert_eq!(WatermarkLevel::from_size(20, 5), WatermarkLevel::Ok);
    }

    #[test]
    fn active_slot_other_flips() {
        assert_eq!(ActiveSlot::A.other(), ActiveSlot::B);
        assert_eq!(ActiveSlot::B.other(), ActiveSlot::A);
    }
}
