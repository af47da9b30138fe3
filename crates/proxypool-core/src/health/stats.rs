//! Per-proxy `HealthStats` tracked by the `HealthChecker`.

use std::time::Duration;

use chrono::{DateTime, Utc};

/// Consecutive successes/failures, total checks, and last result for one
/// proxy address (spec.md §3 "HealthStats").
#[derive(Debug, Clone)]
pub struct HealthStats {
    pub healthy: bool,
    pub consecutive_successes: u32,
    pub consecutive_failures: u32,
    pub total_checks: u64,
    pub last_response_time: Option<Duration>,
    pub last_check_time: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl HealthStats {
    pub fn new() -> Self {
        Self {
            healthy: true,
            consecutive_successes: 0,
            consecutive_failures: 0,
            total_checks: 0,
            last_response_time: None,
            last_check_time: None,
            last_error: None,
        }
    }
}

impl Default for HealthStats {
    fn default() -> Self {
        Self::new()
    }
}
