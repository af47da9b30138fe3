//! `PoolConfig` — the frozen per-`(market, mode)` configuration record.

use serde::{Deserialize, Serialize};

use crate::error::PoolError;

/// Recognized configuration options for one `PoolInstance`, per spec.md §3.
///
/// `UpdateConfig` validates a patch against `validate()` before persisting;
/// unknown patch fields are rejected as `InvalidArgument` at the HTTP/patch
/// layer (the typed struct itself cannot hold unknown fields — that is the
/// point of closing the dynamic keyword-update surface from the source).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolConfig {
    pub upstream_api_url: String,
    pub upstream_enabled: bool,
    pub batch_size: u32,
    pub target_size: u32,
    pub low_watermark: u32,
    pub proxy_lifetime_minutes: u32,
    pub rotation_interval_minutes: u32,
    pub auto_start_enabled: bool,
    pub pre_market_start_minutes: u32,
    pub post_market_stop_minutes: u32,
    pub backfill_enabled: bool,
    pub backfill_duration_hours: u32,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            upstream_api_url: String::new(),
            upstream_enabled: false,
            batch_size: 20,
            target_size: 20,
            low_watermark: 5,
            proxy_lifetime_minutes: 15,
            rotation_interval_minutes: 7,
            auto_start_enabled: true,
            pre_market_start_minutes: 30,
            post_market_stop_minutes: 30,
            backfill_enabled: false,
            backfill_duration_hours: 4,
        }
    }
}

impl PoolConfig {
    /// Enforce the ranges named in spec.md §3. Called by `UpdateConfig` and
    /// by initial load.
    pub fn validate(&self) -> Result<(), PoolError> {
        if self.batch_size < 1 || self.batch_size > 400 {
            return Err(PoolError::InvalidArgument(format!(
                "batch_size must be in 1..=400, got {}",
                self.batch_size
            )));
        }
        if self.target_size == 0 {
            return Err(PoolError::InvalidArgument("target_size must be positive".into()));
        }
        if self.rotation_interval_minutes == 0 {
            return Err(PoolError::InvalidArgument(
                "rotation_interval_minutes must be positive".into(),
            ));
        }
        if self.backfill_enabled && self.backfill_duration_hours == 0 {
            return Err(PoolError::InvalidArgument(
                "backfill_duration_hours must be positive when backfill_enabled".into(),
            ));
        }
        Ok(())
    }
}
