//! The `Proxy` record and its health state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Health state of a single proxy as tracked by the pool engine.
///
/// A proxy is *healthy* iff `state == Active` and `consecutive_failures < 3`
/// — see `Proxy::is_healthy`. `Failed` is terminal from the engine's point
/// of view: a failed proxy is removed, not merely marked, on the next
/// mutation that observes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthState {
    Active,
    Failed,
}

/// An outbound proxy endpoint served to downstream clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proxy {
    /// `host:port`.
    pub address: String,
    pub created_at: DateTime<Utc>,
    pub last_used: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
    pub state: HealthState,
}

/// Threshold at which consecutive probe/report failures make a proxy
/// unhealthy (§3, §4.3: "Eviction occurs when consecutive failures reach 3").
pub const FAILURE_EVICTION_THRESHOLD: u32 = 3;

impl Proxy {
    pub fn new(address: String, created_at: DateTime<Utc>) -> Self {
        Self {
            address,
            created_at,
            last_used: None,
            consecutive_failures: 0,
            state: HealthState::Active,
        }
    }

    /// `state == Active && consecutive_failures < 3`.
    pub fn is_healthy(&self) -> bool {
        self.state == HealthState::Active && self.consecutive_failures < FAILURE_EVICTION_THRESHOLD
    }

    pub fn mark_used(&mut self, at: DateTime<Utc>) {
        self.last_used = Some(at);
    }

    pub fn record_failure(&mut self) {
        self.consecutive_failures += 1;
        if self.consecutive_failures >= FAILURE_EVICTION_THRESHOLD {
            self.state = HealthState::Failed;
        }
    }

    pub fn age_seconds(&self, now: DateTime<Utc>) -> i64 {
        (now - self.created_at).num_seconds().max(0)
    }
}

/// A diagnostic-only projection of `Proxy` for `GET /{market}/proxies/list`.
///
/// `original_source/`'s diagnostic dump includes per-proxy age and
/// last-used-at alongside buffer membership; kept here since these are
/// already-tracked fields and nothing in the Non-goals excludes diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyDiagnostic {
    pub address: String,
    pub age_seconds: i64,
    pub last_used_seconds_ago: Option<i64>,
    pub consecutive_failures: u32,
    pub healthy: bool,
}

impl ProxyDiagnostic {
    pub fn from_proxy(p: &Proxy, now: DateTime<Utc>) -> Self {
        Self {
            address: p.address.clone(),
            age_seconds: p.age_seconds(now),
            last_used_seconds_ago: p.last_used.map(|t| (now - t).num_seconds().max(0)),
            consecutive_failures: p.consecutive_failures,
            healthy: p.is_healthy(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_proxy_is_healthy() {
        let p = Proxy::new("1.2.3.4:8080".into(), Utc::now());
        assert!(p.is_healthy());
        assert_eq!(p.consecutive_failures, 0);
    }

    #[test]
    fn becomes_unhealthy_at_threshold() {
        let mut p = Proxy::new("1.2.3.4:8080".into(), Utc::now());
        p.record_failure();
        assert!(p.is_healthy());
        p.record_failure();
        assert!(p.is_healthy());
        p.record_failure();
        assert!(!p.is_healthy());
        assert_eq!(p.state, HealthState::Failed);
    }

    #[test]
    fn mark_used_sets_last_used() {
        let mut p = Proxy::new("1.2.3.4:8080".into(), Utc::now());
        assert!(p.last_used.is_none());
        let now = Utc::now();
        p.mark_used(now);
        assert_eq!(p.last_used, Some(now));
    }

    #[test]
    fn age_seconds_never_negative() {
        let future = Utc::now() + chrono::Duration::minutes(5);
        let p = Proxy::new("1.2.3.4:8080".into(), future);
        assert_eq!(p.age_seconds(Utc::now()), 0);
    }
}
