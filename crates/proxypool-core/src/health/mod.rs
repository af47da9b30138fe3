//! C3 — HealthChecker: concurrent active probing with consecutive-failure
//! eviction.
//!
//! Per-proxy state lives in a `DashMap` keyed by address, following the
//! teacher's `HealthMonitor`/`CircuitBreakerManager` shape (a lock-free map
//! of per-entity atomic-ish state) restyled to call back into
//! `PoolEngine::evict_unhealthy` instead of flipping a circuit open.

mod stats;

pub use stats::HealthStats;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use futures::stream::{FuturesUnordered, StreamExt};
use proxypool_types::PoolError;
use tokio::sync::{watch, Semaphore};
use tracing::{debug, warn};

use crate::fetcher::RetryStrategy;
use crate::pool::PoolEngine;

/// Echo endpoints probed in order; the first reachable one decides the
/// probe's outcome (spec.md §4.3).
pub const ECHO_ENDPOINTS: &[&str] =
    &["http://httpbin.org/ip", "http://icanhazip.com", "http://ipinfo.io/ip", "http://api.ipify.org"];

/// Consecutive failed probes that evict a proxy.
pub const FAILURE_THRESHOLD: u32 = 3;
/// Consecutive successful probes required to restore an unhealthy proxy.
pub const SUCCESS_THRESHOLD: u32 = 2;
/// Default interval between health-check batches.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(300);
/// Max concurrent in-flight probes per batch.
pub const MAX_CONCURRENT_PROBES: usize = 8;
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Outcome of probing one proxy's reachability this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Ok,
    Fail,
}

/// Concurrently probes a set of proxy addresses and tracks consecutive
/// successes/failures per address, requesting eviction once an address
/// crosses `FAILURE_THRESHOLD`.
pub struct HealthChecker {
    stats: DashMap<String, HealthStats>,
    semaphore: Arc<Semaphore>,
}

impl Default for HealthChecker {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthChecker {
    pub fn new() -> Self {
        Self { stats: DashMap::new(), semaphore: Arc::new(Semaphore::new(MAX_CONCURRENT_PROBES)) }
    }

    /// Drop tracked state for addresses no longer present in the engine
    /// (evicted by `ReportFailure` or cleared by a swap).
    pub fn reconcile(&self, live_addresses: &[String]) {
        let live: std::collections::HashSet<&str> =
            live_addresses.iter().map(String::as_str).collect();
        self.stats.retain(|addr, _| live.contains(addr.as_str()));
    }

    pub fn summary(&self) -> HealthSummary {
        let mut healthy = 0usize;
        let mut unhealthy = 0usize;
        for entry in self.stats.iter() {
            if entry.healthy {
                healthy += 1;
            } else {
                unhealthy += 1;
            }
        }
        HealthSummary { healthy, unhealthy }
    }

    /// Probe every address in `addresses` concurrently (bounded by
    /// `MAX_CONCURRENT_PROBES`) and return the addresses that should be
    /// evicted this cycle. The caller (`PoolInstance`) is responsible for
    /// actually calling `PoolEngine::evict_unhealthy` — this type never
    /// touches the engine's buffers directly (spec.md §4.3, §5).
    pub async fn run_cycle(&self, addresses: &[String]) -> Vec<String> {
        self.reconcile(addresses);

        let mut tasks = FuturesUnordered::new();
        for addr in addresses {
            let addr = addr.clone();
            let semaphore = Arc::clone(&self.semaphore);
            tasks.push(async move {
                let _permit = semaphore.acquire().await.expect("semaphore is never closed");
                let started = std::time::Instant::now();
                let outcome = probe_with_retry(&addr).await;
                (addr, outcome, started.elapsed())
            });
        }

        let mut to_evict = Vec::new();
        while let Some((addr, outcome, elapsed)) = tasks.next().await {
            if let Some(evict) = self.record_outcome_timed(&addr, outcome, elapsed) {
                to_evict.push(evict);
            }
        }
        to_evict
    }

    /// Apply one probe outcome to an address's state machine, returning
    /// `Some(address)` if this transition should trigger eviction.
    fn record_outcome(&self, addr: &str, outcome: ProbeOutcome) -> Option<String> {
        self.record_outcome_timed(addr, outcome, Duration::ZERO)
    }

    /// Same as `record_outcome`, additionally recording the probe's
    /// round-trip time (spec.md §3 "HealthStats": last response time).
    fn record_outcome_timed(
        &self,
        addr: &str,
        outcome: ProbeOutcome,
        elapsed: Duration,
    ) -> Option<String> {
        let mut entry = self.stats.entry(addr.to_string()).or_insert_with(HealthStats::new);
        entry.total_checks += 1;
        entry.last_check_time = Some(Utc::now());
        if outcome == ProbeOutcome::Ok {
            entry.last_response_time = Some(elapsed);
        }

        match (entry.healthy, outcome) {
            (true, ProbeOutcome::Ok) => {
                entry.consecutive_successes += 1;
                entry.consecutive_failures = 0;
                entry.last_error = None;
                None
            },
            (true, ProbeOutcome::Fail) => {
                entry.consecutive_failures += 1;
                entry.consecutive_successes = 0;
                entry.last_error = Some("probe failed".to_string());
                if entry.consecutive_failures >= FAILURE_THRESHOLD {
                    entry.healthy = false;
                    warn!(address = %addr, "health checker evicting proxy after consecutive failures");
                    Some(addr.to_string())
                } else {
                    None
                }
            },
            (false, ProbeOutcome::Ok) => {
                entry.consecutive_successes += 1;
                entry.consecutive_failures = 0;
                if entry.consecutive_successes >= SUCCESS_THRESHOLD {
                    entry.healthy = true;
                    debug!(address = %addr, "proxy restored to healthy after recovery probes");
                }
                None
            },
            (false, ProbeOutcome::Fail) => {
                entry.consecutive_failures += 1;
                entry.consecutive_successes = 0;
                entry.last_error = Some("probe failed".to_string());
                None
            },
        }
    }
}

/// Summary returned for `PoolStatus`/`GET /status`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HealthSummary {
    pub healthy: usize,
    pub unhealthy: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn healthy_proxy_survives_failures_below_threshold() {
        let checker = HealthChecker::new();
        assert!(checker.record_outcome("1.1.1.1:80", ProbeOutcome::Fail).is_none());
        assert!(checker.record_outcome("1.1.1.1:80", ProbeOutcome::Fail).is_none());
        assert_eq!(checker.stats.get("1.1.1.1:80").unwrap().consecutive_failures, 2);
    }

    #[test]
    fn healthy_proxy_is_evicted_at_the_failure_threshold() {
        let checker = HealthChecker::new();
        checker.record_outcome("1.1.1.1:80", ProbeOutcome::Fail);
        checker.record_outcome("1.1.1.1:80", ProbeOutcome::Fail);
        let evicted = checker.record_outcome("1.1.1.1:80", ProbeOutcome::Fail);
        assert_eq!(evicted, Some("1.1.1.1:80".to_string()));
        assert!(!checker.stats.get("1.1.1.1:80").unwrap().healthy);
    }

    #[test]
    fn a_success_resets_the_failure_streak() {
        let checker = HealthChecker::new();
        checker.record_outcome("1.1.1.1:80", ProbeOutcome::Fail);
        checker.record_outcome("1.1.1.1:80", ProbeOutcome::Fail);
        checker.record_outcome("1.1.1.1:80", ProbeOutcome::Ok);
        let entry = checker.stats.get("1.1.1.1:80").unwrap();
        assert_eq!(entry.consecutive_failures, 0);
        assert!(entry.healthy);
    }

    #[test]
    fn unhealthy_proxy_requires_consecutive_successes_to_recover() {
        let checker = HealthChecker::new();
        checker.record_outcome("1.1.1.1:80", ProbeOutcome::Fail);
        checker.record_outcome("1.1.1.1:80", ProbeOutcome::Fail);
        checker.record_outcome("1.1.1.1:80", ProbeOutcome::Fail);
        assert!(!checker.stats.get("1.1.1.1:80").unwrap().healthy);

        checker.record_outcome("1.1.1.1:80", ProbeOutcome::Ok);
        assert!(!checker.stats.get("1.1.1.1:80").unwrap().healthy);

        checker.record_outcome("1.1.1.1:80", ProbeOutcome::Ok);
        assert!(checker.stats.get("1.1.1.1:80").unwrap().healthy);
    }

    #[test]
    fn reconcile_drops_addresses_no_longer_live() {
        let checker = HealthChecker::new();
        checker.record_outcome("1.1.1.1:80", ProbeOutcome::Ok);
        checker.record_outcome("2.2.2.2:80", ProbeOutcome::Ok);
        checker.reconcile(&["1.1.1.1:80".to_string()]);
        assert!(checker.stats.contains_key("1.1.1.1:80"));
        assert!(!checker.stats.contains_key("2.2.2.2:80"));
    }

    #[test]
    fn a_successful_probe_records_a_response_time_but_a_failure_does_not() {
        let checker = HealthChecker::new();
        checker.record_outcome_timed("1.1.1.1:80", ProbeOutcome::Ok, Duration::from_millis(42));
        assert_eq!(
            checker.stats.get("1.1.1.1:80").unwrap().last_response_time,
            Some(Duration::from_millis(42))
        );

        checker.record_outcome_timed("2.2.2.2:80", ProbeOutcome::Fail, Duration::from_millis(7));
        assert!(checker.stats.get("2.2.2.2:80").unwrap().last_response_time.is_none());
    }

    #[test]
    fn summary_counts_healthy_and_unhealthy_entries() {
        let checker = HealthChecker::new();
        checker.record_outcome("1.1.1.1:80", ProbeOutcome::Ok);
        checker.record_outcome("2.2.2.2:80", ProbeOutcome::Fail);
        checker.record_outcome("2.2.2.2:80", ProbeOutcome::Fail);
        checker.record_outcome("2.2.2.2:80", ProbeOutcome::Fail);
        let summary = checker.summary();
        assert_eq!(summary.healthy, 1);
        assert_eq!(summary.unhealthy, 1);
    }
}

async fn probe_with_retry(address: &str) -> ProbeOutcome {
    let address = address.to_string();
    let result: Result<(), PoolError> =
        RetryStrategy::probe_default().run(|| probe_once(&address)).await;
    match result {
        Ok(()) => ProbeOutcome::Ok,
        Err(_) => ProbeOutcome::Fail,
    }
}

async fn probe_once(address: &str) -> Result<(), PoolError> {
    let proxy = reqwest::Proxy::all(format!("http://{address}"))
        .map_err(|e| PoolError::UpstreamError(format!("invalid proxy address: {e}")))?;
    let probing_client = reqwest::Client::builder()
        .timeout(PROBE_TIMEOUT)
        .proxy(proxy)
        .build()
        .map_err(|e| PoolError::UpstreamError(format!("failed to build probing client: {e}")))?;

    for endpoint in ECHO_ENDPOINTS {
        match probing_client.get(*endpoint).send().await {
            Ok(resp) if resp.status().is_success() => return Ok(()),
            _ => continue,
        }
    }
    Err(PoolError::UpstreamError(format!("no echo endpoint reachable through {address}")))
}

/// Background loop: one batch every `interval`, probing every address
/// currently held by `engine` and requesting eviction of any that cross
/// the failure threshold. Runs until `shutdown` is signaled.
pub async fn run_loop(
    checker: Arc<HealthChecker>,
    engine: Arc<PoolEngine>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if *shutdown.borrow() {
                    return;
                }
                let addresses = engine.all_addresses();
                let evictions = checker.run_cycle(&addresses).await;
                if !evictions.is_empty() {
                    engine.evict_unhealthy(&evictions);
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    return;
                }
            }
        }
    }
}
