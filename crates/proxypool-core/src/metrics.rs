//! Prometheus metrics for pool observability.
//!
//! Grounded in the teacher's `proxy::prometheus` module: a global
//! `PrometheusHandle` installed once at startup, `describe_*!` calls
//! registering each series, and small `record_*`/`update_*` free functions
//! called from the places that already compute the numbers (`PoolEngine`
//! snapshots, `HealthChecker` summaries, `PoolEngine::swap`).

use std::sync::OnceLock;

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use proxypool_types::{Market, PoolMode};

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the recorder and register metric descriptions. Idempotent —
/// safe to call once per process at startup.
pub fn init_metrics() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| {
            let handle = PrometheusBuilder::new()
                .install_recorder()
                .expect("failed to install prometheus metrics recorder");

            describe_gauge!("proxypool_active_size", "Proxies in the active buffer");
            describe_gauge!("proxypool_standby_size", "Proxies in the standby buffer");
            describe_counter!(
                "proxypool_requests_total",
                "Total GetProxy calls, by market/mode"
            );
            describe_counter!(
                "proxypool_requests_success_total",
                "GetProxy calls that returned a proxy"
            );
            describe_counter!(
                "proxypool_requests_empty_total",
                "GetProxy calls with no healthy proxy available"
            );
            describe_counter!(
                "proxypool_failures_total",
                "ReportFailure calls, by market/mode"
            );
            describe_counter!("proxypool_rotations_total", "Completed A/B swaps");
            describe_gauge!("proxypool_healthy_count", "Proxies passing health probes");
            describe_gauge!(
                "proxypool_unhealthy_count",
                "Proxies failing health probes"
            );
            describe_gauge!(
                "proxypool_running",
                "1 if the (market, mode) instance is running, else 0"
            );

            handle
        })
        .clone()
}

fn labels(market: Market, mode: PoolMode) -> [(&'static str, String); 2] {
    [("market", market.as_str().to_string()), ("mode", mode.to_string())]
}

pub fn record_request(market: Market, mode: PoolMode, found: bool) {
    let l = labels(market, mode);
    counter!("proxypool_requests_total", &l).increment(1);
    if found {
        counter!("proxypool_requests_success_total", &l).increment(1);
    } else {
        counter!("proxypool_requests_empty_total", &l).increment(1);
    }
}

pub fn record_failure(market: Market, mode: PoolMode) {
    counter!("proxypool_failures_total", &labels(market, mode)).increment(1);
}

pub fn record_rotation(market: Market, mode: PoolMode) {
    counter!("proxypool_rotations_total", &labels(market, mode)).increment(1);
}

pub fn update_running_gauge(market: Market, mode: PoolMode, running: bool) {
    gauge!("proxypool_running", &labels(market, mode)).set(if running { 1.0 } else { 0.0 });
}

#[allow(clippy::too_many_arguments)]
pub fn update_pool_gauges(
    market: Market,
    mode: PoolMode,
    active_size: usize,
    standby_size: usize,
    healthy: usize,
    unhealthy: usize,
) {
    let l = labels(market, mode);
    gauge!("proxypool_active_size", &l).set(active_size as f64);
    gauge!("proxypool_standby_size", &l).set(standby_size as f64);
    gauge!("proxypool_healthy_count", &l).set(healthy as f64);
    gauge!("proxypool_unhealthy_count", &l).set(unhealthy as f64);
}

/// Render the current snapshot in Prometheus text exposition format.
pub fn render_metrics() -> String {
    match PROMETHEUS_HANDLE.get() {
        Some(handle) => handle.render(),
        None => String::from("# metrics not initialized\n"),
    }
}
