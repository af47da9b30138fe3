//! The `/api/v1` surface: one module per endpoint group, matching the
//! table in spec.md §6.

pub mod dto;
pub mod health;
pub mod market;
pub mod pools;
pub mod rpc;
pub mod scheduler;

#[cfg(test)]
mod scenarios_tests;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// Builds every route named in spec.md §6, nested under `/api/v1` by the
/// caller (`crate::router::build_router`).
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/rpc", post(rpc::handle_rpc))
        .route("/:market/proxy", get(market::get_proxy))
        .route("/:market/proxy/failure", post(market::report_failure))
        .route("/:market/proxies/list", get(market::list_proxies))
        .route("/pools", get(pools::list_pools))
        .route("/status", get(pools::get_status))
        .route("/metrics", get(pools::get_metrics))
        .route("/config", get(pools::get_config).post(pools::patch_config))
        .route("/start", post(pools::start_pool))
        .route("/stop", post(pools::stop_pool))
        .route("/backfill/start", post(pools::backfill_start))
        .route("/config/hailiang/test", post(pools::hailiang_test))
        .route("/batch/start", post(pools::batch_start))
        .route("/batch/stop", post(pools::batch_stop))
        .route("/scheduler/status", get(scheduler::status))
        .route("/scheduler/force-start/:market", post(scheduler::force_start))
        .route("/scheduler/force-stop/:market", post(scheduler::force_stop))
        .route("/health", get(health::liveness))
        .route("/metrics/prometheus", get(health::prometheus_metrics))
}
