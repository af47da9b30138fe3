//! Lifecycle/config endpoints (spec.md §6): `/pools`, `/status`,
//! `/metrics`, `/config`, `/start`, `/stop`, `/backfill/start`,
//! `/config/hailiang/test`, `/batch/{start,stop}`.

use axum::extract::{Query, State};
use axum::response::Json;
use proxypool_types::{Market, PoolConfig, PoolError, PoolMode};
use serde::Serialize;

use crate::error::{AppError, ApiResult};
use crate::state::AppState;

use super::dto::{
    BackfillStartRequest, BatchRequest, BatchResultEntry, Empty, Envelope, HailiangTestRequest,
    HailiangTestResponse, MarketModeQuery, PoolListEntry, StartQuery,
};

fn require_instance(
    state: &AppState,
    market: Market,
    mode: PoolMode,
) -> Result<std::sync::Arc<proxypool_core::pool::PoolInstance>, AppError> {
    state
        .instance(market, mode)
        .ok_or_else(|| AppError(PoolError::NotFound(format!("no instance for {market}:{mode}"))))
}

pub async fn list_pools(State(state): State<AppState>) -> Json<Envelope<Vec<PoolListEntry>>> {
    let mut entries = Vec::new();
    for entry in state.inner.instances.iter() {
        let instance = entry.value();
        entries.push(PoolListEntry {
            market: instance.identity().market,
            mode: instance.identity().mode,
            is_running: instance.is_running(),
            manually_started: instance.is_manually_started(),
        });
    }
    entries.sort_by_key(|e| (e.market, e.mode));
    Json(Envelope::ok(entries))
}

pub async fn get_status(
    State(state): State<AppState>,
    Query(query): Query<MarketModeQuery>,
) -> ApiResult<Json<Envelope<proxypool_types::PoolStatus>>> {
    let instance = require_instance(&state, query.market, query.mode)?;
    Ok(Json(Envelope::ok(instance.status().await)))
}

#[derive(Serialize)]
pub struct MetricsResponse {
    pub total_requests: u64,
    pub success_count: u64,
    pub failure_count: u64,
    pub no_proxy_count: u64,
    pub active_size: usize,
    pub standby_size: usize,
    pub healthy_count: usize,
    pub unhealthy_count: usize,
}

pub async fn get_metrics(
    State(state): State<AppState>,
    Query(query): Query<MarketModeQuery>,
) -> ApiResult<Json<Envelope<MetricsResponse>>> {
    let instance = require_instance(&state, query.market, query.mode)?;
    let status = instance.status().await;
    Ok(Json(Envelope::ok(MetricsResponse {
        total_requests: status.total_requests,
        success_count: status.success_count,
        failure_count: status.failure_count,
        no_proxy_count: status.no_proxy_count,
        active_size: status.active_size,
        standby_size: status.standby_size,
        healthy_count: status.healthy_count,
        unhealthy_count: status.unhealthy_count,
    })))
}

pub async fn get_config(
    State(state): State<AppState>,
    Query(query): Query<MarketModeQuery>,
) -> ApiResult<Json<Envelope<PoolConfig>>> {
    let instance = require_instance(&state, query.market, query.mode)?;
    Ok(Json(Envelope::ok(instance.config().await)))
}

pub async fn patch_config(
    State(state): State<AppState>,
    Query(query): Query<MarketModeQuery>,
    Json(patch): Json<PoolConfig>,
) -> ApiResult<Json<Envelope<Empty>>> {
    let instance = require_instance(&state, query.market, query.mode)?;
    instance.update_config(patch).await?;
    Ok(Json(Envelope::ok(Empty {})))
}

#[derive(Serialize)]
pub struct StartResponse {
    pub is_running: bool,
}

pub async fn start_pool(
    State(state): State<AppState>,
    Query(query): Query<StartQuery>,
) -> ApiResult<Json<Envelope<StartResponse>>> {
    let instance = require_instance(&state, query.market, query.mode)?;
    instance.start(query.force).await?;
    Ok(Json(Envelope::ok(StartResponse { is_running: true })))
}

pub async fn stop_pool(
    State(state): State<AppState>,
    Query(query): Query<MarketModeQuery>,
) -> ApiResult<Json<Envelope<StartResponse>>> {
    let instance = require_instance(&state, query.market, query.mode)?;
    instance.stop().await?;
    Ok(Json(Envelope::ok(StartResponse { is_running: false })))
}

pub async fn backfill_start(
    State(state): State<AppState>,
    Json(body): Json<BackfillStartRequest>,
) -> ApiResult<Json<Envelope<StartResponse>>> {
    let instance = require_instance(&state, body.market, PoolMode::Backfill)?;
    instance.start_manual(body.duration_hours).await?;
    Ok(Json(Envelope::ok(StartResponse { is_running: true })))
}

/// `POST /config/hailiang/test` — dry-run upstream fetch against a candidate
/// vendor URL, named after the vendor in the original service.
pub async fn hailiang_test(
    Json(body): Json<HailiangTestRequest>,
) -> Json<Envelope<HailiangTestResponse>> {
    let fetcher = proxypool_core::fetcher::VendorFetcher::new(&body.api_url);
    let response = match proxypool_core::fetcher::ProxyFetcher::fetch(&fetcher, 1).await {
        Ok(addrs) => HailiangTestResponse { reachable: true, count: addrs.len(), detail: None },
        Err(e) => HailiangTestResponse { reachable: false, count: 0, detail: Some(e.to_string()) },
    };
    Json(Envelope::ok(response))
}

pub async fn batch_start(
    State(state): State<AppState>,
    Json(body): Json<BatchRequest>,
) -> Json<Envelope<Vec<BatchResultEntry>>> {
    let mut results = Vec::with_capacity(body.markets.len());
    for market in body.markets {
        let result = match require_instance(&state, market, body.mode) {
            Ok(instance) => match instance.start(false).await {
                Ok(_) => BatchResultEntry { market, ok: true, detail: None },
                Err(e) => BatchResultEntry { market, ok: false, detail: Some(e.to_string()) },
            },
            Err(e) => BatchResultEntry { market, ok: false, detail: Some(e.0.to_string()) },
        };
        results.push(result);
    }
    Json(Envelope::ok(results))
}

pub async fn batch_stop(
    State(state): State<AppState>,
    Json(body): Json<BatchRequest>,
) -> Json<Envelope<Vec<BatchResultEntry>>> {
    let mut results = Vec::with_capacity(body.markets.len());
    for market in body.markets {
        let result = match require_instance(&state, market, body.mode) {
            Ok(instance) => match instance.stop().await {
                Ok(()) => BatchResultEntry { market, ok: true, detail: None },
                Err(e) => BatchResultEntry { market, ok: false, detail: Some(e.to_string()) },
            },
            Err(e) => BatchResultEntry { market, ok: false, detail: Some(e.0.to_string()) },
        };
        results.push(result);
    }
    Json(Envelope::ok(results))
}
