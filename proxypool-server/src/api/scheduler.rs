//! `GET /scheduler/status`, `POST /scheduler/force-{start,stop}/{market}` —
//! `GlobalScheduler` introspection and operator overrides (spec.md §6,
//! §4.6).

use axum::extract::{Path, State};
use axum::response::Json;

use crate::error::ApiResult;
use crate::state::AppState;

use super::dto::{Empty, Envelope, SchedulerMarketEntry, SchedulerStatusResponse};
use super::market::parse_market;

pub async fn status(State(state): State<AppState>) -> Json<Envelope<SchedulerStatusResponse>> {
    let status = state.scheduler().status().await;
    let markets = status
        .markets
        .into_iter()
        .map(|m| SchedulerMarketEntry {
            market: m.market,
            mode: m.mode,
            is_running: m.is_running,
            manually_started: m.manually_started,
            auto_start_enabled: m.auto_start_enabled,
            next_boundary: m.next_boundary,
        })
        .collect();
    Json(Envelope::ok(SchedulerStatusResponse { markets }))
}

pub async fn force_start(
    State(state): State<AppState>,
    Path(market): Path<String>,
) -> ApiResult<Json<Envelope<Empty>>> {
    let market = parse_market(&market)?;
    state.scheduler().force_start_market(market).await?;
    Ok(Json(Envelope::ok(Empty {})))
}

pub async fn force_stop(
    State(state): State<AppState>,
    Path(market): Path<String>,
) -> ApiResult<Json<Envelope<Empty>>> {
    let market = parse_market(&market)?;
    state.scheduler().force_stop_market(market).await?;
    Ok(Json(Envelope::ok(Empty {})))
}
