//! `GET /health` (liveness, per-instance running flags) and
//! `GET /metrics/prometheus` (the Prometheus exposition endpoint —
//! **[AMBIENT]**, see SPEC_FULL.md §6).

use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Json, Response};

use crate::state::AppState;

use super::dto::{Envelope, HealthResponse, PoolListEntry};

pub async fn liveness(State(state): State<AppState>) -> Json<Envelope<HealthResponse>> {
    let mut instances = Vec::new();
    for entry in state.inner.instances.iter() {
        let instance = entry.value();
        instances.push(PoolListEntry {
            market: instance.identity().market,
            mode: instance.identity().mode,
            is_running: instance.is_running(),
            manually_started: instance.is_manually_started(),
        });
    }
    instances.sort_by_key(|e| (e.market, e.mode));
    Json(Envelope::ok(HealthResponse { instances }))
}

pub async fn prometheus_metrics(State(state): State<AppState>) -> Response {
    for entry in state.inner.instances.iter() {
        let instance = entry.value();
        let status = instance.status().await;
        proxypool_core::metrics::update_running_gauge(
            instance.identity().market,
            instance.identity().mode,
            instance.is_running(),
        );
        proxypool_core::metrics::update_pool_gauges(
            instance.identity().market,
            instance.identity().mode,
            status.active_size,
            status.standby_size,
            status.healthy_count,
            status.unhealthy_count,
        );
    }
    let body = proxypool_core::metrics::render_metrics();
    ([(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")], body).into_response()
}
