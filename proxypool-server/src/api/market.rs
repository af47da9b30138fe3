//! `GET /{market}/proxy`, `POST /{market}/proxy/failure`,
//! `GET /{market}/proxies/list` — the request-routing endpoints, all
//! scoped to `(market, LIVE)` per spec.md §6.

use axum::extract::{Path, Query, State};
use axum::response::Json;
use chrono::Utc;
use proxypool_types::{Market, PoolError, PoolMode, ProxyDiagnostic};
use serde::Deserialize;

use crate::error::{AppError, ApiResult};
use crate::state::AppState;

use super::dto::{Empty, Envelope, ProxiesListResponse, ProxyResponse};

pub(crate) fn parse_market(raw: &str) -> Result<Market, AppError> {
    raw.parse::<Market>().map_err(AppError)
}

#[derive(Debug, Deserialize)]
pub struct ProxyTypeQuery {
    pub proxy_type: Option<String>,
}

pub async fn get_proxy(
    State(state): State<AppState>,
    Path(market): Path<String>,
    Query(query): Query<ProxyTypeQuery>,
) -> ApiResult<Json<Envelope<ProxyResponse>>> {
    let market = parse_market(&market)?;
    let instance = state
        .instance(market, PoolMode::Live)
        .ok_or_else(|| AppError(PoolError::NotFound(format!("no LIVE instance for {market}"))))?;
    let proxy = instance.get_proxy().await?;
    Ok(Json(Envelope::ok(ProxyResponse::from_proxy(market, query.proxy_type, proxy))))
}

#[derive(Debug, Deserialize)]
pub struct FailureBody {
    pub proxy: String,
    #[serde(default)]
    #[allow(dead_code)]
    pub reason: Option<String>,
}

pub async fn report_failure(
    State(state): State<AppState>,
    Path(market): Path<String>,
    Json(body): Json<FailureBody>,
) -> ApiResult<Json<Envelope<Empty>>> {
    let market = parse_market(&market)?;
    let instance = state
        .instance(market, PoolMode::Live)
        .ok_or_else(|| AppError(PoolError::NotFound(format!("no LIVE instance for {market}"))))?;
    instance.report_failure(&body.proxy).await?;
    Ok(Json(Envelope::ok(Empty {})))
}

pub async fn list_proxies(
    State(state): State<AppState>,
    Path(market): Path<String>,
) -> ApiResult<Json<Envelope<ProxiesListResponse>>> {
    let market = parse_market(&market)?;
    let instance = state
        .instance(market, PoolMode::Live)
        .ok_or_else(|| AppError(PoolError::NotFound(format!("no LIVE instance for {market}"))))?;
    let (active, standby) = instance.diagnostic().await?;
    let now = Utc::now();
    Ok(Json(Envelope::ok(ProxiesListResponse {
        market,
        mode: PoolMode::Live,
        active_size: active.len(),
        standby_size: standby.len(),
        active: active.iter().map(|p| ProxyDiagnostic::from_proxy(p, now)).collect(),
        standby: standby.iter().map(|p| ProxyDiagnostic::from_proxy(p, now)).collect(),
    })))
}
