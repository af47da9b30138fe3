//! `POST /rpc` — the unified RPC endpoint (spec.md §6).

use axum::extract::State;
use axum::response::Json;
use proxypool_types::PoolError;

use crate::error::{AppError, ApiResult};
use crate::state::AppState;

use super::dto::{
    AckResponse, Envelope, PongResponse, ProxyResponse, RpcEvent, RpcRequest, RpcResponse,
};

pub async fn handle_rpc(
    State(state): State<AppState>,
    Json(req): Json<RpcRequest>,
) -> ApiResult<Json<Envelope<RpcResponse>>> {
    if req.event == RpcEvent::Ping {
        return Ok(Json(Envelope::ok(RpcResponse::Pong(PongResponse { pong: true }))));
    }

    let market = req
        .market
        .ok_or_else(|| AppError(PoolError::InvalidArgument("rpc event requires a market".into())))?;

    let instance = state
        .instance(market, req.mode)
        .ok_or_else(|| AppError(PoolError::NotFound(format!("no instance for {market}:{}", req.mode))))?;

    let response = match req.event {
        RpcEvent::GetProxy => {
            let proxy = instance.get_proxy().await?;
            RpcResponse::Proxy(ProxyResponse::from_proxy(market, req.proxy_type, proxy))
        },
        RpcEvent::ReportFailure => {
            let addr = req.proxy_addr.ok_or_else(|| {
                AppError(PoolError::InvalidArgument("report_failure requires proxy_addr".into()))
            })?;
            instance.report_failure(&addr).await?;
            RpcResponse::Ack(AckResponse { acknowledged: true })
        },
        RpcEvent::GetStatus => RpcResponse::Status(Box::new(instance.status().await)),
        RpcEvent::Ping => unreachable!("handled above"),
    };

    Ok(Json(Envelope::ok(response)))
}
