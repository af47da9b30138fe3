//! Wire-level request/response shapes for the `/api/v1` surface (spec.md
//! §6). These are HTTP concerns, not shared business vocabulary, so they
//! live in the server crate rather than `proxypool-types`.

use proxypool_types::{Market, PoolMode, PoolStatus, Proxy, ProxyDiagnostic};
use serde::{Deserialize, Serialize};

/// Every successful response body is `{status:"ok", ...}`; see
/// `error::AppError` for the matching `{status:"error", ...}` shape.
#[derive(Serialize)]
pub struct Envelope<T: Serialize> {
    pub status: &'static str,
    #[serde(flatten)]
    pub data: T,
}

impl<T: Serialize> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self { status: "ok", data }
    }
}

/// Placeholder payload for endpoints whose success carries no data beyond
/// `{status:"ok"}`. `#[serde(flatten)]` requires a map-shaped inner value —
/// the unit type `()` is not one, so this empty struct stands in for it.
#[derive(Serialize)]
pub struct Empty {}

/// `POST /rpc` request body — unified RPC over the four named events.
#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    pub event: RpcEvent,
    pub market: Option<Market>,
    #[serde(default = "default_mode")]
    pub mode: PoolMode,
    pub proxy_type: Option<String>,
    pub proxy_addr: Option<String>,
}

fn default_mode() -> PoolMode {
    PoolMode::Live
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RpcEvent {
    GetProxy,
    ReportFailure,
    GetStatus,
    Ping,
}

#[derive(Serialize)]
#[serde(untagged)]
pub enum RpcResponse {
    Proxy(ProxyResponse),
    Ack(AckResponse),
    Status(Box<PoolStatus>),
    Pong(PongResponse),
}

#[derive(Serialize)]
pub struct AckResponse {
    pub acknowledged: bool,
}

#[derive(Serialize)]
pub struct PongResponse {
    pub pong: bool,
}

/// `{proxy, market, type, timestamp}` — named fields from spec.md §6.
#[derive(Serialize)]
pub struct ProxyResponse {
    pub proxy: Option<String>,
    pub market: Market,
    #[serde(rename = "type")]
    pub proxy_type: Option<String>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl ProxyResponse {
    pub fn from_proxy(market: Market, proxy_type: Option<String>, proxy: Option<Proxy>) -> Self {
        Self { proxy: proxy.map(|p| p.address), market, proxy_type, timestamp: chrono::Utc::now() }
    }
}

#[derive(Serialize)]
pub struct ProxiesListResponse {
    pub market: Market,
    pub mode: PoolMode,
    pub active_size: usize,
    pub standby_size: usize,
    pub active: Vec<ProxyDiagnostic>,
    pub standby: Vec<ProxyDiagnostic>,
}

/// Query parameters shared by `/status`, `/metrics`, `/config`, `/start`,
/// `/stop`.
#[derive(Debug, Deserialize)]
pub struct MarketModeQuery {
    pub market: Market,
    #[serde(default = "default_mode")]
    pub mode: PoolMode,
}

#[derive(Debug, Deserialize)]
pub struct StartQuery {
    pub market: Market,
    #[serde(default = "default_mode")]
    pub mode: PoolMode,
    #[serde(default)]
    pub force: bool,
}

#[derive(Serialize)]
pub struct PoolListEntry {
    pub market: Market,
    pub mode: PoolMode,
    pub is_running: bool,
    pub manually_started: bool,
}

#[derive(Debug, Deserialize)]
pub struct BackfillStartRequest {
    pub market: Market,
    pub duration_hours: u32,
}

#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    pub markets: Vec<Market>,
    #[serde(default = "default_mode")]
    pub mode: PoolMode,
}

#[derive(Serialize)]
pub struct BatchResultEntry {
    pub market: Market,
    pub ok: bool,
    pub detail: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HailiangTestRequest {
    pub api_url: String,
}

#[derive(Serialize)]
pub struct HailiangTestResponse {
    pub reachable: bool,
    pub count: usize,
    pub detail: Option<String>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub instances: Vec<PoolListEntry>,
}

/// `GET /scheduler/status` response — wraps `SchedulerStatus` with the
/// envelope's `status` field already accounted for by `Envelope<T>`.
#[derive(Serialize)]
pub struct SchedulerStatusResponse {
    pub markets: Vec<SchedulerMarketEntry>,
}

#[derive(Serialize)]
pub struct SchedulerMarketEntry {
    pub market: Market,
    pub mode: PoolMode,
    pub is_running: bool,
    pub manually_started: bool,
    pub auto_start_enabled: bool,
    pub next_boundary: Option<chrono::DateTime<chrono::Utc>>,
}
