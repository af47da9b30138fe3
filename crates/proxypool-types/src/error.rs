//! Unified error type for the proxy-pool workspace.

use serde::Serialize;
use thiserror::Error;

/// Error kinds shared by `proxypool-core` and `proxypool-server`.
///
/// One `thiserror`-derived enum, `#[non_exhaustive]`, with a `status_code`
/// helper so the HTTP layer implements the kind-to-status mapping in one
/// place instead of per-handler matches.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum PoolError {
    /// No instance for `(market, mode)`, or an operation references an
    /// unknown proxy.
    #[error("not found: {0}")]
    NotFound(String),

    /// Operation requires a running instance.
    #[error("pool instance is not running: {0}")]
    NotRunning(String),

    /// `Start(force=false)` attempted outside the trading window.
    #[error("market is closed: {0}")]
    MarketClosed(String),

    /// Bad market code, unknown RPC event, negative sizes, unrecognized
    /// config field, …
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Vendor HTTP failure after retries.
    #[error("upstream error: {0}")]
    UpstreamError(String),

    /// Vendor rate-limit sentinel detected. Treated as a soft, non-error
    /// condition in the maintenance loop; never surfaced to HTTP clients.
    #[error("upstream rate limited")]
    UpstreamRateLimited,

    /// Config/status store unavailable. Swallowed for status writes,
    /// surfaced for config writes.
    #[error("persistence error: {0}")]
    PersistenceError(String),

    /// Task stopped due to `Stop()` or process shutdown.
    #[error("operation cancelled")]
    Cancelled,
}

impl PoolError {
    /// HTTP status code for this error kind, per the propagation policy.
    pub fn status_code(&self) -> u16 {
        match self {
            PoolError::NotFound(_) => 404,
            PoolError::NotRunning(_)
            | PoolError::InvalidArgument(_)
            | PoolError::MarketClosed(_) => 400,
            PoolError::UpstreamError(_) | PoolError::PersistenceError(_) => 500,
            PoolError::UpstreamRateLimited | PoolError::Cancelled => 500,
        }
    }

    /// Stable machine-readable tag used in the `{status:"error", kind, detail}`
    /// response envelope.
    pub fn kind(&self) -> &'static str {
        match self {
            PoolError::NotFound(_) => "not_found",
            PoolError::NotRunning(_) => "not_running",
            PoolError::MarketClosed(_) => "market_closed",
            PoolError::InvalidArgument(_) => "invalid_argument",
            PoolError::UpstreamError(_) => "upstream_error",
            PoolError::UpstreamRateLimited => "upstream_rate_limited",
            PoolError::PersistenceError(_) => "persistence_error",
            PoolError::Cancelled => "cancelled",
        }
    }
}

impl Serialize for PoolError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.to_string().as_str())
    }
}

pub type PoolResult<T> = Result<T, PoolError>;
