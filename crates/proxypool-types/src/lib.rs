//! Wire and data model types for the multi-market rotating proxy pool.
//!
//! This crate holds no business logic — it is the shared vocabulary between
//! `proxypool-core` (the rotation engine) and `proxypool-server` (the HTTP
//! surface): the `Market`/`PoolMode` identity, the `Proxy`/`PoolConfig`
//! records, and the error kinds used across the workspace.

pub mod config;
pub mod error;
pub mod market;
pub mod proxy;
pub mod status;

pub use config::PoolConfig;
pub use error::{PoolError, PoolResult};
pub use market::{Market, PoolIdentity, PoolMode};
pub use proxy::{HealthState, Proxy, ProxyDiagnostic, FAILURE_EVICTION_THRESHOLD};
pub use status::{
    ActiveSlot, DayType, MarketStatus, PersistedStatus, PoolStatus, SessionKind, WatermarkLevel,
};
