//! Proxy-pool rotation engine.
//!
//! Six components, leaves first: [`clock`] (C1, market trading sessions),
//! [`fetcher`] (C2, upstream vendor integration), [`health`] (C3, active
//! probing and eviction), [`pool`] (C4/C5, the A/B rotation core and the
//! per-`(market,mode)` instance that owns it), [`scheduler`] (C6, the
//! global start/stop sweep), and [`repository`] (the config/status
//! persistence trait). See `DESIGN.md` for the grounding of each piece in
//! the retrieval pack.

pub mod clock;
pub mod fetcher;
pub mod health;
pub mod metrics;
pub mod pool;
pub mod repository;
pub mod scheduler;

pub use proxypool_types::{PoolError, PoolResult};
