//! Config/Status repository — the external collaborator from spec.md §1,
//! concretized as a trait (mirroring the teacher's `AccountRepository` in
//! `modules/repository.rs`) plus two in-process implementations.

mod in_memory;
mod sqlite;

pub use in_memory::InMemoryRepository;
pub use sqlite::SqliteRepository;

use async_trait::async_trait;
use proxypool_types::{Market, PersistedStatus, PoolConfig, PoolMode};
use thiserror::Error;

/// Repository-layer error — distinct from `PoolError` because a repository
/// implementation (e.g. `sqlx`) has its own failure modes that the caller
/// translates into `PoolError::PersistenceError`.
#[derive(Error, Debug)]
pub enum RepoError {
    #[error("repository backend error: {0}")]
    Backend(String),
}

pub type RepoResult<T> = Result<T, RepoError>;

/// A plain key-lookup + upsert interface over `(market, mode)`-keyed config
/// and status rows. Neither table holds individual proxy addresses — the
/// pool is memory-only and reconstructed on restart (spec.md §6).
#[async_trait]
pub trait PoolRepository: Send + Sync {
    async fn load_config(&self, market: Market, mode: PoolMode) -> RepoResult<Option<PoolConfig>>;
    async fn save_config(&self, market: Market, mode: PoolMode, cfg: &PoolConfig) -> RepoResult<()>;
    async fn load_status(&self, market: Market, mode: PoolMode)
        -> RepoResult<Option<PersistedStatus>>;
    async fn save_status(
        &self,
        market: Market,
        mode: PoolMode,
        status: &PersistedStatus,
    ) -> RepoResult<()>;
    /// All `(market, mode)` pairs with a persisted configuration row —
    /// used by `GlobalScheduler`'s per-tick sweep.
    async fn list_configured(&self) -> RepoResult<Vec<(Market, PoolMode, PoolConfig)>>;
}
