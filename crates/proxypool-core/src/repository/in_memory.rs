//! `DashMap`-backed reference repository. Used in tests and as the default
//! when no DSN is configured.

use async_trait::async_trait;
use dashmap::DashMap;
use proxypool_types::{Market, PersistedStatus, PoolConfig, PoolMode};

use super::{PoolRepository, RepoResult};

#[derive(Debug, Default)]
pub struct InMemoryRepository {
    configs: DashMap<(Market, PoolMode), PoolConfig>,
    statuses: DashMap<(Market, PoolMode), PersistedStatus>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a configuration row directly — used by the server's bootstrap
    /// and by tests that want a known starting config.
    pub fn seed_config(&self, market: Market, mode: PoolMode, cfg: PoolConfig) {
        self.configs.insert((market, mode), cfg);
    }
}

#[async_trait]
impl PoolRepository for InMemoryRepository {
    async fn load_config(&self, market: Market, mode: PoolMode) -> RepoResult<Option<PoolConfig>> {
        Ok(self.configs.get(&(market, mode)).map(|r| r.clone()))
    }

    async fn save_config(&self, market: Market, mode: PoolMode, cfg: &PoolConfig) -> RepoResult<()> {
        self.configs.insert((market, mode), cfg.clone());
        Ok(())
    }

    async fn load_status(
        &self,
        market: Market,
        mode: PoolMode,
    ) -> RepoResult<Option<PersistedStatus>> {
        Ok(self.statuses.get(&(market, mode)).map(|r| r.clone()))
    }

    async fn save_status(
        &self,
        market: Market,
        mode: PoolMode,
        status: &PersistedStatus,
    ) -> RepoResult<()> {
        self.statuses.insert((market, mode), status.clone());
        Ok(())
    }

    async fn list_configured(&self) -> RepoResult<Vec<(Market, PoolMode, PoolConfig)>> {
        Ok(self.configs.iter().map(|entry| {
            let (market, mode) = *entry.key();
            (market, mode, entry.value().clone())
        }).collect())
    }
}
