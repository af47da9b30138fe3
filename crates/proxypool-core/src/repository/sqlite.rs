//! `sqlx`-backed repository, used when `DATABASE_URL` is set.
//!
//! Two tables, keyed by `(market, mode)`, storing the recognized config
//! options and the aggregate status fields as JSON blobs — the row shape
//! itself is simple key-lookup + upsert (spec.md §1), the structure lives
//! in the typed Rust side.

use async_trait::async_trait;
use proxypool_types::{Market, PersistedStatus, PoolConfig, PoolMode};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use super::{PoolRepository, RepoError, RepoResult};

pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    /// Connect to `database_url` and ensure the schema exists.
    pub async fn connect(database_url: &str) -> RepoResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(|e| RepoError::Backend(format!("connect failed: {e}")))?;
        let repo = Self { pool };
        repo.migrate().await?;
        Ok(repo)
    }

    async fn migrate(&self) -> RepoResult<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS pool_config (
                market TEXT NOT NULL,
                mode TEXT NOT NULL,
                data TEXT NOT NULL,
                PRIMARY KEY (market, mode)
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::Backend(format!("migrate pool_config failed: {e}")))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS pool_status (
                market TEXT NOT NULL,
                mode TEXT NOT NULL,
                data TEXT NOT NULL,
                PRIMARY KEY (market, mode)
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::Backend(format!("migrate pool_status failed: {e}")))?;

        Ok(())
    }
}

#[async_trait]
impl PoolRepository for SqliteRepository {
    async fn load_config(&self, market: Market, mode: PoolMode) -> RepoResult<Option<PoolConfig>> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT data FROM pool_config WHERE market = ? AND mode = ?",
        )
        .bind(market.as_str())
        .bind(mode.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepoError::Backend(format!("load_config query failed: {e}")))?;

        row.map(|(data,)| {
            serde_json::from_str(&data)
                .map_err(|e| RepoError::Backend(format!("corrupt config row: {e}")))
        })
        .transpose()
    }

    async fn save_config(&self, market: Market, mode: PoolMode, cfg: &PoolConfig) -> RepoResult<()> {
        let data = serde_json::to_string(cfg)
            .map_err(|e| RepoError::Backend(format!("serialize config failed: {e}")))?;
        sqlx::query(
            "INSERT INTO pool_config (market, mode, data) VALUES (?, ?, ?)
             ON CONFLICT(market, mode) DO UPDATE SET data = excluded.data",
        )
        .bind(market.as_str())
        .bind(mode.to_string())
        .bind(data)
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::Backend(format!("save_config upsert failed: {e}")))?;
        Ok(())
    }

    async fn load_status(
        &self,
        market: Market,
        mode: PoolMode,
    ) -> RepoResult<Option<PersistedStatus>> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT data FROM pool_status WHERE market = ? AND mode = ?",
        )
        .bind(market.as_str())
        .bind(mode.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepoError::Backend(format!("load_status query failed: {e}")))?;

        row.map(|(data,)| {
            serde_json::from_str(&data)
                .map_err(|e| RepoError::Backend(format!("corrupt status row: {e}")))
        })
        .transpose()
    }

    async fn save_status(
        &self,
        market: Market,
        mode: PoolMode,
        status: &PersistedStatus,
    ) -> RepoResult<()> {
        let data = serde_json::to_string(status)
            .map_err(|e| RepoError::Backend(format!("serialize status failed: {e}")))?;
        sqlx::query(
            "INSERT INTO pool_status (market, mode, data) VALUES (?, ?, ?)
             ON CONFLICT(market, mode) DO UPDATE SET data = excluded.data",
        )
        .bind(market.as_str())
        .bind(mode.to_string())
        .bind(data)
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::Backend(format!("save_status upsert failed: {e}")))?;
        Ok(())
    }

    async fn list_configured(&self) -> RepoResult<Vec<(Market, PoolMode, PoolConfig)>> {
        let rows: Vec<(String, String, String)> =
            sqlx::query_as("SELECT market, mode, data FROM pool_config")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| RepoError::Backend(format!("list_configured query failed: {e}")))?;

        let mut out = Vec::with_capacity(rows.len());
        for (market_str, mode_str, data) in rows {
            let market: Market = market_str
                .parse()
                .map_err(|e| RepoError::Backend(format!("corrupt market column: {e:?}")))?;
            let mode: PoolMode = mode_str
                .parse()
                .map_err(|e| RepoError::Backend(format!("corrupt mode column: {e:?}")))?;
            let cfg: PoolConfig = serde_json::from_str(&data)
                .map_err(|e| RepoError::Backend(format!("corrupt config row: {e}")))?;
            out.push((market, mode, cfg));
        }
        Ok(out)
    }
}
