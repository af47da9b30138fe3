//! Shared application state, following the teacher's `AppState { inner:
//! Arc<AppStateInner> }` shape (cheap `Clone`, one `Arc` underneath).

use std::sync::Arc;

use dashmap::DashMap;
use proxypool_core::clock::{DynCalendar, MarketClock, StaticCalendar, TradingCalendar};
use proxypool_core::pool::PoolInstance;
use proxypool_core::repository::{InMemoryRepository, PoolRepository};
use proxypool_core::scheduler::{dashmap_resolver, GlobalScheduler};
use proxypool_types::{Market, PoolConfig, PoolIdentity, PoolMode};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::settings::ServerSettings;

pub struct AppStateInner {
    pub repository: Arc<dyn PoolRepository>,
    pub clock: Arc<MarketClock<DynCalendar>>,
    pub instances: Arc<DashMap<PoolIdentity, Arc<PoolInstance>>>,
    pub scheduler: Arc<GlobalScheduler>,
}

#[derive(Clone)]
pub struct AppState {
    pub inner: Arc<AppStateInner>,
}

impl AppState {
    /// Build a process context over the repository, wiring one
    /// `PoolInstance` per `(market, mode)` for every market named in
    /// `settings.markets` (both LIVE and BACKFILL — spec.md §4.6 point 2a:
    /// "if the instance does not exist, skip", implying instances are
    /// provisioned up front rather than created lazily on first request).
    pub async fn new(settings: &ServerSettings, repository: Arc<dyn PoolRepository>) -> Self {
        let clock = Arc::new(MarketClock::boxed(StaticCalendar::new()));
        Self::with_clock(settings, repository, clock).await
    }

    /// Same as `new`, but over a caller-supplied clock — used by tests that
    /// need a deterministic `TradingCalendar` instead of the real wall
    /// clock's weekend-only default.
    pub async fn with_clock(
        settings: &ServerSettings,
        repository: Arc<dyn PoolRepository>,
        clock: Arc<MarketClock<DynCalendar>>,
    ) -> Self {
        let instances: Arc<DashMap<PoolIdentity, Arc<PoolInstance>>> = Arc::new(DashMap::new());

        for &market in &settings.markets {
            for mode in [PoolMode::Live, PoolMode::Backfill] {
                let identity = PoolIdentity::new(market, mode);
                seed_default_config_if_absent(repository.as_ref(), identity).await;
                let instance =
                    Arc::new(PoolInstance::new(identity, Arc::clone(&repository), Arc::clone(&clock)));
                instances.insert(identity, instance);
            }
        }

        let resolver = dashmap_resolver(Arc::clone(&instances));
        let scheduler = Arc::new(GlobalScheduler::new(Arc::clone(&repository), Arc::clone(&clock), resolver));

        Self { inner: Arc::new(AppStateInner { repository, clock, instances, scheduler }) }
    }

    /// Construct state over a fresh `InMemoryRepository`, for tests.
    pub async fn in_memory(markets: &[Market]) -> Self {
        let settings = ServerSettings {
            environment: "testing".into(),
            host: "127.0.0.1".into(),
            port: 0,
            log_level: "info".into(),
            database_url: None,
            markets: markets.to_vec(),
        };
        Self::new(&settings, Arc::new(InMemoryRepository::new())).await
    }

    /// `in_memory`, but over a caller-supplied calendar — for tests that
    /// need deterministic `should_start`/`should_stop` behavior regardless
    /// of the real wall-clock time the test happens to run at.
    pub async fn in_memory_with_calendar(
        markets: &[Market],
        calendar: impl TradingCalendar + 'static,
    ) -> Self {
        let settings = ServerSettings {
            environment: "testing".into(),
            host: "127.0.0.1".into(),
            port: 0,
            log_level: "info".into(),
            database_url: None,
            markets: markets.to_vec(),
        };
        let clock = Arc::new(MarketClock::boxed(calendar));
        Self::with_clock(&settings, Arc::new(InMemoryRepository::new()), clock).await
    }

    pub fn instance(&self, market: Market, mode: PoolMode) -> Option<Arc<PoolInstance>> {
        self.inner.instances.get(&PoolIdentity::new(market, mode)).map(|r| r.clone())
    }

    pub fn repository(&self) -> &Arc<dyn PoolRepository> {
        &self.inner.repository
    }

    pub fn scheduler(&self) -> &Arc<GlobalScheduler> {
        &self.inner.scheduler
    }

    /// Spawn the `GlobalScheduler`'s 60s tick loop; returns its shutdown
    /// sender and task handle so `main` can cancel it on graceful shutdown.
    pub fn spawn_scheduler(&self) -> (watch::Sender<bool>, JoinHandle<()>) {
        Arc::clone(&self.inner.scheduler).spawn()
    }
}

/// Persist a default `PoolConfig` for `identity` if no row exists yet, so
/// every instantiated `(market, mode)` shows up in `GlobalScheduler`'s
/// `list_configured` sweep from boot (spec.md §4.6) instead of only after an
/// operator's first `POST /config`.
async fn seed_default_config_if_absent(repository: &dyn PoolRepository, identity: PoolIdentity) {
    match repository.load_config(identity.market, identity.mode).await {
        Ok(Some(_)) => {},
        Ok(None) => {
            if let Err(e) = repository
                .save_config(identity.market, identity.mode, &PoolConfig::default())
                .await
            {
                warn!(error = %e, %identity, "failed to seed default configuration");
            }
        },
        Err(e) => warn!(error = %e, %identity, "failed to check for an existing configuration row"),
    }
}
