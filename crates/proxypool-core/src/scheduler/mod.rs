//! C6 — GlobalScheduler: iterates all LIVE-mode instances every tick,
//! starting/stopping per `MarketClock` and per-instance auto-start policy.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use proxypool_types::{Market, PoolError, PoolIdentity, PoolMode, PoolResult};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::clock::{DynCalendar, MarketClock};
use crate::pool::PoolInstance;
use crate::repository::PoolRepository;

/// Interval between scheduler sweeps (spec.md §4.6).
pub const TICK_INTERVAL: Duration = Duration::from_secs(60);

/// A resolver from `(market, mode)` to a running/stoppable instance. The
/// scheduler holds only this function — never a back-reference from
/// instance to scheduler (spec.md §9 "cyclic references" note).
pub type InstanceResolver = Arc<dyn Fn(Market, PoolMode) -> Option<Arc<PoolInstance>> + Send + Sync>;

/// Per-market diagnostic entry for `GET /scheduler/status`.
#[derive(Debug, Clone)]
pub struct SchedulerMarketStatus {
    pub market: Market,
    pub mode: PoolMode,
    pub is_running: bool,
    pub manually_started: bool,
    pub auto_start_enabled: bool,
    pub next_boundary: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct SchedulerStatus {
    pub markets: Vec<SchedulerMarketStatus>,
}

pub struct GlobalScheduler {
    repository: Arc<dyn PoolRepository>,
    clock: Arc<MarketClock<DynCalendar>>,
    resolve: InstanceResolver,
}

impl GlobalScheduler {
    pub fn new(
        repository: Arc<dyn PoolRepository>,
        clock: Arc<MarketClock<DynCalendar>>,
        resolve: InstanceResolver,
    ) -> Self {
        Self { repository, clock, resolve }
    }

    /// One tick: load configs, start/stop LIVE instances per their windows.
    /// Per-market failures are logged; the sweep never aborts (spec.md
    /// §4.6, point 3).
    pub async fn tick(&self) {
        self.tick_at(Utc::now()).await
    }

    /// `tick`'s decision logic over an explicit instant, split out so the
    /// start/stop boundary handling can be exercised without depending on
    /// the wall clock.
    async fn tick_at(&self, now: DateTime<Utc>) {
        let configs = match self.repository.list_configured().await {
            Ok(cfgs) => cfgs,
            Err(e) => {
                error!(error = %e, "scheduler: failed to load configurations, skipping tick");
                return;
            },
        };

        for (market, mode, cfg) in configs {
            if mode != PoolMode::Live || !cfg.auto_start_enabled {
                continue;
            }

            let Some(instance) = (self.resolve)(market, mode) else {
                continue;
            };

            let should_start = self.clock.should_start(market, now, cfg.pre_market_start_minutes);
            let should_stop = self.clock.should_stop(market, now, cfg.post_market_stop_minutes);

            if should_start && !instance.is_running() {
                if let Err(e) = instance.start(false).await {
                    warn!(market = %market, error = %e, "scheduler: auto-start failed");
                }
            }

            if should_stop && instance.is_running() && !instance.is_manually_started() {
                if let Err(e) = instance.stop().await {
                    warn!(market = %market, error = %e, "scheduler: auto-stop failed");
                }
            }
        }
    }

    /// Operator override: bypass all checks, force-start, and mark
    /// manually-started so the scheduler will not auto-stop it.
    pub async fn force_start_market(&self, market: Market) -> PoolResult<()> {
        let instance = (self.resolve)(market, PoolMode::Live)
            .ok_or_else(|| PoolError::NotFound(format!("no LIVE instance for {market}")))?;
        instance.start(true).await?;
        instance.set_manually_started(true);
        Ok(())
    }

    /// Operator override: force-stop and clear the manually-started flag
    /// (`PoolInstance::stop` clears it as part of a normal stop).
    pub async fn force_stop_market(&self, market: Market) -> PoolResult<()> {
        let instance = (self.resolve)(market, PoolMode::Live)
            .ok_or_else(|| PoolError::NotFound(format!("no LIVE instance for {market}")))?;
        instance.stop().await
    }

    /// Diagnostic snapshot for `GET /scheduler/status`.
    pub async fn status(&self) -> SchedulerStatus {
        let configs = self.repository.list_configured().await.unwrap_or_default();
        let now = Utc::now();
        let mut markets = Vec::with_capacity(configs.len());

        for (market, mode, cfg) in configs {
            let instance = (self.resolve)(market, mode);
            let next_boundary = self.clock.next_boundary(
                market,
                now,
                cfg.pre_market_start_minutes,
                cfg.post_market_stop_minutes,
            );
            markets.push(SchedulerMarketStatus {
                market,
                mode,
                is_running: instance.as_ref().is_some_and(|i| i.is_running()),
                manually_started: instance.as_ref().is_some_and(|i| i.is_manually_started()),
                auto_start_enabled: cfg.auto_start_enabled,
                next_boundary,
            });
        }

        SchedulerStatus { markets }
    }

    /// Spawn the 60s tick loop; returns a shutdown sender and the task
    /// handle so the server can cancel it on graceful shutdown.
    pub fn spawn(self: Arc<Self>) -> (watch::Sender<bool>, JoinHandle<()>) {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let scheduler = self;
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(TICK_INTERVAL);
            info!("global scheduler started");
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if *shutdown_rx.borrow() {
                            return;
                        }
                        scheduler.tick().await;
                    }
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            info!("global scheduler stopping");
                            return;
                        }
                    }
                }
            }
        });
        (shutdown_tx, handle)
    }
}

/// Helper constructing an `InstanceResolver` over a `DashMap` keyed by
/// `PoolIdentity` — the shape `proxypool-server`'s `AppState` actually uses.
pub fn dashmap_resolver(
    map: Arc<dashmap::DashMap<PoolIdentity, Arc<PoolInstance>>>,
) -> InstanceResolver {
    Arc::new(move |market, mode| map.get(&PoolIdentity::new(market, mode)).map(|r| r.clone()))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use proxypool_types::PoolConfig;

    use super::*;
    use crate::clock::StaticCalendar;
    use crate::repository::InMemoryRepository;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn half_day_config() -> PoolConfig {
        PoolConfig {
            auto_start_enabled: true,
            pre_market_start_minutes: 30,
            post_market_stop_minutes: 0,
            ..PoolConfig::default()
        }
    }

    fn scheduler_with(
        repository: Arc<InMemoryRepository>,
        clock: Arc<MarketClock<DynCalendar>>,
        instance: Arc<PoolInstance>,
    ) -> GlobalScheduler {
        let resolve: InstanceResolver =
            Arc::new(move |market, mode| if (market, mode) == (instance.identity().market, instance.identity().mode) {
                Some(Arc::clone(&instance))
            } else {
                None
            });
        GlobalScheduler::new(repository, clock, resolve)
    }

    #[tokio::test]
    async fn tick_stops_a_live_instance_at_half_day_close_rather_than_full_day_close() {
        // 2024-01-08 is a Monday; US half-day close is 13:00 local == 18:00 UTC.
        let half_day = chrono::NaiveDate::from_ymd_opt(2024, 1, 8).unwrap();
        let calendar = StaticCalendar::new().with_half_day(Market::Us, half_day);
        let clock = Arc::new(MarketClock::boxed(calendar));

        let repository = Arc::new(InMemoryRepository::new());
        repository.seed_config(Market::Us, PoolMode::Live, half_day_config());

        let identity = PoolIdentity::new(Market::Us, PoolMode::Live);
        let instance: Arc<PoolInstance> =
            Arc::new(PoolInstance::new(identity, Arc::clone(&repository), Arc::clone(&clock)));
        instance.start(true).await.unwrap();
        assert!(instance.is_running());

        let scheduler = scheduler_with(Arc::clone(&repository), Arc::clone(&clock), Arc::clone(&instance));

        // 13:30 local (after half-day close, before the 16:00 full-day close).
        scheduler.tick_at(utc(2024, 1, 8, 18, 30)).await;
        assert!(!instance.is_running(), "half-day close should have stopped the instance");
    }

    #[tokio::test]
    async fn tick_leaves_a_manually_started_instance_running_past_its_close() {
        let half_day = chrono::NaiveDate::from_ymd_opt(2024, 1, 8).unwrap();
        let calendar = StaticCalendar::new().with_half_day(Market::Us, half_day);
        let clock = Arc::new(MarketClock::boxed(calendar));

        let repository = Arc::new(InMemoryRepository::new());
        repository.seed_config(Market::Us, PoolMode::Live, half_day_config());

        let identity = PoolIdentity::new(Market::Us, PoolMode::Live);
        let instance: Arc<PoolInstance> =
            Arc::new(PoolInstance::new(identity, Arc::clone(&repository), Arc::clone(&clock)));
        instance.start(true).await.unwrap();
        instance.set_manually_started(true);

        let scheduler = scheduler_with(Arc::clone(&repository), Arc::clone(&clock), Arc::clone(&instance));

        scheduler.tick_at(utc(2024, 1, 8, 18, 30)).await;
        assert!(instance.is_running(), "a manually-started instance must not be auto-stopped");
    }
}
