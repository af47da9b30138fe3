//! C5 — PoolInstance: owns one `PoolEngine` + its background tasks per
//! `(market, mode)` identity.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use proxypool_types::{
    ActiveSlot, PersistedStatus, PoolConfig, PoolError, PoolIdentity, PoolMode, PoolResult,
    PoolStatus, Proxy, WatermarkLevel,
};
use tokio::sync::{watch, Mutex as AsyncMutex, RwLock as AsyncRwLock};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::clock::{DynCalendar, MarketClock};
use crate::fetcher::{MockFetcher, ProxyFetcher, VendorFetcher};
use crate::health::{self, HealthChecker};
use crate::repository::PoolRepository;

use super::engine::PoolEngine;
use super::maintenance;

/// Grace period `Stop()` waits for background tasks to exit before
/// abandoning them (spec.md §5).
const STOP_GRACE_PERIOD: Duration = Duration::from_secs(10);

/// Result of a `Start` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    AlreadyRunning,
}

struct RunningTasks {
    shutdown: watch::Sender<bool>,
    maintenance: JoinHandle<()>,
    health: JoinHandle<()>,
    backfill_auto_stop: Option<JoinHandle<()>>,
}

/// Owns one `PoolEngine`, one `HealthChecker`, a configuration snapshot,
/// and the instance's lifecycle flags. Unique per `(market, mode)` identity
/// in a process (spec.md §3).
pub struct PoolInstance {
    identity: PoolIdentity,
    repository: Arc<dyn PoolRepository>,
    clock: Arc<MarketClock<DynCalendar>>,
    config: AsyncMutex<Option<PoolConfig>>,
    engine: AsyncRwLock<Option<Arc<PoolEngine>>>,
    health: Arc<HealthChecker>,
    tasks: AsyncMutex<Option<RunningTasks>>,
    running: AtomicBool,
    manually_started: AtomicBool,
}

impl PoolInstance {
    pub fn new(
        identity: PoolIdentity,
        repository: Arc<dyn PoolRepository>,
        clock: Arc<MarketClock<DynCalendar>>,
    ) -> Self {
        Self {
            identity,
            repository,
            clock,
            config: AsyncMutex::new(None),
            engine: AsyncRwLock::new(None),
            health: Arc::new(HealthChecker::new()),
            tasks: AsyncMutex::new(None),
            running: AtomicBool::new(false),
            manually_started: AtomicBool::new(false),
        }
    }

    pub fn identity(&self) -> PoolIdentity {
        self.identity
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn is_manually_started(&self) -> bool {
        self.manually_started.load(Ordering::SeqCst)
    }

    pub fn set_manually_started(&self, value: bool) {
        self.manually_started.store(value, Ordering::SeqCst);
    }

    pub async fn config(&self) -> PoolConfig {
        self.config.lock().await.clone().unwrap_or_default()
    }

    async fn ensure_config_loaded(&self) -> PoolResult<PoolConfig> {
        let mut guard = self.config.lock().await;
        if let Some(cfg) = guard.as_ref() {
            return Ok(cfg.clone());
        }
        let loaded = self
            .repository
            .load_config(self.identity.market, self.identity.mode)
            .await
            .map_err(|e| PoolError::PersistenceError(e.to_string()))?
            .unwrap_or_default();
        loaded.validate()?;
        *guard = Some(loaded.clone());
        Ok(loaded)
    }

    /// `Start(force)` — see spec.md §4.5. `force=true` bypasses the
    /// market-hours check (operator override).
    pub async fn start(self: &Arc<Self>, force: bool) -> PoolResult<StartOutcome> {
        if self.is_running() {
            return Ok(StartOutcome::AlreadyRunning);
        }

        let config = self.ensure_config_loaded().await?;

        if self.identity.mode == PoolMode::Live && !force {
            let now = Utc::now();
            if self.clock.should_stop(self.identity.market, now, config.post_market_stop_minutes) {
                return Err(PoolError::MarketClosed(format!(
                    "{} is outside its trading window",
                    self.identity.market
                )));
            }
        }

        let fetcher: Arc<dyn ProxyFetcher> = if config.upstream_enabled {
            Arc::new(VendorFetcher::new(&config.upstream_api_url))
        } else {
            Arc::new(MockFetcher::new(self.identity.market))
        };

        let engine = Arc::new(PoolEngine::new(config.target_size));
        *self.engine.write().await = Some(Arc::clone(&engine));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let rotation_interval =
            Duration::from_secs(u64::from(config.rotation_interval_minutes) * 60);
        // "min refresh" floor: served proxies must be younger than their
        // stated lifetime, with a small margin (spec.md §4.4).
        let min_refresh_floor =
            Duration::from_secs(u64::from(config.proxy_lifetime_minutes) * 60 + 30);

        let maintenance_handle = tokio::spawn(maintenance::run(
            self.identity,
            Arc::clone(&engine),
            Arc::clone(&fetcher),
            config.batch_size,
            rotation_interval,
            min_refresh_floor,
            shutdown_rx.clone(),
        ));

        let health_handle = tokio::spawn(health::run_loop(
            Arc::clone(&self.health),
            Arc::clone(&engine),
            health::DEFAULT_INTERVAL,
            shutdown_rx,
        ));

        *self.tasks.lock().await = Some(RunningTasks {
            shutdown: shutdown_tx,
            maintenance: maintenance_handle,
            health: health_handle,
            backfill_auto_stop: None,
        });

        self.running.store(true, Ordering::SeqCst);
        self.persist_status().await;
        info!(identity = %self.identity, "pool instance started");
        Ok(StartOutcome::Started)
    }

    /// `StartManual(duration_hours)` — BACKFILL-only: `Start(force=true)`
    /// plus a scheduled auto-stop `duration_hours` later.
    pub async fn start_manual(self: &Arc<Self>, duration_hours: u32) -> PoolResult<StartOutcome> {
        if self.identity.mode != PoolMode::Backfill {
            return Err(PoolError::InvalidArgument(
                "start_manual is only valid for BACKFILL-mode instances".into(),
            ));
        }
        let outcome = self.start(true).await?;
        self.set_manually_started(true);

        let weak = Arc::downgrade(self);
        let duration = Duration::from_secs(u64::from(duration_hours) * 3600);
        let auto_stop = tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            if let Some(instance) = weak.upgrade() {
                info!(identity = %instance.identity, "backfill auto-stop duration elapsed");
                if let Err(e) = instance.stop().await {
                    warn!(error = %e, "backfill auto-stop failed");
                }
            }
        });

        if let Some(tasks) = self.tasks.lock().await.as_mut() {
            tasks.backfill_auto_stop = Some(auto_stop);
        }

        Ok(outcome)
    }

    /// Cancels background tasks and awaits their exit (up to a grace
    /// period). Idempotent.
    pub async fn stop(self: &Arc<Self>) -> PoolResult<()> {
        if !self.is_running() {
            return Ok(());
        }

        let tasks = self.tasks.lock().await.take();
        if let Some(tasks) = tasks {
            let _ = tasks.shutdown.send(true);

            if tokio::time::timeout(STOP_GRACE_PERIOD, tasks.maintenance).await.is_err() {
                warn!(identity = %self.identity, "maintenance task did not exit within grace period");
            }
            if tokio::time::timeout(STOP_GRACE_PERIOD, tasks.health).await.is_err() {
                warn!(identity = %self.identity, "health task did not exit within grace period");
            }
            if let Some(backfill) = tasks.backfill_auto_stop {
                backfill.abort();
            }
        }

        self.running.store(false, Ordering::SeqCst);
        self.manually_started.store(false, Ordering::SeqCst);
        *self.engine.write().await = None;
        self.persist_status().await;
        info!(identity = %self.identity, "pool instance stopped");
        Ok(())
    }

    /// Delegates to `PoolEngine::get_proxy`, then asynchronously persists
    /// updated counters — persistence errors never fail the request.
    pub async fn get_proxy(self: &Arc<Self>) -> PoolResult<Option<Proxy>> {
        let engine = self
            .engine
            .read()
            .await
            .clone()
            .ok_or_else(|| PoolError::NotRunning(self.identity.to_string()))?;
        let proxy = engine.get_proxy();
        crate::metrics::record_request(self.identity.market, self.identity.mode, proxy.is_some());

        let this = Arc::clone(self);
        tokio::spawn(async move { this.persist_status().await });

        Ok(proxy)
    }

    /// Delegates to `PoolEngine::report_failure`, idempotent.
    pub async fn report_failure(self: &Arc<Self>, address: &str) -> PoolResult<()> {
        let engine = self
            .engine
            .read()
            .await
            .clone()
            .ok_or_else(|| PoolError::NotRunning(self.identity.to_string()))?;
        engine.report_failure(address);
        crate::metrics::record_failure(self.identity.market, self.identity.mode);

        let this = Arc::clone(self);
        tokio::spawn(async move { this.persist_status().await });

        Ok(())
    }

    /// Diagnostic dump for `GET /{market}/proxies/list`.
    pub async fn diagnostic(&self) -> PoolResult<(Vec<Proxy>, Vec<Proxy>)> {
        let engine = self
            .engine
            .read()
            .await
            .clone()
            .ok_or_else(|| PoolError::NotRunning(self.identity.to_string()))?;
        Ok(engine.diagnostic())
    }

    /// Validates the patch, persists it, invalidates the cached config. If
    /// running, rebuilds with `Stop → Start(force=true)` so the new fetcher
    /// and size parameters take effect.
    pub async fn update_config(self: &Arc<Self>, new_config: PoolConfig) -> PoolResult<()> {
        new_config.validate()?;
        self.repository
            .save_config(self.identity.market, self.identity.mode, &new_config)
            .await
            .map_err(|e| PoolError::PersistenceError(e.to_string()))?;
        *self.config.lock().await = Some(new_config);

        if self.is_running() {
            let was_manually_started = self.is_manually_started();
            self.stop().await?;
            self.start(true).await?;
            if was_manually_started {
                self.set_manually_started(true);
            }
        }
        Ok(())
    }

    /// Snapshot combining engine counters, buffer sizes, active designator,
    /// `MarketClock` status, and health-checker summary.
    pub async fn status(&self) -> PoolStatus {
        let now = Utc::now();
        let engine_opt = self.engine.read().await.clone();
        let snap = engine_opt.as_ref().map(|e| e.snapshot());
        let health_summary = self.health.summary();
        let config = self.config.lock().await.clone().unwrap_or_default();
        let market_status = self.clock.status(self.identity.market, now);
        let active_size = snap.as_ref().map_or(0, |s| s.active_size);

        PoolStatus {
            market: self.identity.market,
            mode: self.identity.mode,
            is_running: self.is_running(),
            manually_started: self.is_manually_started(),
            active_slot: snap.as_ref().map_or(ActiveSlot::A, |s| s.active_slot),
            active_size,
            standby_size: snap.as_ref().map_or(0, |s| s.standby_size),
            total_requests: snap.as_ref().map_or(0, |s| s.total_requests),
            success_count: snap.as_ref().map_or(0, |s| s.success_count),
            failure_count: snap.as_ref().map_or(0, |s| s.failure_count),
            no_proxy_count: snap.as_ref().map_or(0, |s| s.no_proxy_count),
            last_rotation_time: snap.as_ref().and_then(|s| s.last_rotation_time),
            last_fetch_time: snap.as_ref().and_then(|s| s.last_fetch_time),
            last_fetch_count: snap.as_ref().map_or(0, |s| s.last_fetch_count),
            market_status,
            healthy_count: health_summary.healthy,
            unhealthy_count: health_summary.unhealthy,
            watermark: WatermarkLevel::from_size(active_size, config.low_watermark),
        }
    }

    /// `should_start`/`should_stop` from `MarketClock` + this instance's
    /// configured pre/post windows — used by `GlobalScheduler`.
    pub fn clock(&self) -> &MarketClock<DynCalendar> {
        &self.clock
    }

    async fn persist_status(&self) {
        let engine_opt = self.engine.read().await.clone();
        let snap = engine_opt.as_ref().map(|e| e.snapshot());
        let status = PersistedStatus {
            is_running: self.is_running(),
            active_slot: snap.as_ref().map_or(ActiveSlot::A, |s| s.active_slot),
            active_size: snap.as_ref().map_or(0, |s| s.active_size),
            standby_size: snap.as_ref().map_or(0, |s| s.standby_size),
            total_requests: snap.as_ref().map_or(0, |s| s.total_requests),
            success_count: snap.as_ref().map_or(0, |s| s.success_count),
            failure_count: snap.as_ref().map_or(0, |s| s.failure_count),
            last_rotation_time: snap.as_ref().and_then(|s| s.last_rotation_time),
        };
        if let Err(e) =
            self.repository.save_status(self.identity.market, self.identity.mode, &status).await
        {
            warn!(error = %e, identity = %self.identity, "status persistence failed (swallowed)");
        }
    }
}

#[cfg(test)]
mod tests {
    use proxypool_types::Market;

    use super::*;
    use crate::clock::StaticCalendar;
    use crate::repository::InMemoryRepository;

    /// A calendar that classifies every date as a holiday, so
    /// `should_stop`/`trading_hours` behave as on a non-trading day
    /// regardless of when the test actually runs.
    fn always_closed_clock() -> Arc<MarketClock<DynCalendar>> {
        let today = Utc::now().date_naive();
        let mut cal = StaticCalendar::new();
        for offset in -1..8 {
            cal.add_holiday(Market::Us, today + chrono::Duration::days(offset));
        }
        Arc::new(MarketClock::boxed(cal))
    }

    fn instance(identity: PoolIdentity, clock: Arc<MarketClock<DynCalendar>>) -> Arc<PoolInstance> {
        Arc::new(PoolInstance::new(identity, Arc::new(InMemoryRepository::new()), clock))
    }

    #[tokio::test]
    async fn start_without_force_outside_trading_hours_is_rejected_and_spawns_nothing() {
        let identity = PoolIdentity::new(Market::Us, PoolMode::Live);
        let instance = instance(identity, always_closed_clock());

        let err = instance.start(false).await.unwrap_err();
        assert!(matches!(err, PoolError::MarketClosed(_)));
        assert!(!instance.is_running());
        assert!(instance.tasks.lock().await.is_none());
    }

    #[tokio::test]
    async fn start_with_force_succeeds_regardless_of_market_hours() {
        let identity = PoolIdentity::new(Market::Us, PoolMode::Live);
        let instance = instance(identity, always_closed_clock());

        let outcome = instance.start(true).await.unwrap();
        assert_eq!(outcome, StartOutcome::Started);
        assert!(instance.is_running());

        instance.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn start_manual_auto_stops_after_the_configured_duration() {
        let identity = PoolIdentity::new(Market::Us, PoolMode::Backfill);
        let instance = instance(identity, always_closed_clock());

        instance.start_manual(1).await.unwrap();
        assert!(instance.is_running());
        assert!(instance.is_manually_started());

        // duration_hours is whole hours; jump the paused clock past the
        // 1-hour window instead of waiting on it in real time.
        tokio::time::advance(Duration::from_secs(3600) + Duration::from_secs(1)).await;
        tokio::task::yield_now().await;

        assert!(!instance.is_running());
        assert!(!instance.is_manually_started());
    }

    #[tokio::test]
    async fn start_manual_rejects_live_mode() {
        let identity = PoolIdentity::new(Market::Us, PoolMode::Live);
        let instance = instance(identity, always_closed_clock());

        let err = instance.start_manual(4).await.unwrap_err();
        assert!(matches!(err, PoolError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn update_config_preserves_manually_started_across_the_internal_restart() {
        let identity = PoolIdentity::new(Market::Us, PoolMode::Live);
        let instance = instance(identity, always_closed_clock());

        instance.start(true).await.unwrap();
        instance.set_manually_started(true);
        assert!(instance.is_manually_started());

        let mut patch = instance.config().await;
        patch.target_size += 1;
        instance.update_config(patch).await.unwrap();

        assert!(instance.is_running());
        assert!(
            instance.is_manually_started(),
            "an ordinary config patch must not clear the operator's force-start override"
        );

        instance.stop().await.unwrap();
        assert!(!instance.is_manually_started());
    }
}
