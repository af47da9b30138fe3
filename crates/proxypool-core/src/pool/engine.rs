//! C4 — PoolEngine: the A/B double-buffered rotation core.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use proxypool_types::{ActiveSlot, PoolError, Proxy};
use rand::seq::SliceRandom;
use tracing::{info, warn};

use crate::fetcher::ProxyFetcher;

use super::buffer::PoolBuffer;

/// Gap between successive upstream calls within one `RefreshStandby` batch
/// (spec.md §4.4).
const INTER_CALL_GAP: Duration = Duration::from_secs(1);
/// Max number of upstream calls aggregated into one standby refresh.
const DEFAULT_BATCH_COUNT: u32 = 2;

struct EngineState {
    buffers: [PoolBuffer; 2],
    active: ActiveSlot,
    last_rotation_time: Option<DateTime<Utc>>,
    last_fetch_time: Option<DateTime<Utc>>,
    last_fetch_count: usize,
}

impl EngineState {
    fn active_buffer(&self) -> &PoolBuffer {
        match self.active {
            ActiveSlot::A => &self.buffers[0],
            ActiveSlot::B => &self.buffers[1],
        }
    }

    fn active_buffer_mut(&mut self) -> &mut PoolBuffer {
        match self.active {
            ActiveSlot::A => &mut self.buffers[0],
            ActiveSlot::B => &mut self.buffers[1],
        }
    }

    fn standby_buffer(&self) -> &PoolBuffer {
        match self.active {
            ActiveSlot::A => &self.buffers[1],
            ActiveSlot::B => &self.buffers[0],
        }
    }

    fn standby_buffer_mut(&mut self) -> &mut PoolBuffer {
        match self.active {
            ActiveSlot::A => &mut self.buffers[1],
            ActiveSlot::B => &mut self.buffers[0],
        }
    }
}

/// Snapshot of engine counters/timestamps/sizes for `Status()`.
#[derive(Debug, Clone)]
pub struct EngineSnapshot {
    pub active_slot: ActiveSlot,
    pub active_size: usize,
    pub standby_size: usize,
    pub total_requests: u64,
    pub success_count: u64,
    pub failure_count: u64,
    pub no_proxy_count: u64,
    pub last_rotation_time: Option<DateTime<Utc>>,
    pub last_fetch_time: Option<DateTime<Utc>>,
    pub last_fetch_count: usize,
}

/// The double-buffer: serve reads from the active buffer, refresh standby
/// off-mutex, atomically swap, evict failed proxies.
///
/// All buffer mutation is serialized through a single `parking_lot::Mutex`.
/// No lock is held across network I/O — `refresh_standby` builds its
/// candidate buffer in a local `Vec` and only takes the mutex to publish.
pub struct PoolEngine {
    state: Mutex<EngineState>,
    target_size: u32,
    total_requests: AtomicU64,
    success_count: AtomicU64,
    failure_count: AtomicU64,
    no_proxy_count: AtomicU64,
}

impl PoolEngine {
    pub fn new(target_size: u32) -> Self {
        Self {
            state: Mutex::new(EngineState {
                buffers: [PoolBuffer::new(), PoolBuffer::new()],
                active: ActiveSlot::A,
                last_rotation_time: None,
                last_fetch_time: None,
                last_fetch_count: 0,
            }),
            target_size,
            total_requests: AtomicU64::new(0),
            success_count: AtomicU64::new(0),
            failure_count: AtomicU64::new(0),
            no_proxy_count: AtomicU64::new(0),
        }
    }

    /// Pick uniformly at random from the healthy proxies of the active
    /// buffer; fall back to the standby buffer's healthy proxies if the
    /// active buffer has none; return `None` if both are empty. Never
    /// blocks (spec.md §4.4 tie-break policy).
    pub fn get_proxy(&self) -> Option<Proxy> {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        let mut state = self.state.lock();
        let now = Utc::now();

        let chosen = Self::pick_and_touch(state.active_buffer_mut(), now)
            .or_else(|| Self::pick_and_touch(state.standby_buffer_mut(), now));

        drop(state);

        match chosen {
            Some(proxy) => {
                self.success_count.fetch_add(1, Ordering::Relaxed);
                Some(proxy)
            },
            None => {
                self.no_proxy_count.fetch_add(1, Ordering::Relaxed);
                None
            },
        }
    }

    fn pick_and_touch(buffer: &mut PoolBuffer, now: DateTime<Utc>) -> Option<Proxy> {
        let healthy = buffer.healthy();
        let &index = healthy.choose(&mut rand::thread_rng())?;
        let proxy = buffer.get_mut(index)?;
        proxy.mark_used(now);
        Some(proxy.clone())
    }

    /// Remove every proxy with matching address from both buffers. Marks a
    /// failure for observability. Idempotent.
    pub fn report_failure(&self, address: &str) {
        let mut state = self.state.lock();
        let mut removed = Vec::new();
        for buffer in &mut state.buffers {
            removed.extend(buffer.remove_address(address));
        }
        drop(state);
        if !removed.is_empty() {
            for mut proxy in removed {
                proxy.record_failure();
            }
            self.failure_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Same as `report_failure`, batched for the health checker's eviction
    /// callback.
    pub fn evict_unhealthy(&self, addresses: &[String]) {
        for address in addresses {
            self.report_failure(address);
        }
    }

    /// Flip `active`; clear the now-standby buffer (the old active). The
    /// previously-refreshed standby becomes the new active. Records
    /// `last_rotation_time`.
    pub fn swap(&self) {
        let mut state = self.state.lock();
        state.active = state.active.other();
        state.standby_buffer_mut().clear();
        state.last_rotation_time = Some(Utc::now());
        drop(state);
        info!("pool engine swapped active buffer");
    }

    /// Clear standby; call `fetcher.fetch(batch_size)` up to `batch_count`
    /// times with a 1s inter-call gap, aggregating into standby (bounded by
    /// `target_size`). On empty result, standby is left empty and the
    /// caller must not swap. All fetches happen off-mutex; the mutex is
    /// only taken to publish the finished buffer.
    pub async fn refresh_standby(
        &self,
        fetcher: &dyn ProxyFetcher,
        batch_size: u32,
    ) -> Result<usize, PoolError> {
        let target = self.target_size as usize;
        let mut collected: Vec<Proxy> = Vec::with_capacity(target);
        let now = Utc::now();

        for call_index in 0..DEFAULT_BATCH_COUNT {
            if collected.len() >= target {
                break;
            }
            let remaining = (target - collected.len()).min(batch_size as usize) as u32;
            let addrs = fetcher.fetch(remaining).await?;
            if addrs.is_empty() && call_index == 0 {
                // Rate-limited or genuinely empty on the very first call —
                // leave standby untouched; maintenance loop decides backoff.
                break;
            }
            for addr in addrs {
                if collected.len() >= target {
                    break;
                }
                collected.push(Proxy::new(addr, now));
            }
            if call_index + 1 < DEFAULT_BATCH_COUNT && collected.len() < target {
                tokio::time::sleep(INTER_CALL_GAP).await;
            }
        }

        let count = collected.len();
        let mut state = self.state.lock();
        state.standby_buffer_mut().clear();
        if count > 0 {
            *state.standby_buffer_mut() = PoolBuffer::from_proxies(collected);
        }
        state.last_fetch_time = Some(now);
        state.last_fetch_count = count;
        drop(state);

        if count == 0 {
            warn!("standby refresh produced no proxies; skipping swap this cycle");
        }
        Ok(count)
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        let state = self.state.lock();
        EngineSnapshot {
            active_slot: state.active,
            active_size: state.active_buffer().len(),
            standby_size: state.standby_buffer().len(),
            total_requests: self.total_requests.load(Ordering::Relaxed),
            success_count: self.success_count.load(Ordering::Relaxed),
            failure_count: self.failure_count.load(Ordering::Relaxed),
            no_proxy_count: self.no_proxy_count.load(Ordering::Relaxed),
            last_rotation_time: state.last_rotation_time,
            last_fetch_time: state.last_fetch_time,
            last_fetch_count: state.last_fetch_count,
        }
    }

    /// All addresses currently held in either buffer, for the health
    /// checker's probe batch and for `GET /{market}/proxies/list`.
    pub fn all_addresses(&self) -> Vec<String> {
        let state = self.state.lock();
        let mut addrs = state.buffers[0].addresses();
        addrs.extend(state.buffers[1].addresses());
        addrs
    }

    /// Diagnostic dump of active/standby contents for
    /// `GET /{market}/proxies/list`.
    pub fn diagnostic(&self) -> (Vec<Proxy>, Vec<Proxy>) {
        let state = self.state.lock();
        let active: Vec<Proxy> = state.active_buffer().iter().cloned().collect();
        let standby: Vec<Proxy> = state.standby_buffer().iter().cloned().collect();
        (active, standby)
    }

    pub fn target_size(&self) -> u32 {
        self.target_size
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::fetcher::MockFetcher;

    struct EmptyFetcher;

    #[async_trait]
    impl ProxyFetcher for EmptyFetcher {
        async fn fetch(&self, _count: u32) -> Result<Vec<String>, PoolError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn get_proxy_on_an_empty_engine_returns_none() {
        let engine = PoolEngine::new(10);
        assert!(engine.get_proxy().is_none());
        assert_eq!(engine.snapshot().no_proxy_count, 1);
    }

    #[tokio::test]
    async fn refresh_then_swap_serves_the_fetched_proxies() {
        let engine = PoolEngine::new(5);
        let fetcher = MockFetcher::new(proxypool_types::Market::Cn);
        let count = engine.refresh_standby(&fetcher, 5).await.unwrap();
        assert_eq!(count, 5);

        // The standby batch is already servable as a fallback before swap.
        let fallback = engine.get_proxy().expect("standby serves as a fallback before swap");
        assert!(fallback.address.starts_with("cn-proxy-"));

        engine.swap();
        let proxy = engine.get_proxy().expect("swap published the refreshed batch");
        assert!(proxy.address.starts_with("cn-proxy-"));
        assert_eq!(engine.snapshot().active_size, 5);
    }

    #[tokio::test]
    async fn swap_clears_the_previous_generation_so_it_is_never_served_again() {
        let engine = PoolEngine::new(3);
        let fetcher = MockFetcher::new(proxypool_types::Market::Us);

        engine.refresh_standby(&fetcher, 3).await.unwrap();
        engine.swap();
        let first_generation = engine.all_addresses();
        assert_eq!(first_generation.len(), 3);

        engine.refresh_standby(&fetcher, 3).await.unwrap();
        engine.swap();
        let addresses_after_second_swap = engine.all_addresses();

        assert!(first_generation.iter().all(|a| !addresses_after_second_swap.contains(a)));
        assert_eq!(addresses_after_second_swap.len(), 3);
    }

    #[tokio::test]
    async fn report_failure_is_idempotent() {
        let engine = PoolEngine::new(2);
        let fetcher = MockFetcher::new(proxypool_types::Market::Hk);
        engine.refresh_standby(&fetcher, 2).await.unwrap();
        engine.swap();
        let address = engine.all_addresses().remove(0);

        engine.report_failure(&address);
        assert_eq!(engine.snapshot().failure_count, 1);
        assert!(!engine.all_addresses().contains(&address));

        // Second call on an address already removed is a no-op, not a panic.
        engine.report_failure(&address);
        assert_eq!(engine.snapshot().failure_count, 1);
    }

    #[tokio::test]
    async fn refresh_standby_on_empty_first_batch_leaves_standby_untouched() {
        let engine = PoolEngine::new(5);
        let fetcher = MockFetcher::new(proxypool_types::Market::Cn);
        engine.refresh_standby(&fetcher, 5).await.unwrap();
        engine.swap();
        let before = engine.snapshot().active_size;

        let count = engine.refresh_standby(&EmptyFetcher, 5).await.unwrap();
        assert_eq!(count, 0);
        // Active buffer (already swapped in) is untouched by a failed refresh.
        assert_eq!(engine.snapshot().active_size, before);
        assert_eq!(engine.snapshot().standby_size, 0);
    }

    #[tokio::test]
    async fn evict_unhealthy_removes_every_listed_address() {
        let engine = PoolEngine::new(4);
        let fetcher = MockFetcher::new(proxypool_types::Market::Us);
        engine.refresh_standby(&fetcher, 4).await.unwrap();
        engine.swap();
        let addresses = engine.all_addresses();

        engine.evict_unhealthy(&addresses);
        assert!(engine.all_addresses().is_empty());
    }
}
