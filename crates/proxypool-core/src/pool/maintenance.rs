//! The engine's background maintenance loop: refresh → swap → sleep.

use std::sync::Arc;
use std::time::Duration;

use proxypool_types::PoolIdentity;
use tokio::sync::watch;
use tracing::warn;

use crate::fetcher::ProxyFetcher;
use crate::metrics;

use super::engine::PoolEngine;

/// Consecutive empty refreshes (rate-limit sentinel or genuinely empty
/// upstream) after which the loop backs off to a fixed 60s cadence,
/// independent of `rotation_interval` (spec.md §5).
const RATE_LIMIT_BACKOFF_STREAK: u32 = 2;
const RATE_LIMIT_BACKOFF: Duration = Duration::from_secs(60);
const ERROR_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Sleep for `duration`, returning `true` early if a shutdown signal
/// arrives first.
async fn sleep_or_shutdown(duration: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(duration) => false,
        _ = shutdown.changed() => true,
    }
}

/// Runs until `shutdown` is signaled. One logical task per running
/// `PoolInstance` (spec.md §4.4 "Maintenance loop").
pub async fn run(
    identity: PoolIdentity,
    engine: Arc<PoolEngine>,
    fetcher: Arc<dyn ProxyFetcher>,
    batch_size: u32,
    rotation_interval: Duration,
    min_refresh_floor: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut consecutive_empty: u32 = 0;

    loop {
        if *shutdown.borrow() {
            return;
        }

        match engine.refresh_standby(fetcher.as_ref(), batch_size).await {
            Ok(count) if count > 0 => {
                engine.swap();
                metrics::record_rotation(identity.market, identity.mode);
                consecutive_empty = 0;
            },
            Ok(_) => {
                consecutive_empty += 1;
            },
            Err(e) => {
                warn!(error = %e, "maintenance loop: refresh failed, retrying after backoff");
                if sleep_or_shutdown(ERROR_RETRY_DELAY, &mut shutdown).await {
                    return;
                }
                continue;
            },
        }

        let sleep_for = next_delay(consecutive_empty, rotation_interval, min_refresh_floor);

        if sleep_or_shutdown(sleep_for, &mut shutdown).await {
            return;
        }
    }
}

/// The sleep duration for the next cycle: the fixed rate-limit backoff once
/// `consecutive_empty` reaches the streak threshold, otherwise the
/// configured rotation interval (floored by the proxy lifetime margin).
fn next_delay(consecutive_empty: u32, rotation_interval: Duration, min_refresh_floor: Duration) -> Duration {
    if consecutive_empty >= RATE_LIMIT_BACKOFF_STREAK {
        RATE_LIMIT_BACKOFF
    } else {
        rotation_interval.max(min_refresh_floor)
    }
}
