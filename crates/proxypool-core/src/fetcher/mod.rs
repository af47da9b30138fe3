//! C2 — ProxyFetcher: upstream vendor integration.

mod mock;
mod vendor;

pub use mock::MockFetcher;
pub use vendor::VendorFetcher;

use async_trait::async_trait;
use proxypool_types::PoolError;

/// Sentinel substring the vendor embeds in an HTML body when it is
/// rate-limiting the account (spec.md §4.2, §6). Detecting this turns a
/// would-be parse failure into a soft "no proxies right now" signal.
pub const RATE_LIMIT_SENTINEL: &str = "too many unused IPs";

/// Fetch a batch of `host:port` strings from an upstream source.
///
/// A well-behaved implementation never returns `Err(UpstreamRateLimited)`
/// — the soft rate-limit case is represented as `Ok(vec![])`, per spec.md
/// §4.2: "returns an empty list — not an error". `Err` is reserved for
/// `UpstreamError` (network/HTTP/parse failure after retries).
#[async_trait]
pub trait ProxyFetcher: Send + Sync {
    async fn fetch(&self, count: u32) -> Result<Vec<String>, PoolError>;
}

/// Trim whitespace/control characters from a configured upstream URL before
/// use (spec.md §4.2: "the vendor is known to tolerate trailing junk
/// poorly").
pub fn sanitize_url(raw: &str) -> String {
    raw.chars().filter(|c| !c.is_control()).collect::<String>().trim().to_string()
}

/// The two-retries/500ms-backoff policy named in spec.md §4.2 and §7,
/// expressed as a small strategy enum rather than a bespoke loop at each
/// call site.
#[derive(Debug, Clone, Copy)]
pub enum RetryStrategy {
    NoRetry,
    FixedDelay { attempts: u32, delay: std::time::Duration },
}

impl RetryStrategy {
    pub fn fetch_default() -> Self {
        RetryStrategy::FixedDelay { attempts: 2, delay: std::time::Duration::from_millis(500) }
    }

    pub fn probe_default() -> Self {
        RetryStrategy::FixedDelay { attempts: 1, delay: std::time::Duration::from_millis(500) }
    }

    /// Run `op` under this retry policy. `op` should return
    /// `Err(PoolError::UpstreamRateLimited)` is never retried — callers are
    /// expected to special-case the soft rate-limit path before invoking
    /// the retried operation (see `VendorFetcher::fetch`).
    pub async fn run<F, Fut, T>(self, mut op: F) -> Result<T, PoolError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, PoolError>>,
    {
        match self {
            RetryStrategy::NoRetry => op().await,
            RetryStrategy::FixedDelay { attempts, delay } => {
                let mut last_err = None;
                for attempt in 0..=attempts {
                    match op().await {
                        Ok(v) => return Ok(v),
                        Err(e) => {
                            last_err = Some(e);
                            if attempt < attempts {
                                tokio::time::sleep(delay).await;
                            }
                        },
                    }
                }
                Err(last_err.expect("loop runs at least once"))
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[test]
    fn sanitize_url_trims_whitespace_and_control_chars() {
        assert_eq!(sanitize_url("  http://example.com/api \n"), "http://example.com/api");
        assert_eq!(sanitize_url("http://example.com\u{0007}/api"), "http://example.com/api");
    }

    #[tokio::test]
    async fn no_retry_runs_the_operation_exactly_once() {
        let calls = AtomicU32::new(0);
        let result = RetryStrategy::NoRetry
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(PoolError::UpstreamError("boom".into())) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn fixed_delay_retries_up_to_attempts_then_gives_up() {
        let calls = AtomicU32::new(0);
        let strategy = RetryStrategy::FixedDelay { attempts: 2, delay: std::time::Duration::from_millis(1) };
        let result = strategy
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(PoolError::UpstreamError("still down".into())) }
            })
            .await;
        assert!(result.is_err());
        // One initial attempt plus two retries.
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn fixed_delay_stops_retrying_once_the_op_succeeds() {
        let calls = AtomicU32::new(0);
        let strategy = RetryStrategy::FixedDelay { attempts: 2, delay: std::time::Duration::from_millis(1) };
        let result = strategy
            .run(|| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move { if n < 1 { Err(PoolError::UpstreamError("retry me".into())) } else { Ok(42) } }
            })
            .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
