//! Deterministic synthetic fetcher for development/tests (`upstream_enabled
//! = false`).

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use proxypool_types::{Market, PoolError};

use super::ProxyFetcher;

/// Generates `<market>-proxy-<n>.example.com:<port>` addresses from an
/// incrementing counter, so repeated fetches are distinguishable
/// generation-to-generation without relying on real randomness (spec.md
/// §4.2).
pub struct MockFetcher {
    market: Market,
    counter: AtomicU64,
    base_port: u16,
}

impl MockFetcher {
    pub fn new(market: Market) -> Self {
        Self { market, counter: AtomicU64::new(0), base_port: 20000 }
    }
}

#[async_trait]
impl ProxyFetcher for MockFetcher {
    async fn fetch(&self, count: u32) -> Result<Vec<String>, PoolError> {
        let mut out = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let n = self.counter.fetch_add(1, Ordering::Relaxed);
            let port = self.base_port + (n % 10_000) as u16;
            out.push(format!("{}-proxy-{n}.example.com:{port}", self.market.as_str()));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fetch_returns_the_requested_count() {
        let fetcher = MockFetcher::new(Market::Cn);
        let batch = fetcher.fetch(5).await.unwrap();
        assert_eq!(batch.len(), 5);
    }

    #[tokio::test]
    async fn addresses_are_distinct_across_generations() {
        let fetcher = MockFetcher::new(Market::Us);
        let first = fetcher.fetch(3).await.unwrap();
        let second = fetcher.fetch(3).await.unwrap();
        assert!(first.iter().all(|a| !second.contains(a)));
    }

    #[tokio::test]
    async fn addresses_are_tagged_with_the_market_code() {
        let fetcher = MockFetcher::new(Market::Hk);
        let batch = fetcher.fetch(1).await.unwrap();
        assert!(batch[0].starts_with("hk-proxy-"));
    }
}
