//! Vendor-backed `ProxyFetcher`: issues the upstream HTTP GET and parses the
//! `{code, data:[{ip,port}]}` wire format.

use std::time::Duration;

use async_trait::async_trait;
use proxypool_types::PoolError;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{sanitize_url, ProxyFetcher, RetryStrategy, RATE_LIMIT_SENTINEL};

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct VendorEnvelope {
    code: i64,
    #[serde(default)]
    data: Vec<VendorEntry>,
}

#[derive(Debug, Deserialize)]
struct VendorEntry {
    ip: String,
    port: u16,
}

/// Calls a vendor's HTTP endpoint returning `{code:0, data:[{ip,port},…]}`.
pub struct VendorFetcher {
    client: reqwest::Client,
    api_url: String,
}

impl VendorFetcher {
    pub fn new(api_url: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .expect("reqwest client builds with static config");
        Self { client, api_url: sanitize_url(api_url) }
    }

    async fn fetch_once(&self, count: u32) -> Result<Vec<String>, PoolError> {
        let response = self
            .client
            .get(&self.api_url)
            .query(&[("count", count.to_string())])
            .send()
            .await
            .map_err(|e| PoolError::UpstreamError(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(PoolError::UpstreamError(format!(
                "upstream returned HTTP {}",
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| PoolError::UpstreamError(format!("failed to read body: {e}")))?;

        if body.contains(RATE_LIMIT_SENTINEL) {
            debug!("upstream rate-limit sentinel detected, treating as empty batch");
            return Ok(Vec::new());
        }

        let envelope: VendorEnvelope = serde_json::from_str(&body)
            .map_err(|e| PoolError::UpstreamError(format!("malformed JSON body: {e}")))?;

        if envelope.code != 0 {
            return Err(PoolError::UpstreamError(format!(
                "upstream reported error code {}",
                envelope.code
            )));
        }

        Ok(envelope
            .data
            .into_iter()
            .take(count as usize)
            .map(|entry| format!("{}:{}", entry.ip, entry.port))
            .collect())
    }
}

#[async_trait]
impl ProxyFetcher for VendorFetcher {
    async fn fetch(&self, count: u32) -> Result<Vec<String>, PoolError> {
        let strategy = RetryStrategy::fetch_default();
        let result = strategy.run(|| self.fetch_once(count)).await;
        if let Err(ref e) = result {
            warn!(error = %e, "upstream fetch failed after retries");
        }
        result
    }
}
