//! Icon cache using moka
//!
//! Tier and agent icons change rarely, so downloads are cached by URL:
//! - concurrent requests for one URL share a single download
//! - failed downloads are not cached and are retried on the next request
//! - bounded capacity with time-based expiration

use crate::error::ClientError;
use crate::resilient::ResilientClient;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;

/// Default number of cached icons
pub const DEFAULT_CAPACITY: u64 = 256;

/// Default lifetime of a cached icon
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 3600);

/// Downloaded image bytes keyed by URL
#[derive(Debug, Clone)]
pub struct AssetCache {
    client: ResilientClient,
    inner: Cache<String, Arc<[u8]>>,
}

impl AssetCache {
    /// Cache with default capacity and lifetime
    #[must_use]
    pub fn new(client: ResilientClient) -> Self {
        Self::with_limits(client, DEFAULT_CAPACITY, DEFAULT_TTL)
    }

    /// Cache with explicit capacity and lifetime
    #[must_use]
    pub fn with_limits(client: ResilientClient, max_capacity: u64, ttl: Duration) -> Self {
        Self {
            client,
            inner: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Bytes behind `url`, downloading on a miss
    ///
    /// Download failures are logged and reported as `None`; the card is
    /// rendered without the icon.
    pub async fn get(&self, url: &str) -> Option<Arc<[u8]>> {
        let client = &self.client;
        let result = self
            .inner
            .try_get_with(url.to_string(), async move {
                match client.fetch_public(url).await? {
                    Some(bytes) => Ok::<Arc<[u8]>, ClientError>(Arc::from(bytes)),
                    None => Err(ClientError::Status(404)),
                }
            })
            .await;

        match result {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                tracing::warn!(url, error = %e, "icon download failed");
                None
            }
        }
    }

    /// Fetch an optional URL
    pub async fn get_opt(&self, url: Option<&str>) -> Option<Arc<[u8]>> {
        match url {
            Some(url) => self.get(url).await,
            None => None,
        }
    }

    /// Number of cached icons
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }
}
