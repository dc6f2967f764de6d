//! Rate-limit aware fetch with credential rotation
//!
//! Status handling per call:
//! - 2xx: payload
//! - 404: absent (`Ok(None)`), no further attempts
//! - 429: rotate to the next key and retry, at most one attempt per key
//! - anything else: single attempt, classified failure

use crate::error::{ClientError, ClientResult};
use crate::keys::KeyPool;
use crate::transport::Transport;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

const NOT_FOUND: u16 = 404;
const TOO_MANY_REQUESTS: u16 = 429;

/// Client that rotates through a [`KeyPool`] when rate limited
#[derive(Clone)]
pub struct ResilientClient {
    transport: Arc<dyn Transport>,
    keys: Arc<KeyPool>,
    rotation_pause: Duration,
}

impl std::fmt::Debug for ResilientClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientClient")
            .field("keys", &self.keys.len())
            .field("rotation_pause", &self.rotation_pause)
            .finish_non_exhaustive()
    }
}

impl ResilientClient {
    /// Create a client over `transport`
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, keys: Arc<KeyPool>) -> Self {
        Self {
            transport,
            keys,
            rotation_pause: Duration::ZERO,
        }
    }

    /// Pause between a 429 and the retry on the next key
    #[must_use]
    pub fn with_rotation_pause(mut self, pause: Duration) -> Self {
        self.rotation_pause = pause;
        self
    }

    /// Shared key pool
    #[inline]
    #[must_use]
    pub fn keys(&self) -> &Arc<KeyPool> {
        &self.keys
    }

    /// Fetch `url`, returning the body on success and `None` on 404
    pub async fn fetch(&self, url: &str, description: &str) -> ClientResult<Option<Vec<u8>>> {
        let attempts = self.keys.len();
        for attempt in 1..=attempts {
            let response = match self.transport.get(url, Some(self.keys.current())).await {
                Ok(response) => response,
                Err(e) => {
                    tracing::warn!(description, attempt, error = %e, "request failed");
                    return Err(e);
                }
            };

            let status = response.status;
            match status {
                _ if response.is_success() => return Ok(Some(response.body)),
                NOT_FOUND => {
                    tracing::debug!(description, "resource not found");
                    return Ok(None);
                }
                TOO_MANY_REQUESTS => {
                    tracing::warn!(description, attempt, of = attempts, "rate limited");
                    self.keys.rotate();
                    if attempt < attempts && !self.rotation_pause.is_zero() {
                        tokio::time::sleep(self.rotation_pause).await;
                    }
                }
                _ => {
                    tracing::warn!(description, status, "unexpected status");
                    return Err(ClientError::Status(status));
                }
            }
        }

        tracing::error!(description, attempts, "all api keys are rate limited");
        Err(ClientError::RateLimited { attempts })
    }

    /// Fetch and decode a JSON document
    pub async fn fetch_json<T>(&self, url: &str, description: &str) -> ClientResult<Option<T>>
    where
        T: DeserializeOwned,
    {
        match self.fetch(url, description).await? {
            Some(body) => serde_json::from_slice(&body)
                .map(Some)
                .map_err(|e| ClientError::Decode(format!("{description}: {e}"))),
            None => Ok(None),
        }
    }

    /// Fetch a URL without credentials (icon downloads)
    pub async fn fetch_public(&self, url: &str) -> ClientResult<Option<Vec<u8>>> {
        let response = self.transport.get(url, None).await?;
        let status = response.status;
        match status {
            _ if response.is_success() => Ok(Some(response.body)),
            NOT_FOUND => Ok(None),
            _ => Err(ClientError::Status(status)),
        }
    }
}
