//! One-shot HTTP GET behind a trait

use crate::error::{ClientError, ClientResult};
use async_trait::async_trait;
use std::time::Duration;

/// Timeout applied to every outbound request
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Status and body of a completed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body
    pub body: Vec<u8>,
}

impl RawResponse {
    /// Build a response
    #[inline]
    #[must_use]
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Whether the status is 2xx
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A single GET, with no retry of its own
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue a GET to `url`, authenticating with `key` when given
    async fn get(&self, url: &str, key: Option<&str>) -> ClientResult<RawResponse>;
}

/// [`Transport`] backed by `reqwest`
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Client with [`DEFAULT_TIMEOUT`]
    pub fn new() -> ClientResult<Self> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    /// Client with a custom timeout
    pub fn with_timeout(timeout: Duration) -> ClientResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("tierwatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ClientError::Build(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str, key: Option<&str>) -> ClientResult<RawResponse> {
        let mut request = self.client.get(url);
        if let Some(key) = key {
            request = request.header(reqwest::header::AUTHORIZATION, key);
        }
        let response = request.send().await.map_err(classify)?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(classify)?;
        Ok(RawResponse::new(status, body.to_vec()))
    }
}

fn classify(e: reqwest::Error) -> ClientError {
    if e.is_timeout() {
        ClientError::Timeout
    } else {
        ClientError::Transport(e.to_string())
    }
}
