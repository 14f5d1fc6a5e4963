//! HTTP client abstraction for testability

use std::future::Future;
use std::time::Duration;

use reqwest::header::{ACCEPT, RETRY_AFTER};

use super::error::FetchError;

/// Default timeout for a single HTTP round-trip (30 seconds).
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// What the transport needs to know about a mirror's response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorResponse {
    /// HTTP status code.
    pub status: u16,
    /// Raw `Retry-After` header, if present.
    pub retry_after: Option<String>,
    /// Response body. Only read for successful responses.
    pub body: Vec<u8>,
}

impl MirrorResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Trait for posting a query to one mirror.
///
/// This abstraction allows for dependency injection and easier testing
/// by enabling scripted mirror clients in tests.
pub trait MirrorHttpClient: Send + Sync {
    /// Posts `query` as the form field `data` to `url`.
    ///
    /// # Returns
    ///
    /// The response for any HTTP status, or `FetchError::Network` when no
    /// response was received.
    fn post_form(
        &self,
        url: &str,
        query: &str,
    ) -> impl Future<Output = Result<MirrorResponse, FetchError>> + Send;
}

/// Real HTTP client implementation using reqwest.
#[derive(Debug, Clone)]
pub struct ReqwestMirrorClient {
    client: reqwest::Client,
}

impl ReqwestMirrorClient {
    /// Creates a new client with the given per-request timeout.
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("poimap/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

impl MirrorHttpClient for ReqwestMirrorClient {
    async fn post_form(&self, url: &str, query: &str) -> Result<MirrorResponse, FetchError> {
        let response = self
            .client
            .post(url)
            .header(ACCEPT, "application/json")
            .form(&[("data", query)])
            .send()
            .await?;

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        let body = if response.status().is_success() {
            response.bytes().await?.to_vec()
        } else {
            Vec::new()
        };

        Ok(MirrorResponse {
            status,
            retry_after,
            body,
        })
    }
}
