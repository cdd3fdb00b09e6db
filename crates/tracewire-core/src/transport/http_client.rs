use reqwest::{Client, ClientBuilder};
use std::{sync::Arc, time::Duration};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use super::RpcError;

/// Configuration for HTTP client concurrency, timeouts and retries.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Maximum number of concurrent HTTP requests allowed
    pub concurrent_limit: usize,
    /// Permit acquisition timeout in milliseconds
    pub permit_timeout_ms: u64,
    /// Retries after the first attempt for connect failures and HTTP 5xx
    pub max_retries: u32,
    /// TCP connect timeout in seconds
    pub connect_timeout_seconds: u64,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            concurrent_limit: 64,
            permit_timeout_ms: 500,
            max_retries: 2,
            connect_timeout_seconds: 5,
        }
    }
}

/// HTTP client with semaphore-based concurrency control.
///
/// Owns the retry policy for the pipeline: adapters above the transport never retry.
pub struct HttpClient {
    client: Client,
    concurrent_limit: Arc<Semaphore>,
    config: HttpClientConfig,
}

/// RAII guard ensuring semaphore permits are always released.
struct PermitGuard {
    _permit: OwnedSemaphorePermit,
    semaphore: Arc<Semaphore>,
}

impl PermitGuard {
    fn new(permit: OwnedSemaphorePermit, semaphore: Arc<Semaphore>) -> Self {
        Self { _permit: permit, semaphore }
    }
}

impl Drop for PermitGuard {
    fn drop(&mut self) {
        tracing::trace!(
            available_permits = self.semaphore.available_permits(),
            "permit guard dropped"
        );
    }
}

// Default is not implemented because building the reqwest client can fail.

impl HttpClient {
    /// Creates a new HTTP client with default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying reqwest client fails to build.
    pub fn new() -> Result<Self, RpcError> {
        Self::with_config(HttpClientConfig::default())
    }

    /// Maps a reqwest failure to a message that never echoes the endpoint URL, which
    /// usually carries an API key.
    fn sanitize_network_error(error: &reqwest::Error) -> String {
        if error.is_connect() {
            "connection refused or unreachable".to_string()
        } else if error.is_timeout() {
            "connection timed out".to_string()
        } else if error.is_request() {
            "request failed".to_string()
        } else if error.is_body() {
            "response body error".to_string()
        } else if error.is_decode() {
            "response decode error".to_string()
        } else if error.is_redirect() {
            "too many redirects".to_string()
        } else {
            "network error".to_string()
        }
    }

    /// Creates a new HTTP client with the provided configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying reqwest client fails to build.
    pub fn with_config(config: HttpClientConfig) -> Result<Self, RpcError> {
        let client = ClientBuilder::new()
            .pool_idle_timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .http2_adaptive_window(true)
            .use_rustls_tls()
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(concat!("tracewire/", env!("CARGO_PKG_VERSION")))
            .tcp_keepalive(Duration::from_secs(30))
            .tcp_nodelay(true)
            .build()
            .map_err(|e| {
                tracing::error!(error = %e, "failed to build http client");
                RpcError::ConnectionFailed(format!("HTTP client build failed: {e}"))
            })?;

        Ok(Self {
            client,
            concurrent_limit: Arc::new(Semaphore::new(config.concurrent_limit)),
            config,
        })
    }

    /// Sends an HTTP POST with a JSON body under the concurrency limit.
    ///
    /// # Errors
    ///
    /// - [`RpcError::Timeout`] if permit acquisition or the request times out
    /// - [`RpcError::ConcurrencyLimit`] if the semaphore is closed
    /// - [`RpcError::HttpError`] for non-success HTTP status codes
    /// - [`RpcError::ConnectionFailed`] for network-related failures
    pub async fn send_request(
        &self,
        url: &str,
        body: bytes::Bytes,
        timeout: Duration,
    ) -> Result<bytes::Bytes, RpcError> {
        let permit = tokio::time::timeout(
            Duration::from_millis(self.config.permit_timeout_ms),
            Arc::clone(&self.concurrent_limit).acquire_owned(),
        )
        .await
        .map_err(|_| {
            tracing::warn!(
                available_permits = self.concurrent_limit.available_permits(),
                "http client semaphore acquisition timeout"
            );
            RpcError::Timeout
        })?
        .map_err(|_| RpcError::ConcurrencyLimit("http client semaphore closed".to_string()))?;

        let _permit_guard = PermitGuard::new(permit, Arc::clone(&self.concurrent_limit));

        let mut retries = 0;

        loop {
            let result = self
                .client
                .post(url)
                .header("content-type", "application/json")
                // Bytes::clone() only bumps a refcount, so retries never copy the body
                .body(body.clone())
                .timeout(timeout)
                .send()
                .await;

            match result {
                Ok(response) => {
                    if response.status().is_success() {
                        return response.bytes().await.map_err(RpcError::Network);
                    } else if response.status().is_server_error() &&
                        retries < self.config.max_retries
                    {
                        retries += 1;
                        tracing::warn!(
                            status = response.status().as_u16(),
                            attempt = retries,
                            "endpoint returned server error, retrying"
                        );
                        tokio::time::sleep(Self::backoff(retries)).await;
                        continue;
                    }

                    let status = response.status().as_u16();
                    let raw_text = response.text().await.unwrap_or_default();
                    return Err(RpcError::HttpError(status, truncate_body(raw_text)));
                }
                Err(e) if !e.is_timeout() && retries < self.config.max_retries => {
                    retries += 1;
                    tracing::warn!(
                        error = %Self::sanitize_network_error(&e),
                        attempt = retries,
                        "http request failed, retrying"
                    );
                    tokio::time::sleep(Self::backoff(retries)).await;
                }
                Err(e) => {
                    if e.is_timeout() {
                        return Err(RpcError::Timeout);
                    }
                    return Err(RpcError::ConnectionFailed(Self::sanitize_network_error(&e)));
                }
            }
        }
    }

    fn backoff(attempt: u32) -> Duration {
        Duration::from_millis(100 * (1 << attempt.min(6)))
    }

    #[must_use]
    pub fn available_permits(&self) -> usize {
        self.concurrent_limit.available_permits()
    }
}

fn truncate_body(raw_text: String) -> String {
    const MAX_BODY: usize = 256;

    if raw_text.len() <= MAX_BODY {
        return raw_text;
    }
    let cut = (0..=MAX_BODY).rev().find(|i| raw_text.is_char_boundary(*i)).unwrap_or(0);
    format!("{}... (truncated)", &raw_text[..cut])
}
