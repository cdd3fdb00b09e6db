//! Terminal dispatch: the JSON-RPC over HTTP transport every pipeline ends in.
//!
//! [`RpcService`] is the single seam of the crate. The transport implements it, every
//! middleware wraps one and yields another, and the composed pipeline is itself one.

pub mod errors;
pub mod http_client;

pub use errors::{RpcError, RpcErrorCategory};
pub use http_client::{HttpClient, HttpClientConfig};

use async_trait::async_trait;
use serde_json::Value;
use std::{
    future::Future,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use crate::{
    config::TransportConfig,
    types::{JsonRpcResponse, RpcCall},
};

/// Something that can dispatch an RPC call and produce its result.
#[async_trait]
pub trait RpcService: Send + Sync {
    /// Dispatches `call` and resolves to the JSON-RPC `result` value.
    ///
    /// # Errors
    ///
    /// Returns an [`RpcError`] if the call fails anywhere below this service.
    async fn dispatch(&self, call: RpcCall) -> Result<Value, RpcError>;
}

#[async_trait]
impl<S: RpcService + ?Sized> RpcService for Arc<S> {
    async fn dispatch(&self, call: RpcCall) -> Result<Value, RpcError> {
        (**self).dispatch(call).await
    }
}

/// Adapts an async closure into an [`RpcService`].
///
/// Mostly useful for stub transports in tests and for one-off adapters.
pub struct ServiceFn<F> {
    f: F,
}

/// Creates a [`ServiceFn`] from `f`.
pub fn service_fn<F, Fut>(f: F) -> ServiceFn<F>
where
    F: Fn(RpcCall) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, RpcError>> + Send + 'static,
{
    ServiceFn { f }
}

#[async_trait]
impl<F, Fut> RpcService for ServiceFn<F>
where
    F: Fn(RpcCall) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, RpcError>> + Send + 'static,
{
    async fn dispatch(&self, call: RpcCall) -> Result<Value, RpcError> {
        (self.f)(call).await
    }
}

/// JSON-RPC 2.0 transport posting each call to a single HTTP(S) endpoint.
pub struct HttpTransport {
    endpoint: String,
    http_client: Arc<HttpClient>,
    timeout: Duration,
    next_id: AtomicU64,
}

impl HttpTransport {
    #[must_use]
    pub fn new(
        endpoint: impl Into<String>,
        http_client: Arc<HttpClient>,
        timeout: Duration,
    ) -> Self {
        Self { endpoint: endpoint.into(), http_client, timeout, next_id: AtomicU64::new(1) }
    }

    /// Builds a transport and its HTTP client from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(config: &TransportConfig) -> Result<Self, RpcError> {
        let http_client = HttpClient::with_config(HttpClientConfig {
            concurrent_limit: config.concurrent_limit,
            max_retries: config.max_retries,
            ..HttpClientConfig::default()
        })?;

        Ok(Self::new(
            config.endpoint.clone(),
            Arc::new(http_client),
            Duration::from_secs(config.timeout_seconds),
        ))
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn decode_response(bytes: &[u8]) -> Result<Value, RpcError> {
        let response: JsonRpcResponse = serde_json::from_slice(bytes)
            .map_err(|e| RpcError::InvalidResponse(format!("Invalid JSON: {e}")))?;

        if let Some(error) = response.error {
            return Err(RpcError::RpcError(error.code, error.message));
        }

        Ok(response.result.unwrap_or(Value::Null))
    }
}

#[async_trait]
impl RpcService for HttpTransport {
    async fn dispatch(&self, call: RpcCall) -> Result<Value, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = call.to_request(id);

        let body = serde_json::to_vec(&request)
            .map_err(|e| RpcError::InvalidRequest(format!("Failed to serialize request: {e}")))?;

        tracing::debug!(method = call.method(), id, "sending request to endpoint");

        let result = match self
            .http_client
            .send_request(&self.endpoint, bytes::Bytes::from(body), self.timeout)
            .await
        {
            Ok(response_bytes) => Self::decode_response(&response_bytes),
            Err(e) => Err(e),
        };

        if let Err(ref e) = result {
            tracing::debug!(
                method = call.method(),
                id,
                kind = e.kind(),
                transient = e.is_transient(),
                error = %e,
                "endpoint returned an error"
            );
        }
        result
    }
}
