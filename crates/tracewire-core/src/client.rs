//! Typed Ethereum JSON-RPC calls on top of a composed pipeline.

use opentelemetry::trace::Tracer;
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::sync::Arc;

use crate::{
    config::AppConfig,
    pipeline::{Pipeline, PipelineBuilder},
    transport::{HttpTransport, RpcError, RpcService},
    types::RpcCall,
    utils::{parse_quantity_u128, parse_quantity_u64, BlockRef},
};

/// Transaction fields for `eth_call` and `eth_estimateGas`.
///
/// Numeric fields are sent as `0x`-prefixed hex quantities. Unset fields are omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "quantity::serialize")]
    pub gas: Option<u128>,
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "quantity::serialize")]
    pub max_fee_per_gas: Option<u128>,
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "quantity::serialize")]
    pub max_priority_fee_per_gas: Option<u128>,
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "quantity::serialize")]
    pub value: Option<u128>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

mod quantity {
    use super::Serializer;

    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(
        value: &Option<u128>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => serializer.serialize_str(&format!("{v:#x}")),
            None => serializer.serialize_none(),
        }
    }
}

/// Client for the handful of RPC methods this crate issues.
///
/// Every method goes through the wrapped service, so whatever middleware the pipeline
/// carries applies uniformly.
#[derive(Clone)]
pub struct RpcClient {
    service: Arc<dyn RpcService>,
}

impl RpcClient {
    #[must_use]
    pub fn new(service: Arc<dyn RpcService>) -> Self {
        Self { service }
    }

    #[must_use]
    pub fn from_pipeline(pipeline: Pipeline) -> Self {
        Self::new(pipeline.into_service())
    }

    /// Builds the HTTP transport and the default pipeline from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config<T>(config: &AppConfig, tracer: T) -> Result<Self, RpcError>
    where
        T: Tracer + Send + Sync + 'static,
        T::Span: Send + Sync + 'static,
    {
        let transport = HttpTransport::from_config(&config.transport)?;
        tracing::info!(endpoint = %redact_endpoint(transport.endpoint()), "rpc client configured");

        let pipeline = PipelineBuilder::new(Arc::new(transport), tracer, &config.cache).build();
        Ok(Self::from_pipeline(pipeline))
    }

    /// Issues a raw JSON-RPC call.
    ///
    /// # Errors
    ///
    /// Returns whatever error the pipeline produced.
    pub async fn request(
        &self,
        method: impl Into<Arc<str>>,
        params: Vec<Value>,
    ) -> Result<Value, RpcError> {
        self.service.dispatch(RpcCall::new(method, params)).await
    }

    /// `eth_chainId`, decoded.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails or the result is not a hex quantity.
    pub async fn chain_id(&self) -> Result<u64, RpcError> {
        let result = self.request("eth_chainId", Vec::new()).await?;
        parse_quantity_u64(&result).map_err(|e| RpcError::InvalidResponse(e.to_string()))
    }

    /// `eth_blockNumber`, decoded.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails or the result is not a hex quantity.
    pub async fn block_number(&self) -> Result<u64, RpcError> {
        let result = self.request("eth_blockNumber", Vec::new()).await?;
        parse_quantity_u64(&result).map_err(|e| RpcError::InvalidResponse(e.to_string()))
    }

    /// `eth_call` against `block`, returning the hex-encoded return data.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails, reverts, or the result is not a string.
    pub async fn call(&self, tx: &TransactionRequest, block: BlockRef) -> Result<String, RpcError> {
        let tx = serde_json::to_value(tx)
            .map_err(|e| RpcError::InvalidRequest(format!("Failed to encode transaction: {e}")))?;

        match self.request("eth_call", vec![tx, block.to_param()]).await? {
            Value::String(data) => Ok(data),
            other => Err(RpcError::InvalidResponse(format!("expected hex data, got {other}"))),
        }
    }

    /// `eth_getBalance` of `address` at `block`, in wei.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails or the result is not a hex quantity.
    pub async fn get_balance(&self, address: &str, block: BlockRef) -> Result<u128, RpcError> {
        let result = self
            .request("eth_getBalance", vec![Value::String(address.to_string()), block.to_param()])
            .await?;
        parse_quantity_u128(&result).map_err(|e| RpcError::InvalidResponse(e.to_string()))
    }
}

/// Strips the path and query from an endpoint URL for logging; provider URLs usually
/// carry an API key in the path.
fn redact_endpoint(endpoint: &str) -> String {
    let (scheme, rest) = endpoint.split_once("://").unwrap_or(("", endpoint));
    let host = rest.split(['/', '?']).next().unwrap_or_default();
    if scheme.is_empty() {
        host.to_string()
    } else {
        format!("{scheme}://{host}")
    }
}
