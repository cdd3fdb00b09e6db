//! Core type definitions for JSON-RPC calls flowing through the pipeline.
//!
//! # Type Categories
//!
//! ## Pipeline Types
//! - [`RpcCall`]: the immutable (method, params) pair every adapter sees
//!
//! ## JSON-RPC Protocol Types
//! - [`JsonRpcRequest`], [`JsonRpcResponse`], [`JsonRpcError`]: wire format used by the
//!   HTTP transport
//!
//! # Performance Notes
//!
//! `RpcCall` stores its method and params behind `Arc`, so cloning a call between
//! adapters never copies parameter data.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{borrow::Cow, sync::Arc};

/// JSON-RPC protocol version constant to avoid repeated allocations.
pub const JSONRPC_VERSION: &str = "2.0";

/// Pre-allocated `Cow` for JSON-RPC version - zero allocation for static usage.
pub const JSONRPC_VERSION_COW: Cow<'static, str> = Cow::Borrowed(JSONRPC_VERSION);

/// Methods whose responses are cached when no allow-list is configured.
///
/// The chain id of an endpoint never changes during a process lifetime, which makes it the
/// one method safe to cache without invalidation.
pub const DEFAULT_CACHEABLE_METHODS: &[&str] = &["eth_chainId"];

/// A single RPC invocation: a method name plus ordered positional parameters.
///
/// Immutable once constructed. Adapters read the method and params through accessors and
/// forward the call (cheaply cloned) to the next service.
///
/// # Example
///
/// ```
/// use tracewire_core::types::RpcCall;
/// use serde_json::json;
///
/// let call = RpcCall::new("eth_getBalance", vec![json!("0x742d35Cc"), json!("latest")]);
///
/// assert_eq!(call.method(), "eth_getBalance");
/// assert_eq!(call.params().len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RpcCall {
    method: Arc<str>,
    params: Arc<[Value]>,
}

impl RpcCall {
    #[must_use]
    pub fn new(method: impl Into<Arc<str>>, params: impl Into<Vec<Value>>) -> Self {
        let params: Vec<Value> = params.into();
        Self { method: method.into(), params: params.into() }
    }

    /// Creates a call with no parameters.
    #[must_use]
    pub fn without_params(method: impl Into<Arc<str>>) -> Self {
        Self::new(method, Vec::new())
    }

    #[inline]
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    #[inline]
    #[must_use]
    pub fn params(&self) -> &[Value] {
        &self.params
    }

    /// Builds the JSON-RPC 2.0 envelope for this call with the given request id.
    #[must_use]
    pub fn to_request(&self, id: u64) -> JsonRpcRequest {
        JsonRpcRequest::new(
            self.method.as_ref(),
            Some(Value::Array(self.params.to_vec())),
            Value::from(id),
        )
    }
}

impl std::fmt::Display for RpcCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({} params)", self.method, self.params.len())
    }
}

/// JSON-RPC 2.0 request structure.
///
/// - `jsonrpc`: Uses `Cow<'static, str>` to avoid allocation when constructing with the static
///   version string "2.0".
/// - `id`: Uses `Arc<serde_json::Value>` so it can be shared with the matching response.
///
/// # Example
///
/// ```
/// use tracewire_core::types::JsonRpcRequest;
/// use serde_json::json;
///
/// let request = JsonRpcRequest::new("eth_chainId", None, json!(1));
///
/// assert_eq!(request.method, "eth_chainId");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: Cow<'static, str>,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    pub id: Arc<Value>,
}

impl JsonRpcRequest {
    /// Creates a new JSON-RPC request with zero allocation for the version string.
    #[must_use]
    pub fn new(method: impl Into<String>, params: Option<Value>, id: Value) -> Self {
        Self { jsonrpc: JSONRPC_VERSION_COW, method: method.into(), params, id: Arc::new(id) }
    }
}

/// JSON-RPC 2.0 response structure.
///
/// A response contains either a `result` (success) or an `error` (failure), but never both.
/// A response with neither is treated as a `null` result, which is what nodes return for
/// lookups of unknown blocks or transactions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: Cow<'static, str>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<JsonRpcError>,
    #[serde(default)]
    pub id: Arc<Value>,
}

/// JSON-RPC 2.0 error object.
///
/// Standard error codes follow the JSON-RPC 2.0 convention:
///
/// - `-32700`: Parse error (invalid JSON)
/// - `-32600`: Invalid request (malformed JSON-RPC)
/// - `-32601`: Method not found
/// - `-32602`: Invalid params
/// - `-32603`: Internal error
/// - `-32000` to `-32099`: Server errors (node specific)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}
