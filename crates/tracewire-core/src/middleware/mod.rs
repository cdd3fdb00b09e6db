//! Call middleware: adapters that wrap an [`RpcService`] and yield another.
//!
//! Each adapter is a pure transformer over the dispatch function. It receives the next
//! service in the chain at construction time and returns a service with the same
//! signature, so adapters compose freely and the terminal transport is just the innermost
//! service.
//!
//! # Architecture
//!
//! The default chain, as built by [`crate::pipeline::PipelineBuilder`]:
//!
//! ```text
//!   RpcClient::request(method, params)
//!        │
//!        ▼
//!   ┌─────────────────────────┐
//!   │  1. TRACE               │  TraceLayer
//!   │     - span rpc.<method> │  - child of the active context
//!   │     - attr "i" = param  │  - closed on every exit path
//!   └─────────────────────────┘
//!        │
//!        ▼
//!   ┌─────────────────────────┐
//!   │  2. CACHE               │  CacheLayer
//!   │     - allow-list check  │  - hit: return stored result
//!   │     - canonical key     │  - miss: forward, store Ok result
//!   └─────────────────────────┘
//!        │ miss or not allow-listed
//!        ▼
//!   ┌─────────────────────────┐
//!   │  3. TRANSPORT           │  HttpTransport
//!   │     - JSON-RPC over HTTP│  - bounded retries on 5xx
//!   └─────────────────────────┘
//! ```
//!
//! Tracing sits outermost so cache hits are still traced; the cache sits next to the
//! transport so only misses reach the network.
//!
//! # Module Organization
//!
//! - **[`cache`]**: allow-listed response cache keyed by canonical (method, params)
//! - **[`trace`]**: one OpenTelemetry span per call
//!
//! # Error Propagation
//!
//! Adapters never create, wrap or swallow [`crate::transport::RpcError`]s. Whatever the
//! inner service returns is what the caller sees.

pub mod cache;
pub mod trace;

pub use cache::{CacheKey, CacheLayer, CacheService, CacheStats, ResponseCache};
pub use trace::{TraceLayer, TraceService};

use std::sync::Arc;

use crate::transport::RpcService;

/// A reusable adapter that wraps the next service in a chain.
///
/// Implementations hold only their own configuration and shared state; the wrapped
/// service is supplied when the chain is folded.
pub trait Middleware: Send + Sync {
    /// Short stable name, used in logs and by [`crate::pipeline::Pipeline::layer_names`].
    fn name(&self) -> &'static str;

    /// Wraps `next`, returning a service with the same dispatch signature.
    fn wrap(&self, next: Arc<dyn RpcService>) -> Arc<dyn RpcService>;
}
