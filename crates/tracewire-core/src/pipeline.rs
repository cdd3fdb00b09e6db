//! Folds an ordered list of middleware around a terminal transport.
//!
//! The first registered layer is the outermost: it sees the call first and the result
//! last. The chain is folded once in [`PipelineBuilder::build`] and never changes after
//! that.
//!
//! # Default Chain
//!
//! [`PipelineBuilder::new`] starts from `[trace, cache]`:
//!
//! ```text
//! caller ──► trace ──► cache ──► transport
//! ```
//!
//! so every call is traced, including cache hits, and only misses reach the network.
//! [`PipelineBuilder::layer`] appends after the defaults and never removes them.
//! Dropping the defaults takes an explicit [`PipelineBuilder::replace_defaults`] call.

use async_trait::async_trait;
use opentelemetry::trace::Tracer;
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

use crate::{
    config::CacheConfig,
    middleware::{CacheLayer, Middleware, TraceLayer},
    transport::{RpcError, RpcService},
    types::RpcCall,
};

/// Collects middleware and folds it around a transport.
pub struct PipelineBuilder {
    transport: Arc<dyn RpcService>,
    defaults: Vec<Arc<dyn Middleware>>,
    layers: Vec<Arc<dyn Middleware>>,
}

impl PipelineBuilder {
    /// Starts a builder with the default `[trace, cache]` chain.
    ///
    /// The cache layer is left out when `cache.enabled` is false.
    #[must_use]
    pub fn new<T>(transport: Arc<dyn RpcService>, tracer: T, cache: &CacheConfig) -> Self
    where
        T: Tracer + Send + Sync + 'static,
        T::Span: Send + Sync + 'static,
    {
        let mut defaults: Vec<Arc<dyn Middleware>> = vec![Arc::new(TraceLayer::new(tracer))];
        if cache.enabled {
            defaults.push(Arc::new(CacheLayer::from_config(cache)));
        }
        Self { transport, defaults, layers: Vec::new() }
    }

    /// Starts a builder with no default middleware.
    #[must_use]
    pub fn bare(transport: Arc<dyn RpcService>) -> Self {
        Self { transport, defaults: Vec::new(), layers: Vec::new() }
    }

    /// Appends `middleware` inside every layer registered so far.
    #[must_use]
    pub fn layer<M: Middleware + 'static>(mut self, middleware: M) -> Self {
        self.layers.push(Arc::new(middleware));
        self
    }

    /// Replaces the default chain with `defaults`. Layers added with [`layer`](Self::layer)
    /// are kept and stay inside the new defaults.
    #[must_use]
    pub fn replace_defaults(mut self, defaults: Vec<Arc<dyn Middleware>>) -> Self {
        self.defaults = defaults;
        self
    }

    /// Names of the layers in the order calls pass through them.
    #[must_use]
    pub fn layer_names(&self) -> Vec<&'static str> {
        self.defaults.iter().chain(&self.layers).map(|m| m.name()).collect()
    }

    #[must_use]
    pub fn build(self) -> Pipeline {
        let layer_names = self.layer_names();

        let service = self
            .defaults
            .iter()
            .chain(&self.layers)
            .rev()
            .fold(self.transport, |next, middleware| middleware.wrap(next));

        info!(layers = ?layer_names, "rpc pipeline built");

        Pipeline { service, layer_names }
    }
}

/// A composed dispatch service. Immutable once built.
#[derive(Clone)]
pub struct Pipeline {
    service: Arc<dyn RpcService>,
    layer_names: Vec<&'static str>,
}

impl Pipeline {
    #[must_use]
    pub fn layer_names(&self) -> &[&'static str] {
        &self.layer_names
    }

    #[must_use]
    pub fn into_service(self) -> Arc<dyn RpcService> {
        self.service
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline").field("layers", &self.layer_names).finish_non_exhaustive()
    }
}

#[async_trait]
impl RpcService for Pipeline {
    async fn dispatch(&self, call: RpcCall) -> Result<Value, RpcError> {
        self.service.dispatch(call).await
    }
}
