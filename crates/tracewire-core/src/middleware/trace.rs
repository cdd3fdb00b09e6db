//! One OpenTelemetry span per RPC call.
//!
//! The span is named `rpc.<method>`, opened as a child of whatever context is active when
//! the call starts, and carries one attribute per positional parameter keyed by its index.
//! It is the active context while the wrapped service runs, so spans opened further down
//! (or attributes set by the cache) land on it.
//!
//! The span is ended exactly once on every exit path:
//!
//! - success: status left unset
//! - failure: `exception` event, status `Error`
//! - cancellation (the call future dropped mid-flight): status `Error("cancelled")`
//!
//! The tracer is handed in by the caller. Nothing here reads the global provider.

use async_trait::async_trait;
use opentelemetry::{
    trace::{FutureExt, Span, SpanKind, Status, TraceContextExt, Tracer},
    Context, KeyValue,
};
use serde_json::Value;
use std::sync::Arc;

use super::Middleware;
use crate::{
    transport::{RpcError, RpcService},
    types::RpcCall,
};

/// Prefix of every span name this adapter opens.
pub const SPAN_NAME_PREFIX: &str = "rpc.";

/// [`Middleware`] that opens a client span around each call.
pub struct TraceLayer<T> {
    tracer: Arc<T>,
}

impl<T> TraceLayer<T>
where
    T: Tracer + Send + Sync + 'static,
    T::Span: Send + Sync + 'static,
{
    #[must_use]
    pub fn new(tracer: T) -> Self {
        Self { tracer: Arc::new(tracer) }
    }

    #[must_use]
    pub fn from_shared(tracer: Arc<T>) -> Self {
        Self { tracer }
    }
}

impl<T> Clone for TraceLayer<T> {
    fn clone(&self) -> Self {
        Self { tracer: Arc::clone(&self.tracer) }
    }
}

impl<T> Middleware for TraceLayer<T>
where
    T: Tracer + Send + Sync + 'static,
    T::Span: Send + Sync + 'static,
{
    fn name(&self) -> &'static str {
        "trace"
    }

    fn wrap(&self, next: Arc<dyn RpcService>) -> Arc<dyn RpcService> {
        Arc::new(TraceService { next, tracer: Arc::clone(&self.tracer) })
    }
}

/// Service produced by [`TraceLayer::wrap`].
pub struct TraceService<T> {
    next: Arc<dyn RpcService>,
    tracer: Arc<T>,
}

#[async_trait]
impl<T> RpcService for TraceService<T>
where
    T: Tracer + Send + Sync + 'static,
    T::Span: Send + Sync + 'static,
{
    async fn dispatch(&self, call: RpcCall) -> Result<Value, RpcError> {
        let mut span = self
            .tracer
            .span_builder(format!("{SPAN_NAME_PREFIX}{}", call.method()))
            .with_kind(SpanKind::Client)
            .start_with_context(self.tracer.as_ref(), &Context::current());

        for (index, param) in call.params().iter().enumerate() {
            span.set_attribute(KeyValue::new(index.to_string(), param_attribute_value(param)));
        }

        let cx = Context::current_with_span(span);
        let mut guard = SpanGuard::new(cx.clone());

        let result = self.next.dispatch(call).with_context(cx).await;
        guard.finish(&result);
        result
    }
}

/// String form of a parameter as recorded on the span.
///
/// JSON strings are recorded without quotes, everything else as compact JSON. A value that
/// cannot be rendered gets a placeholder instead of failing the call.
#[must_use]
pub fn param_attribute_value(param: &Value) -> String {
    match param {
        Value::String(s) => s.clone(),
        other => serde_json::to_string(other).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "failed to render rpc parameter for span attribute");
            "<unrenderable>".to_string()
        }),
    }
}

/// Ends the call span exactly once, marking it cancelled if dropped before [`finish`].
///
/// [`finish`]: SpanGuard::finish
struct SpanGuard {
    cx: Option<Context>,
}

impl SpanGuard {
    fn new(cx: Context) -> Self {
        Self { cx: Some(cx) }
    }

    fn finish(&mut self, result: &Result<Value, RpcError>) {
        let Some(cx) = self.cx.take() else { return };
        let span = cx.span();

        if let Err(error) = result {
            span.record_error(error);
            span.set_status(Status::error(error.to_string()));
        }
        span.end();
    }
}

impl Drop for SpanGuard {
    fn drop(&mut self) {
        if let Some(cx) = self.cx.take() {
            let span = cx.span();
            span.set_status(Status::error("cancelled"));
            span.end();
        }
    }
}
