//! Tests for the default pipeline over a real HTTP transport.
//!
//! Every test points an [`HttpTransport`] at a mockito server and captures spans in
//! memory, so both the network hit count and the emitted spans can be asserted.

use std::sync::Arc;

use futures::future::join_all;
use opentelemetry::trace::{FutureExt, SpanKind, Status, TraceContextExt, Tracer};
use opentelemetry::Context;
use serde_json::{json, Value};
use tracewire_core::{
    config::{CacheConfig, TransportConfig},
    middleware::{CacheLayer, Middleware, ResponseCache, TraceLayer},
    transport::HttpTransport,
    Pipeline, PipelineBuilder, RpcCall, RpcError, RpcService,
};

use crate::mock_infrastructure::{attribute, RpcMockBuilder, SpanCapture};

fn transport_for(endpoint: &str, max_retries: u32) -> Arc<dyn RpcService> {
    let config = TransportConfig {
        endpoint: endpoint.to_string(),
        timeout_seconds: 5,
        max_retries,
        ..TransportConfig::default()
    };
    Arc::new(HttpTransport::from_config(&config).unwrap())
}

fn default_pipeline(endpoint: &str, spans: &SpanCapture) -> Pipeline {
    PipelineBuilder::new(transport_for(endpoint, 0), spans.tracer(), &CacheConfig::default())
        .build()
}

/// Default chain with a cache handle the test can inspect.
fn observable_pipeline(
    endpoint: &str,
    spans: &SpanCapture,
    annotate: bool,
) -> (Pipeline, Arc<ResponseCache>) {
    let cache = Arc::new(ResponseCache::new(["eth_chainId"]));
    let defaults: Vec<Arc<dyn Middleware>> = vec![
        Arc::new(TraceLayer::new(spans.tracer())),
        Arc::new(CacheLayer::new(Arc::clone(&cache)).with_span_annotations(annotate)),
    ];
    let pipeline = PipelineBuilder::bare(transport_for(endpoint, 0))
        .replace_defaults(defaults)
        .build();
    (pipeline, cache)
}

fn contract_call() -> RpcCall {
    RpcCall::new(
        "eth_call",
        vec![
            json!({
                "to": "0xc305c901078781C232A2a521C2aF7980f8385ee9",
                "data": "0x477a5c98",
                "value": "0x0",
                "gas": "0x54e8"
            }),
            json!("latest"),
        ],
    )
}

#[tokio::test]
async fn test_chain_id_cached_but_traced_twice() {
    let mut mock = RpcMockBuilder::new().await;
    mock.mock_chain_id(1, 1);
    let spans = SpanCapture::new();
    let (pipeline, cache) = observable_pipeline(&mock.url(), &spans, false);

    let first = pipeline.dispatch(RpcCall::without_params("eth_chainId")).await.unwrap();
    let second = pipeline.dispatch(RpcCall::without_params("eth_chainId")).await.unwrap();

    assert_eq!(first, json!("0x1"));
    assert_eq!(first, second);

    let stats = cache.stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.entries, 1);

    let chain_spans = spans.named("rpc.eth_chainId");
    assert_eq!(chain_spans.len(), 2);
    for span in &chain_spans {
        assert_eq!(span.span_kind, SpanKind::Client);
        assert!(span.attributes.is_empty());
        assert_eq!(span.status, Status::Unset);
    }

    mock.assert_all().await;
}

#[tokio::test]
async fn test_eth_call_span_carries_compact_params() {
    let mut mock = RpcMockBuilder::new().await;
    let returned = format!("0x{}1", "0".repeat(63));
    mock.mock_eth_call("0x477a5c98", &returned, 1);
    let spans = SpanCapture::new();
    let pipeline = default_pipeline(&mock.url(), &spans);

    let result = pipeline.dispatch(contract_call()).await.unwrap();
    assert_eq!(result, json!(returned));

    let call_spans = spans.named("rpc.eth_call");
    assert_eq!(call_spans.len(), 1);
    let span = &call_spans[0];

    assert_eq!(span.attributes.len(), 2);
    let tx: Value = serde_json::from_str(&attribute(span, "0").unwrap()).unwrap();
    assert_eq!(tx["data"], "0x477a5c98");
    assert!(!attribute(span, "0").unwrap().contains(' '));
    assert_eq!(attribute(span, "1").as_deref(), Some("latest"));

    mock.assert_all().await;
}

#[tokio::test]
async fn test_non_allowlisted_method_reaches_endpoint_every_time() {
    let mut mock = RpcMockBuilder::new().await;
    mock.mock_eth_call("0x477a5c98", "0x", 2);
    let spans = SpanCapture::new();
    let pipeline = default_pipeline(&mock.url(), &spans);

    pipeline.dispatch(contract_call()).await.unwrap();
    pipeline.dispatch(contract_call()).await.unwrap();

    assert_eq!(spans.named("rpc.eth_call").len(), 2);
    mock.assert_all().await;
}

#[tokio::test]
async fn test_connection_failure_reraised_and_recorded() {
    let spans = SpanCapture::new();
    // nothing listens on port 1
    let pipeline = default_pipeline("http://127.0.0.1:1", &spans);

    let call = RpcCall::new("eth_getBalance", vec![json!("0xabc"), json!("latest")]);
    let err = pipeline.dispatch(call).await.unwrap_err();
    assert!(matches!(err, RpcError::ConnectionFailed(_)), "got {err:?}");

    let balance_spans = spans.named("rpc.eth_getBalance");
    assert_eq!(balance_spans.len(), 1);
    let span = &balance_spans[0];
    assert!(matches!(span.status, Status::Error { .. }));
    assert!(span.events.iter().any(|event| event.name == "exception"));

    // two params, two attributes, on the error path too
    assert_eq!(span.attributes.len(), 2);
    assert_eq!(attribute(span, "0").as_deref(), Some("0xabc"));
    assert_eq!(attribute(span, "1").as_deref(), Some("latest"));
}

#[tokio::test]
async fn test_rpc_error_propagated_and_not_cached() {
    let mut mock = RpcMockBuilder::new().await;
    mock.mock_rpc_error("eth_chainId", -32000, "header not found", 2);
    let spans = SpanCapture::new();
    let (pipeline, cache) = observable_pipeline(&mock.url(), &spans, false);

    for _ in 0..2 {
        let err = pipeline.dispatch(RpcCall::without_params("eth_chainId")).await.unwrap_err();
        match err {
            RpcError::RpcError(code, message) => {
                assert_eq!(code, -32000);
                assert_eq!(message, "header not found");
            }
            other => panic!("expected RpcError, got {other:?}"),
        }
    }

    assert!(cache.is_empty());
    assert_eq!(cache.stats().misses, 2);
    assert_eq!(spans.named("rpc.eth_chainId").len(), 2);
    mock.assert_all().await;
}

#[tokio::test]
async fn test_server_errors_retried_by_transport_only() {
    let mut mock = RpcMockBuilder::new().await;
    mock.mock_http_status(503, "upstream unavailable", 3);
    let spans = SpanCapture::new();
    let pipeline =
        PipelineBuilder::new(transport_for(&mock.url(), 2), spans.tracer(), &CacheConfig::default())
            .build();

    let err = pipeline.dispatch(RpcCall::without_params("eth_blockNumber")).await.unwrap_err();
    assert!(matches!(err, RpcError::HttpError(503, _)), "got {err:?}");

    // three attempts on the wire, one span
    assert_eq!(spans.named("rpc.eth_blockNumber").len(), 1);
    mock.assert_all().await;
}

#[tokio::test]
async fn test_calls_nest_under_caller_span() {
    let mut mock = RpcMockBuilder::new().await;
    mock.mock_chain_id(10, 1);
    mock.mock_eth_call("0x477a5c98", "0x", 1);
    let spans = SpanCapture::new();
    let pipeline = default_pipeline(&mock.url(), &spans);

    let root = spans.tracer().start("tracewire run");
    let cx = Context::current_with_span(root);

    async {
        pipeline.dispatch(RpcCall::without_params("eth_chainId")).await.unwrap();
        pipeline.dispatch(contract_call()).await.unwrap();
    }
    .with_context(cx.clone())
    .await;
    cx.span().end();

    let root = spans.named("tracewire run").remove(0);
    let root_id = root.span_context.span_id();
    let trace_id = root.span_context.trace_id();

    for name in ["rpc.eth_chainId", "rpc.eth_call"] {
        let child = spans.named(name).remove(0);
        assert_eq!(child.parent_span_id, root_id, "{name} is not a child of the root");
        assert_eq!(child.span_context.trace_id(), trace_id);
    }

    mock.assert_all().await;
}

#[tokio::test]
async fn test_concurrent_calls_each_get_a_span() {
    let mut mock = RpcMockBuilder::new().await;
    mock.mock_method("eth_blockNumber", &json!("0x10"), 8);
    let spans = SpanCapture::new();
    let pipeline = default_pipeline(&mock.url(), &spans);

    let calls = (0..8).map(|_| pipeline.dispatch(RpcCall::without_params("eth_blockNumber")));
    let results = join_all(calls).await;

    assert!(results.iter().all(|r| r.as_ref().is_ok_and(|v| v == &json!("0x10"))));

    let block_spans = spans.named("rpc.eth_blockNumber");
    assert_eq!(block_spans.len(), 8);
    let mut ids: Vec<_> = block_spans.iter().map(|s| s.span_context.span_id()).collect();
    ids.sort_unstable_by_key(|id| id.to_bytes());
    ids.dedup();
    assert_eq!(ids.len(), 8);

    mock.assert_all().await;
}

#[tokio::test]
async fn test_cache_annotations_on_trace_span() {
    let mut mock = RpcMockBuilder::new().await;
    mock.mock_chain_id(1, 1);
    mock.mock_method("eth_blockNumber", &json!("0x10"), 1);
    let spans = SpanCapture::new();
    let (pipeline, _cache) = observable_pipeline(&mock.url(), &spans, true);

    pipeline.dispatch(RpcCall::without_params("eth_chainId")).await.unwrap();
    pipeline.dispatch(RpcCall::without_params("eth_chainId")).await.unwrap();
    pipeline.dispatch(RpcCall::without_params("eth_blockNumber")).await.unwrap();

    let outcomes: Vec<_> = spans
        .named("rpc.eth_chainId")
        .iter()
        .map(|span| attribute(span, "rpc.cache"))
        .collect();
    assert_eq!(outcomes, vec![Some("miss".to_string()), Some("hit".to_string())]);

    // not allow-listed, so no tag
    let block = spans.named("rpc.eth_blockNumber").remove(0);
    assert_eq!(attribute(&block, "rpc.cache"), None);

    mock.assert_all().await;
}

#[tokio::test]
async fn test_disabled_cache_forwards_every_call() {
    let mut mock = RpcMockBuilder::new().await;
    mock.mock_chain_id(1, 2);
    let spans = SpanCapture::new();
    let config = CacheConfig { enabled: false, ..CacheConfig::default() };
    let pipeline = PipelineBuilder::new(transport_for(&mock.url(), 0), spans.tracer(), &config)
        .build();

    assert_eq!(pipeline.layer_names(), ["trace"]);

    pipeline.dispatch(RpcCall::without_params("eth_chainId")).await.unwrap();
    pipeline.dispatch(RpcCall::without_params("eth_chainId")).await.unwrap();

    assert_eq!(spans.named("rpc.eth_chainId").len(), 2);
    mock.assert_all().await;
}
