//! Tests for telemetry bootstrap. These touch the global provider and propagator, so
//! they run serially.

use std::collections::HashMap;

use opentelemetry::{
    global,
    trace::{Span, TraceContextExt, Tracer},
    Context,
};
use serial_test::serial;
use tracewire_core::{
    config::{PropagationFormat, TelemetryConfig},
    telemetry::Telemetry,
};

fn inject_current(cx: &Context) -> HashMap<String, String> {
    let mut carrier = HashMap::new();
    global::get_text_map_propagator(|propagator| propagator.inject_context(cx, &mut carrier));
    carrier
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn test_init_installs_global_provider_and_propagator() {
    let config = TelemetryConfig { enabled: false, ..TelemetryConfig::default() };
    let telemetry = Telemetry::init(&config).unwrap();
    assert!(!telemetry.is_exporting());

    let span = global::tracer("telemetry-tests").start("global span");
    assert!(span.span_context().is_valid());

    let cx = Context::current_with_span(span);
    let carrier = inject_current(&cx);
    let traceparent = carrier.get("traceparent").expect("traceparent injected");
    assert!(traceparent.contains(&cx.span().span_context().trace_id().to_string()));
    assert!(!carrier.contains_key("baggage"));

    cx.span().end();
    telemetry.shutdown();
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn test_pipeline_tracer_is_valid_without_export() {
    let config = TelemetryConfig { enabled: false, ..TelemetryConfig::default() };
    let telemetry = Telemetry::init(&config).unwrap();

    let span = telemetry.tracer().start("rpc.eth_chainId");
    assert!(span.span_context().is_valid());
    assert!(span.span_context().is_sampled());

    drop(span);
    telemetry.shutdown();
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn test_exporting_with_unreachable_collector() {
    // the OTLP channel connects lazily, so an absent collector is not a startup error
    let config = TelemetryConfig {
        otlp_endpoint: "http://127.0.0.1:1".to_string(),
        propagation: PropagationFormat::TraceContextBaggage,
        ..TelemetryConfig::default()
    };
    let telemetry = Telemetry::init(&config).unwrap();
    assert!(telemetry.is_exporting());

    let fields: Vec<String> = global::get_text_map_propagator(|propagator| {
        propagator.fields().map(String::from).collect()
    });
    assert!(fields.iter().any(|f| f == "traceparent"));
    assert!(fields.iter().any(|f| f == "baggage"));

    // no spans were started, so shutdown has nothing to flush
    telemetry.shutdown();
}
