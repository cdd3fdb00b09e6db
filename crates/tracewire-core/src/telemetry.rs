//! OpenTelemetry bootstrap: OTLP exporter, tracer provider and propagator.
//!
//! [`Telemetry::init`] is called once at startup. It installs the provider and the text-map
//! propagator globally (so other libraries and outgoing requests pick them up) and hands
//! back an explicit tracer for the pipeline. Dropping or shutting down the returned
//! [`Telemetry`] flushes pending spans.

use opentelemetry::{
    global,
    propagation::{TextMapCompositePropagator, TextMapPropagator},
    trace::TracerProvider as _,
    KeyValue,
};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    propagation::{BaggagePropagator, TraceContextPropagator},
    runtime,
    trace::{Tracer, TracerProvider},
    Resource,
};
use tracing::{info, warn};

use crate::config::{PropagationFormat, TelemetryConfig};

/// Instrumentation scope name for spans opened by this crate.
pub const INSTRUMENTATION_NAME: &str = "tracewire";

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("failed to build OTLP span exporter: {0}")]
    Exporter(#[from] opentelemetry::trace::TraceError),
}

/// Owns the tracer provider for the process lifetime.
pub struct Telemetry {
    provider: Option<TracerProvider>,
    tracer: Tracer,
    exporting: bool,
}

impl Telemetry {
    /// Builds the provider from `config` and installs it and the propagator globally.
    ///
    /// With `enabled = false` spans are still created, so parent/child structure and
    /// context propagation keep working, but nothing is exported.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError::Exporter`] if the OTLP exporter cannot be built.
    pub fn init(config: &TelemetryConfig) -> Result<Self, TelemetryError> {
        let telemetry = Self::build(config)?;

        if let Some(propagator) = propagator_for(config.propagation) {
            global::set_text_map_propagator(propagator);
        }
        if let Some(provider) = &telemetry.provider {
            global::set_tracer_provider(provider.clone());
        }

        info!(
            service_name = %config.service_name,
            otlp_endpoint = %config.otlp_endpoint,
            exporting = telemetry.exporting,
            propagation = ?config.propagation,
            "telemetry initialized"
        );

        Ok(telemetry)
    }

    /// Builds the provider without touching any global state.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError::Exporter`] if the OTLP exporter cannot be built.
    pub fn build(config: &TelemetryConfig) -> Result<Self, TelemetryError> {
        let resource =
            Resource::new([KeyValue::new("service.name", config.service_name.clone())]);
        let builder = TracerProvider::builder().with_resource(resource);

        let provider = if config.enabled {
            let exporter = opentelemetry_otlp::SpanExporter::builder()
                .with_tonic()
                .with_endpoint(config.otlp_endpoint.clone())
                .build()?;
            builder.with_batch_exporter(exporter, runtime::Tokio).build()
        } else {
            builder.build()
        };

        let tracer = provider.tracer(INSTRUMENTATION_NAME);
        Ok(Self { provider: Some(provider), tracer, exporting: config.enabled })
    }

    /// Tracer handle to pass into the pipeline.
    #[must_use]
    pub fn tracer(&self) -> Tracer {
        self.tracer.clone()
    }

    #[must_use]
    pub fn is_exporting(&self) -> bool {
        self.exporting
    }

    /// Flushes pending spans and shuts the provider down.
    pub fn shutdown(mut self) {
        self.shutdown_provider();
    }

    fn shutdown_provider(&mut self) {
        if let Some(provider) = self.provider.take() {
            if let Err(e) = provider.shutdown() {
                warn!(error = %e, "telemetry shutdown failed, spans may be lost");
            }
        }
    }
}

impl Drop for Telemetry {
    fn drop(&mut self) {
        self.shutdown_provider();
    }
}

fn propagator_for(format: PropagationFormat) -> Option<TextMapCompositePropagator> {
    let propagators: Vec<Box<dyn TextMapPropagator + Send + Sync>> = match format {
        PropagationFormat::TraceContext => vec![Box::new(TraceContextPropagator::new())],
        PropagationFormat::TraceContextBaggage => vec![
            Box::new(TraceContextPropagator::new()),
            Box::new(BaggagePropagator::new()),
        ],
        PropagationFormat::None => return None,
    };
    Some(TextMapCompositePropagator::new(propagators))
}
