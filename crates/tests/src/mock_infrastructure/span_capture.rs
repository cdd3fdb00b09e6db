//! In-memory span capture for asserting on what the trace adapter emits.

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::{
    export::trace::SpanData,
    testing::trace::InMemorySpanExporter,
    trace::{Tracer, TracerProvider},
};

/// A tracer provider whose spans are exported synchronously into memory.
pub struct SpanCapture {
    exporter: InMemorySpanExporter,
    provider: TracerProvider,
}

impl SpanCapture {
    #[must_use]
    pub fn new() -> Self {
        let exporter = InMemorySpanExporter::default();
        let provider = TracerProvider::builder().with_simple_exporter(exporter.clone()).build();
        Self { exporter, provider }
    }

    #[must_use]
    pub fn tracer(&self) -> Tracer {
        self.provider.tracer("tracewire-tests")
    }

    /// All spans ended so far, in the order they ended.
    ///
    /// # Panics
    ///
    /// Panics if the exporter lock is poisoned.
    #[must_use]
    pub fn finished(&self) -> Vec<SpanData> {
        self.exporter.get_finished_spans().expect("in-memory exporter readable")
    }

    #[must_use]
    pub fn named(&self, name: &str) -> Vec<SpanData> {
        self.finished().into_iter().filter(|span| span.name == name).collect()
    }
}

impl Default for SpanCapture {
    fn default() -> Self {
        Self::new()
    }
}

/// String value of attribute `key` on `span`, if present.
#[must_use]
pub fn attribute(span: &SpanData, key: &str) -> Option<String> {
    span.attributes
        .iter()
        .find(|kv| kv.key.as_str() == key)
        .map(|kv| kv.value.as_str().into_owned())
}
