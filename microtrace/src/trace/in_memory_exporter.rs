//! In-memory span exporter for testing and debugging.

use std::sync::{Arc, Mutex};

use futures_util::future::BoxFuture;

use crate::trace::{ExportResult, SpanData, SpanExporter};
use crate::{TraceError, TraceResult};

/// An in-memory span exporter that stores finished spans in a shared
/// vector for later inspection.
///
/// Clones share the same storage, so a test can keep one handle while
/// handing another to the processor:
///
/// ```
/// use microtrace::trace::{InMemorySpanExporter, SimpleSpanProcessor, Tracer};
/// use microtrace::Context;
///
/// let exporter = InMemorySpanExporter::default();
/// let tracer = Tracer::builder()
///     .with_span_processor(SimpleSpanProcessor::new(Box::new(exporter.clone())))
///     .build();
///
/// tracer.start("lookup", &Context::new()).end();
///
/// let spans = exporter.finished_spans().expect("spans are exported");
/// assert_eq!(spans.len(), 1);
/// assert_eq!(spans[0].name, "lookup");
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemorySpanExporter {
    spans: Arc<Mutex<Vec<SpanData>>>,
}

impl InMemorySpanExporter {
    /// Returns a copy of the finished spans exported so far.
    pub fn finished_spans(&self) -> TraceResult<Vec<SpanData>> {
        self.spans
            .lock()
            .map(|spans| spans.clone())
            .map_err(TraceError::from)
    }

    /// Clears the stored spans.
    pub fn reset(&self) {
        if let Ok(mut spans) = self.spans.lock() {
            spans.clear();
        }
    }
}

impl SpanExporter for InMemorySpanExporter {
    fn export(&mut self, batch: Vec<SpanData>) -> BoxFuture<'static, ExportResult> {
        let result = self
            .spans
            .lock()
            .map(|mut spans| spans.extend(batch))
            .map_err(TraceError::from);
        Box::pin(std::future::ready(result))
    }

    // Spans stay readable after shutdown so tests can assert on what a
    // final flush delivered; call `reset` to clear them.
    fn shutdown(&mut self) {}
}
