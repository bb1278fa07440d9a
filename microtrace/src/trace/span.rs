//! # Span
//!
//! A `Span` represents a single timed operation within a trace. Spans can
//! be nested to form a trace tree: each trace contains a root span, which
//! typically describes the end-to-end request latency, and zero or more
//! child spans for its sub-operations.
//!
//! A span is mutable only between start and end. Ending a span takes its
//! recorded data and hands it to the span processor exactly once; any
//! attribute, event, status or further `end` call after that point is a
//! silent no-op. Dropping a still-open span ends it, so a span started at
//! the top of a handler is closed on every exit path, panics included.

use std::borrow::Cow;
use std::sync::Arc;
use std::time::SystemTime;

use crate::trace::{SpanContext, SpanData, SpanProcessor};
use crate::KeyValue;

/// A timestamped annotation on a span.
#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    /// The event message.
    pub name: Cow<'static, str>,
    /// The wall-clock time the event was recorded.
    pub timestamp: SystemTime,
    /// Attributes describing the event.
    pub attributes: Vec<KeyValue>,
}

impl Event {
    /// Create a new `Event`.
    pub fn new(
        name: impl Into<Cow<'static, str>>,
        timestamp: SystemTime,
        attributes: Vec<KeyValue>,
    ) -> Self {
        Event {
            name: name.into(),
            timestamp,
            attributes,
        }
    }
}

/// The terminal disposition of a span.
///
/// Statuses are ordered `Unset < Error < Ok`; [`Span::set_status`] only
/// ever raises the status, so an explicit `Ok` cannot be clobbered by a
/// later error report and vice versa an error is not silently erased by a
/// generic `Ok`.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum Status {
    /// The default status.
    #[default]
    Unset,

    /// The operation contains an error.
    Error {
        /// The description of the error.
        description: Cow<'static, str>,
    },

    /// The operation has been validated to have completed successfully.
    Ok,
}

impl Status {
    /// Create an error status with the given description.
    pub fn error(description: impl Into<Cow<'static, str>>) -> Self {
        Status::Error {
            description: description.into(),
        }
    }
}

/// Single timed operation within a trace.
///
/// Spans are created by a [`Tracer`] and owned by the logical operation
/// that started them; children receive the parent's [`SpanContext`]
/// through an explicitly passed [`Context`], never the span itself.
///
/// [`Tracer`]: crate::trace::Tracer
/// [`Context`]: crate::Context
#[derive(Debug)]
pub struct Span {
    span_context: SpanContext,
    data: Option<SpanData>,
    processor: Option<Arc<dyn SpanProcessor>>,
}

impl Span {
    pub(crate) fn new(
        span_context: SpanContext,
        data: Option<SpanData>,
        processor: Option<Arc<dyn SpanProcessor>>,
    ) -> Self {
        Span {
            span_context,
            data,
            processor,
        }
    }

    /// Returns the `SpanContext` for this span.
    pub fn span_context(&self) -> &SpanContext {
        &self.span_context
    }

    /// Returns `true` if this span records information.
    ///
    /// `false` once the span has ended, or if the sampler decided against
    /// recording it at start.
    pub fn is_recording(&self) -> bool {
        self.data.is_some()
    }

    fn with_data<T, F>(&mut self, f: F) -> Option<T>
    where
        F: FnOnce(&mut SpanData) -> T,
    {
        self.data.as_mut().map(f)
    }

    /// Sets a single attribute, overwriting any previous value for the
    /// same key.
    pub fn set_attribute(&mut self, attribute: KeyValue) {
        self.with_data(|data| {
            match data
                .attributes
                .iter_mut()
                .find(|kv| kv.key == attribute.key)
            {
                Some(existing) => existing.value = attribute.value,
                None => data.attributes.push(attribute),
            }
        });
    }

    /// Merges the given attributes into the span, last write wins per key.
    pub fn set_attributes(&mut self, attributes: impl IntoIterator<Item = KeyValue>) {
        for attribute in attributes {
            self.set_attribute(attribute);
        }
    }

    /// Appends a timestamped event; events keep insertion order.
    pub fn add_event(&mut self, name: impl Into<Cow<'static, str>>, attributes: Vec<KeyValue>) {
        self.add_event_with_timestamp(name, SystemTime::now(), attributes)
    }

    /// Appends an event with an explicit timestamp.
    pub fn add_event_with_timestamp(
        &mut self,
        name: impl Into<Cow<'static, str>>,
        timestamp: SystemTime,
        attributes: Vec<KeyValue>,
    ) {
        let name = name.into();
        self.with_data(|data| data.events.push(Event::new(name, timestamp, attributes)));
    }

    /// Records the terminal disposition of the span.
    ///
    /// Callable any time before `end`; only raises the status (see
    /// [`Status`] ordering).
    pub fn set_status(&mut self, status: Status) {
        self.with_data(|data| {
            if status > data.status {
                data.status = status;
            }
        });
    }

    /// Finishes the span.
    ///
    /// Exactly one call takes effect: it stamps the end time and hands the
    /// span record to the processor. Subsequent calls are no-ops, so a
    /// span is exported at most once.
    pub fn end(&mut self) {
        self.end_with_timestamp(SystemTime::now());
    }

    /// Finishes the span with an explicit end timestamp.
    pub fn end_with_timestamp(&mut self, timestamp: SystemTime) {
        let Some(mut data) = self.data.take() else {
            return; // already ended or not recording
        };
        data.end_time = timestamp;
        if let Some(processor) = &self.processor {
            processor.on_end(data);
        }
    }

    #[cfg(test)]
    pub(crate) fn data(&self) -> Option<&SpanData> {
        self.data.as_ref()
    }
}

impl Drop for Span {
    /// Ends this span if it was not already explicitly ended.
    fn drop(&mut self) {
        self.end();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::in_memory_exporter::InMemorySpanExporter;
    use crate::trace::{SimpleSpanProcessor, Tracer};
    use crate::{Context, KeyValue};

    fn test_tracer() -> (Tracer, InMemorySpanExporter) {
        let exporter = InMemorySpanExporter::default();
        let tracer = Tracer::builder()
            .with_span_processor(SimpleSpanProcessor::new(Box::new(exporter.clone())))
            .build();
        (tracer, exporter)
    }

    #[test]
    fn events_keep_insertion_order() {
        let (tracer, exporter) = test_tracer();
        let mut span = tracer.start("op", &Context::new());
        span.add_event("first", vec![]);
        span.add_event("second", vec![KeyValue::new("k", 1i64)]);
        span.add_event("third", vec![]);
        span.end();

        let spans = exporter.finished_spans().unwrap();
        let names: Vec<_> = spans[0].events.iter().map(|e| e.name.as_ref()).collect();
        assert_eq!(names, vec!["first", "second", "third"]);
    }

    #[test]
    fn attributes_last_write_wins() {
        let (tracer, exporter) = test_tracer();
        let mut span = tracer.start("op", &Context::new());
        span.set_attribute(KeyValue::new("color", "red"));
        span.set_attribute(KeyValue::new("count", 1i64));
        span.set_attribute(KeyValue::new("color", "blue"));
        span.end();

        let spans = exporter.finished_spans().unwrap();
        assert_eq!(spans[0].attributes.len(), 2);
        assert_eq!(
            spans[0].attributes[0],
            KeyValue::new("color", "blue"),
        );
    }

    #[test]
    fn end_is_idempotent() {
        let (tracer, exporter) = test_tracer();
        let mut span = tracer.start("op", &Context::new());
        span.end();
        span.end();
        span.end();
        drop(span);

        assert_eq!(exporter.finished_spans().unwrap().len(), 1);
    }

    #[test]
    fn mutation_after_end_is_noop() {
        let (tracer, exporter) = test_tracer();
        let mut span = tracer.start("op", &Context::new());
        span.end();
        span.add_event("too late", vec![]);
        span.set_attribute(KeyValue::new("late", true));
        span.set_status(Status::Ok);
        assert!(!span.is_recording());
        drop(span);

        let spans = exporter.finished_spans().unwrap();
        assert_eq!(spans.len(), 1);
        assert!(spans[0].events.is_empty());
        assert!(spans[0].attributes.is_empty());
        assert_eq!(spans[0].status, Status::Unset);
    }

    #[test]
    fn drop_ends_open_span() {
        let (tracer, exporter) = test_tracer();
        {
            let mut span = tracer.start("op", &Context::new());
            span.add_event("working", vec![]);
        }
        let spans = exporter.finished_spans().unwrap();
        assert_eq!(spans.len(), 1);
        assert!(spans[0].end_time >= spans[0].start_time);
    }

    #[test]
    fn status_only_raises() {
        let (tracer, exporter) = test_tracer();
        let mut span = tracer.start("op", &Context::new());
        span.set_status(Status::error("boom"));
        span.set_status(Status::Unset);
        assert_eq!(span.data().unwrap().status, Status::error("boom"));
        span.set_status(Status::Ok);
        span.set_status(Status::error("late failure"));
        span.end();

        assert_eq!(exporter.finished_spans().unwrap()[0].status, Status::Ok);
    }
}
