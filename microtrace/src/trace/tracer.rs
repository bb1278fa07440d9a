//! The tracer is the entry point of the instrumentation API: it owns the
//! sampling policy, id generation and the span processor pipeline, and is
//! the only way to create spans.
//!
//! Tracers are cheap to clone (`Arc` internally) and are meant to be
//! built once at process start and shared across the application.

use std::borrow::Cow;
use std::sync::Arc;
use std::time::SystemTime;

use crate::trace::{
    IdGenerator, RandomIdGenerator, Sampler, ShouldSample, Span, SpanContext, SpanData,
    SpanProcessor, Status,
};
use crate::{Context, KeyValue, SpanId, TraceFlags, TraceResult};

#[derive(Debug)]
struct TracerInner {
    sampler: Box<dyn ShouldSample>,
    id_generator: Box<dyn IdGenerator>,
    processor: Option<Arc<dyn SpanProcessor>>,
}

/// Creates spans and routes finished ones into the processing pipeline.
#[derive(Clone, Debug)]
pub struct Tracer {
    inner: Arc<TracerInner>,
}

impl Tracer {
    /// Create a builder with the default configuration: an always-on
    /// sampler, random ids, and no span processor.
    pub fn builder() -> TracerBuilder {
        TracerBuilder::default()
    }

    /// Starts a new span with the default options.
    ///
    /// If `parent_cx` carries a valid [`SpanContext`], the new span joins
    /// that trace as a child; otherwise it becomes the root of a new
    /// trace with a freshly generated trace id.
    pub fn start(&self, name: impl Into<Cow<'static, str>>, parent_cx: &Context) -> Span {
        self.build_span(SpanBuilder::new(name), parent_cx)
    }

    /// Creates a [`SpanBuilder`] for a span with extra start options, to
    /// be started through [`SpanBuilder::start`].
    pub fn span_builder(&self, name: impl Into<Cow<'static, str>>) -> SpanBuilder {
        SpanBuilder::new(name)
    }

    fn build_span(&self, builder: SpanBuilder, parent_cx: &Context) -> Span {
        let parent = parent_cx.span_context().filter(|sc| sc.is_valid());

        let (trace_id, parent_span_id) = match parent {
            Some(parent) => (parent.trace_id(), parent.span_id()),
            None => (self.inner.id_generator.new_trace_id(), SpanId::INVALID),
        };
        let span_id = self.inner.id_generator.new_span_id();

        let sampled = self
            .inner
            .sampler
            .should_sample(parent, trace_id, &builder.name);
        let flags = TraceFlags::default().with_sampled(sampled);
        let span_context = SpanContext::new(trace_id, span_id, flags, false);

        if !sampled {
            // Non-recording span: identity still flows to children and
            // propagators, but nothing is collected or exported.
            return Span::new(span_context, None, self.inner.processor.clone());
        }

        let data = SpanData {
            span_context: span_context.clone(),
            parent_span_id,
            name: builder.name,
            start_time: builder.start_time.unwrap_or_else(SystemTime::now),
            end_time: SystemTime::UNIX_EPOCH,
            attributes: Vec::new(),
            events: Vec::new(),
            status: Status::Unset,
        };
        let mut span = Span::new(span_context, Some(data), self.inner.processor.clone());
        if let Some(attributes) = builder.attributes {
            // Routed through the span so repeated keys collapse to the
            // last write, same as attributes set after start.
            span.set_attributes(attributes);
        }
        span
    }

    /// Drains the span processor pipeline, blocking up to its deadline.
    pub fn force_flush(&self) -> TraceResult<()> {
        match &self.inner.processor {
            Some(processor) => processor.force_flush(),
            None => Ok(()),
        }
    }

    /// Flushes and shuts down the span processor pipeline. Spans ended
    /// after this call are dropped.
    pub fn shutdown(&self) -> TraceResult<()> {
        match &self.inner.processor {
            Some(processor) => processor.shutdown(),
            None => Ok(()),
        }
    }
}

/// Builder for [`Tracer`].
#[derive(Debug)]
pub struct TracerBuilder {
    sampler: Box<dyn ShouldSample>,
    id_generator: Box<dyn IdGenerator>,
    processor: Option<Arc<dyn SpanProcessor>>,
}

impl Default for TracerBuilder {
    fn default() -> Self {
        TracerBuilder {
            sampler: Box::new(Sampler::AlwaysOn),
            id_generator: Box::new(RandomIdGenerator::default()),
            processor: None,
        }
    }
}

impl TracerBuilder {
    /// The sampler deciding, at span start, which spans are recorded.
    pub fn with_sampler<S: ShouldSample + 'static>(mut self, sampler: S) -> Self {
        self.sampler = Box::new(sampler);
        self
    }

    /// The id generator used for fresh trace and span ids.
    pub fn with_id_generator<G: IdGenerator + 'static>(mut self, id_generator: G) -> Self {
        self.id_generator = Box::new(id_generator);
        self
    }

    /// The span processor receiving every finished span.
    pub fn with_span_processor<P: SpanProcessor + 'static>(mut self, processor: P) -> Self {
        self.processor = Some(Arc::new(processor));
        self
    }

    /// Build the configured [`Tracer`].
    pub fn build(self) -> Tracer {
        Tracer {
            inner: Arc::new(TracerInner {
                sampler: self.sampler,
                id_generator: self.id_generator,
                processor: self.processor,
            }),
        }
    }
}

/// `SpanBuilder` allows span attributes to be configured before the span
/// has started.
///
/// ```
/// use microtrace::trace::Tracer;
/// use microtrace::{Context, KeyValue};
///
/// let tracer = Tracer::builder().build();
///
/// // the builder API
/// let span = tracer
///     .span_builder("db.query")
///     .with_attributes(vec![KeyValue::new("db.table", "users")])
///     .start(&tracer, &Context::new());
/// # drop(span);
/// ```
#[derive(Clone, Debug, Default)]
pub struct SpanBuilder {
    /// The operation label.
    pub name: Cow<'static, str>,
    /// Attributes set before the span starts.
    pub attributes: Option<Vec<KeyValue>>,
    /// An explicit start time, `SystemTime::now()` otherwise.
    pub start_time: Option<SystemTime>,
}

impl SpanBuilder {
    /// Create a new `SpanBuilder` with the given operation name.
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        SpanBuilder {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Assign initial attributes, deduplicated by key, last write wins.
    pub fn with_attributes(self, attributes: Vec<KeyValue>) -> Self {
        SpanBuilder {
            attributes: Some(attributes),
            ..self
        }
    }

    /// Assign an explicit start time.
    pub fn with_start_time(self, start_time: SystemTime) -> Self {
        SpanBuilder {
            start_time: Some(start_time),
            ..self
        }
    }

    /// Starts the configured span through `tracer`.
    pub fn start(self, tracer: &Tracer, parent_cx: &Context) -> Span {
        tracer.build_span(self, parent_cx)
    }
}
