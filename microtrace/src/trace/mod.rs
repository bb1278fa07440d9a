//! API for distributed tracing.
//!
//! A *trace* records the path a request takes through a system, as a tree
//! of [`Span`]s. Each span covers one named, timed operation and carries
//! structured attributes, events and a terminal [`Status`].
//!
//! The pieces fit together like this:
//!
//! * a [`Tracer`] starts spans, consulting its sampler and id generator;
//! * parent/child relationships flow through an explicitly passed
//!   [`Context`], never a thread-local;
//! * when a span ends, its [`SpanData`] record goes to a
//!   [`SpanProcessor`], which batches it and drives a [`SpanExporter`]
//!   to a collector.
//!
//! ```
//! use microtrace::trace::{InMemorySpanExporter, SimpleSpanProcessor, Tracer};
//! use microtrace::{Context, KeyValue};
//!
//! let exporter = InMemorySpanExporter::default();
//! let tracer = Tracer::builder()
//!     .with_span_processor(SimpleSpanProcessor::new(Box::new(exporter.clone())))
//!     .build();
//!
//! let mut parent = tracer.start("handle_request", &Context::new());
//! parent.set_attribute(KeyValue::new("http.route", "/fortune"));
//!
//! let cx = Context::new().with_span(&parent);
//! let mut child = tracer.start("draw_fortune", &cx);
//! child.end();
//! parent.end();
//!
//! assert_eq!(exporter.finished_spans().unwrap().len(), 2);
//! ```
//!
//! [`Context`]: crate::Context

mod export;
mod id_generator;
pub mod in_memory_exporter;
mod sampler;
mod span;
mod span_context;
mod span_processor;
mod tracer;

pub use export::{ExportResult, SpanData, SpanExporter};
pub use id_generator::{IdGenerator, RandomIdGenerator, SequentialIdGenerator};
pub use in_memory_exporter::InMemorySpanExporter;
pub use sampler::{CloneShouldSample, Sampler, ShouldSample};
pub use span::{Event, Span, Status};
pub use span_context::SpanContext;
pub use span_processor::{
    BatchConfig, BatchConfigBuilder, BatchSpanProcessor, BatchSpanProcessorBuilder,
    SimpleSpanProcessor, SpanProcessor,
};
pub use tracer::{SpanBuilder, Tracer, TracerBuilder};
