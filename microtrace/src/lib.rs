//! A minimal distributed tracing toolkit.
//!
//! `microtrace` provides just enough instrumentation to follow a request
//! across process boundaries: span creation with parent/child linkage,
//! W3C-style header propagation with baggage, pluggable sampling, and a
//! batching export pipeline that never blocks the instrumented service.
//!
//! ## Getting started
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
//! let mut span = tracer.start("lookup", &Context::new());
//! span.set_attribute(KeyValue::new("db.table", "users"));
//! span.end();
//!
//! tracer.shutdown().unwrap();
//! ```
//!
//! ## Crate layout
//!
//! * [`trace`] — tracer, spans, samplers and the export pipeline;
//! * [`propagation`] — header-based context extraction and injection;
//! * the crate root — shared value types ([`Context`], [`Baggage`],
//!   [`KeyValue`], ids) and [`TraceError`].

#![warn(missing_debug_implementations, missing_docs, unreachable_pub)]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

mod common;
mod context;
mod error;
mod ids;

pub mod propagation;
pub mod trace;

pub use common::{Key, KeyValue, Value};
pub use context::{Baggage, Context};
pub use error::{TraceError, TraceResult};
pub use ids::{SpanId, TraceFlags, TraceId};
