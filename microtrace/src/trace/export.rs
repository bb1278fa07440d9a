//! Span export contract.

use std::borrow::Cow;
use std::fmt::Debug;
use std::time::SystemTime;

use futures_util::future::BoxFuture;

use crate::trace::{Event, SpanContext, Status};
use crate::{KeyValue, SpanId, TraceResult};

/// Describes the result of an export.
pub type ExportResult = TraceResult<()>;

/// `SpanExporter` defines the interface that protocol-specific exporters
/// must implement so that they can be plugged into the span processor and
/// support sending span data to a collector.
///
/// The exporter is expected to be primarily a simple encoder and
/// transmitter; batching, queuing and flush scheduling belong to the
/// processor in front of it.
pub trait SpanExporter: Send + Sync + Debug {
    /// Exports a batch of finished spans.
    ///
    /// This function is never called concurrently for the same exporter
    /// instance, and must not block indefinitely: there must be a
    /// reasonable upper limit after which the call times out with an
    /// error result. Any retry logic an exporter needs is its own
    /// responsibility.
    fn export(&mut self, batch: Vec<SpanData>) -> BoxFuture<'static, ExportResult>;

    /// Shuts down the exporter. Called once when the owning processor
    /// shuts down; subsequent `export` calls are not allowed afterwards.
    fn shutdown(&mut self) {}
}

/// A complete, self-describing record of one finished span.
///
/// Produced exactly once per span, when [`Span::end`] takes effect, and
/// handed to the span processor for batching and transmission.
///
/// [`Span::end`]: crate::trace::Span::end
#[derive(Clone, Debug, PartialEq)]
pub struct SpanData {
    /// The span's own identity.
    pub span_context: SpanContext,
    /// Id of the parent span, [`SpanId::INVALID`] for a root span.
    pub parent_span_id: SpanId,
    /// Human readable operation label.
    pub name: Cow<'static, str>,
    /// Wall-clock start time.
    pub start_time: SystemTime,
    /// Wall-clock end time.
    pub end_time: SystemTime,
    /// Attributes, at most one entry per key.
    pub attributes: Vec<KeyValue>,
    /// Timestamped events in insertion order.
    pub events: Vec<Event>,
    /// Terminal disposition.
    pub status: Status,
}
