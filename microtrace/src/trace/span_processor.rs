//! # Span Processor Interface
//!
//! Span processors decouple "span finished" from "span transmitted":
//! they receive every ended span, batch for network efficiency, and keep
//! transmission latency out of the request path.
//!
//! ```ascii
//!   +------------------+   +-----------------------+   +--------------------+
//!   |                  |   |                       |   |                    |
//!   | Tracer           |   | (Batch)SpanProcessor  |   |    SpanExporter    |
//!   |        Span::end +---> (Simple)SpanProcessor +--->  (collector sink)  |
//!   |                  |   |                       |   |                    |
//!   +------------------+   +-----------------------+   +--------------------+
//! ```

use std::cmp::min;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{sync_channel, RecvTimeoutError, SyncSender, TrySendError};
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use futures_executor::block_on;
use tracing::{debug, warn};

use crate::trace::{SpanData, SpanExporter};
use crate::{TraceError, TraceResult};

/// Default delay interval between two consecutive batch exports.
const DEFAULT_SCHEDULE_DELAY: Duration = Duration::from_secs(5);
/// Default maximum queue size.
const DEFAULT_MAX_QUEUE_SIZE: usize = 2_048;
/// Default maximum batch size.
const DEFAULT_MAX_EXPORT_BATCH_SIZE: usize = 512;
/// Default maximum allowed time to export data.
const DEFAULT_EXPORT_TIMEOUT: Duration = Duration::from_secs(30);

/// `SpanProcessor` receives every finished span from [`Span::end`].
///
/// [`Span::end`]: crate::trace::Span::end
pub trait SpanProcessor: Send + Sync + std::fmt::Debug {
    /// Called when a span ends, synchronously within the `Span::end`
    /// call. Implementations must not block the caller on network I/O;
    /// the ending operation's latency must not include export latency.
    fn on_end(&self, span: SpanData);

    /// Synchronously drains and transmits all queued spans, blocking the
    /// caller up to a bounded deadline.
    fn force_flush(&self) -> TraceResult<()>;

    /// Shuts down the processor after one final flush. Safe to call more
    /// than once; later calls report [`TraceError::AlreadyShutdown`].
    fn shutdown(&self) -> TraceResult<()>;
}

/// A [`SpanProcessor`] that passes finished spans to the exporter as soon
/// as they end, without batching. Useful for debugging and testing; for
/// production throughput use [`BatchSpanProcessor`].
#[derive(Debug)]
pub struct SimpleSpanProcessor {
    exporter: Mutex<Box<dyn SpanExporter>>,
}

impl SimpleSpanProcessor {
    /// Create a new [`SimpleSpanProcessor`] using the provided exporter.
    pub fn new(exporter: Box<dyn SpanExporter>) -> Self {
        Self {
            exporter: Mutex::new(exporter),
        }
    }
}

impl SpanProcessor for SimpleSpanProcessor {
    fn on_end(&self, span: SpanData) {
        if !span.span_context.is_sampled() {
            return;
        }

        let result = self
            .exporter
            .lock()
            .map_err(TraceError::from)
            .and_then(|mut exporter| block_on(exporter.export(vec![span])));

        if let Err(err) = result {
            debug!(error = %err, "simple span processor export failed");
        }
    }

    fn force_flush(&self) -> TraceResult<()> {
        // Nothing is queued between spans.
        Ok(())
    }

    fn shutdown(&self) -> TraceResult<()> {
        let mut exporter = self.exporter.lock()?;
        exporter.shutdown();
        Ok(())
    }
}

/// Messages exchanged between the caller and the background thread.
#[allow(clippy::large_enum_variant)]
#[derive(Debug)]
enum BatchMessage {
    ExportSpan(SpanData),
    ForceFlush(SyncSender<TraceResult<()>>),
    Shutdown(SyncSender<TraceResult<()>>),
}

/// A batch span processor with a dedicated background thread.
///
/// `on_end` is a non-blocking enqueue onto a bounded channel; when the
/// queue is full the span is dropped and counted rather than blocking
/// the request flow. The background thread accumulates spans and exports
/// a batch as soon as it reaches [`BatchConfig::max_export_batch_size`]
/// or the oldest unflushed span has waited
/// [`BatchConfig::scheduled_delay`], whichever comes first.
///
/// Failed exports are logged and the batch is dropped; tracing is best
/// effort and must never stall the instrumented service.
#[derive(Debug)]
pub struct BatchSpanProcessor {
    message_sender: SyncSender<BatchMessage>,
    handle: Mutex<Option<thread::JoinHandle<()>>>,
    flush_timeout: Duration,
    is_shutdown: AtomicBool,
    dropped_span_count: AtomicUsize,
}

impl BatchSpanProcessor {
    /// Creates a new `BatchSpanProcessor` exporting through `exporter`.
    pub fn new<E>(mut exporter: E, config: BatchConfig) -> Self
    where
        E: SpanExporter + 'static,
    {
        let (message_sender, message_receiver) = sync_channel(config.max_queue_size);
        let flush_timeout = config.export_timeout;

        let handle = thread::Builder::new()
            .name("microtrace-batch-span-processor".to_string())
            .spawn(move || {
                let mut batch = Vec::with_capacity(config.max_export_batch_size);
                let mut last_export = Instant::now();

                loop {
                    let timeout = config.scheduled_delay.saturating_sub(last_export.elapsed());
                    match message_receiver.recv_timeout(timeout) {
                        Ok(BatchMessage::ExportSpan(span)) => {
                            batch.push(span);
                            if batch.len() >= config.max_export_batch_size {
                                let _ = export_batch(&mut exporter, &mut batch);
                                last_export = Instant::now();
                            }
                        }
                        Ok(BatchMessage::ForceFlush(sender)) => {
                            let result = export_batch(&mut exporter, &mut batch);
                            let _ = sender.send(result);
                            last_export = Instant::now();
                        }
                        Ok(BatchMessage::Shutdown(sender)) => {
                            let result = export_batch(&mut exporter, &mut batch);
                            exporter.shutdown();
                            let _ = sender.send(result);
                            break;
                        }
                        Err(RecvTimeoutError::Timeout) => {
                            let _ = export_batch(&mut exporter, &mut batch);
                            last_export = Instant::now();
                        }
                        Err(RecvTimeoutError::Disconnected) => {
                            let _ = export_batch(&mut exporter, &mut batch);
                            exporter.shutdown();
                            break;
                        }
                    }
                }
            })
            .expect("failed to spawn batch span processor thread");

        Self {
            message_sender,
            handle: Mutex::new(Some(handle)),
            flush_timeout,
            is_shutdown: AtomicBool::new(false),
            dropped_span_count: AtomicUsize::new(0),
        }
    }

    /// Create a builder for a `BatchSpanProcessor`.
    pub fn builder<E>(exporter: E) -> BatchSpanProcessorBuilder<E>
    where
        E: SpanExporter + 'static,
    {
        BatchSpanProcessorBuilder {
            exporter,
            config: BatchConfig::default(),
        }
    }
}

fn export_batch(exporter: &mut dyn SpanExporter, batch: &mut Vec<SpanData>) -> TraceResult<()> {
    if batch.is_empty() {
        return Ok(());
    }
    let result = block_on(exporter.export(batch.split_off(0)));
    if let Err(err) = &result {
        warn!(error = %err, "dropping span batch after failed export");
    }
    result
}

impl SpanProcessor for BatchSpanProcessor {
    fn on_end(&self, span: SpanData) {
        if !span.span_context.is_sampled() {
            return;
        }
        if self.is_shutdown.load(Ordering::Relaxed) {
            debug!("batch span processor is shut down, dropping span");
            return;
        }

        if let Err(TrySendError::Full(_) | TrySendError::Disconnected(_)) = self
            .message_sender
            .try_send(BatchMessage::ExportSpan(span))
        {
            // Warn once when dropping starts; the total is reported at
            // shutdown.
            if self.dropped_span_count.fetch_add(1, Ordering::Relaxed) == 0 {
                warn!(
                    "batch span processor queue is full, dropping spans; \
                     the total dropped count is reported at shutdown"
                );
            }
        }
    }

    fn force_flush(&self) -> TraceResult<()> {
        if self.is_shutdown.load(Ordering::Relaxed) {
            return Err(TraceError::AlreadyShutdown);
        }
        let (sender, receiver) = sync_channel(1);
        self.message_sender
            .try_send(BatchMessage::ForceFlush(sender))
            .map_err(|err| TraceError::InternalFailure(format!("failed to request flush: {err}")))?;

        receiver
            .recv_timeout(self.flush_timeout)
            .map_err(|_| TraceError::Timeout(self.flush_timeout))?
    }

    fn shutdown(&self) -> TraceResult<()> {
        if self.is_shutdown.swap(true, Ordering::Relaxed) {
            return Err(TraceError::AlreadyShutdown);
        }
        let dropped = self.dropped_span_count.load(Ordering::Relaxed);
        if dropped > 0 {
            warn!(dropped_spans = dropped, "spans were dropped by the batch span processor");
        }

        let (sender, receiver) = sync_channel(1);
        self.message_sender
            .try_send(BatchMessage::Shutdown(sender))
            .map_err(|err| {
                TraceError::InternalFailure(format!("failed to request shutdown: {err}"))
            })?;

        let result = receiver
            .recv_timeout(self.flush_timeout)
            .map_err(|_| TraceError::Timeout(self.flush_timeout))?;
        if let Some(handle) = self.handle.lock()?.take() {
            handle
                .join()
                .map_err(|_| TraceError::InternalFailure("worker thread panicked".to_string()))?;
        }
        result
    }
}

/// Builder for [`BatchSpanProcessor`].
#[derive(Debug)]
pub struct BatchSpanProcessorBuilder<E>
where
    E: SpanExporter + 'static,
{
    exporter: E,
    config: BatchConfig,
}

impl<E> BatchSpanProcessorBuilder<E>
where
    E: SpanExporter + 'static,
{
    /// Set the [`BatchConfig`] for the processor.
    pub fn with_batch_config(self, config: BatchConfig) -> Self {
        BatchSpanProcessorBuilder { config, ..self }
    }

    /// Build a new `BatchSpanProcessor`.
    pub fn build(self) -> BatchSpanProcessor {
        BatchSpanProcessor::new(self.exporter, self.config)
    }
}

/// Batch span processor configuration.
///
/// Use [`BatchConfigBuilder`] to configure your own instance.
#[derive(Clone, Debug)]
pub struct BatchConfig {
    /// The maximum queue size of finished spans awaiting processing.
    /// Spans ending while the queue is full are dropped.
    pub(crate) max_queue_size: usize,

    /// The maximum time a finished span waits in the batch before the
    /// batch is exported.
    pub(crate) scheduled_delay: Duration,

    /// The maximum number of spans exported in a single batch; reaching
    /// it triggers an export immediately.
    pub(crate) max_export_batch_size: usize,

    /// The deadline for `force_flush` and `shutdown` to complete.
    pub(crate) export_timeout: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        BatchConfigBuilder::default().build()
    }
}

/// A builder for [`BatchConfig`].
#[derive(Debug)]
pub struct BatchConfigBuilder {
    max_queue_size: usize,
    scheduled_delay: Duration,
    max_export_batch_size: usize,
    export_timeout: Duration,
}

impl Default for BatchConfigBuilder {
    fn default() -> Self {
        BatchConfigBuilder {
            max_queue_size: DEFAULT_MAX_QUEUE_SIZE,
            scheduled_delay: DEFAULT_SCHEDULE_DELAY,
            max_export_batch_size: DEFAULT_MAX_EXPORT_BATCH_SIZE,
            export_timeout: DEFAULT_EXPORT_TIMEOUT,
        }
    }
}

impl BatchConfigBuilder {
    /// Set the maximum queue size; spans ending while the queue is full
    /// are dropped. The default is 2048.
    pub fn with_max_queue_size(mut self, max_queue_size: usize) -> Self {
        self.max_queue_size = max_queue_size;
        self
    }

    /// Set the maximum batch size; reaching it triggers an export without
    /// waiting for the delay. The default is 512.
    pub fn with_max_export_batch_size(mut self, max_export_batch_size: usize) -> Self {
        self.max_export_batch_size = max_export_batch_size;
        self
    }

    /// Set the delay after which a partial batch is exported anyway. The
    /// default is 5 seconds.
    pub fn with_scheduled_delay(mut self, scheduled_delay: Duration) -> Self {
        self.scheduled_delay = scheduled_delay;
        self
    }

    /// Set the deadline for flush and shutdown. The default is
    /// 30 seconds.
    pub fn with_export_timeout(mut self, export_timeout: Duration) -> Self {
        self.export_timeout = export_timeout;
        self
    }

    /// Builds a `BatchConfig`, clamping `max_export_batch_size` to
    /// `max_queue_size`.
    pub fn build(self) -> BatchConfig {
        BatchConfig {
            max_queue_size: self.max_queue_size,
            scheduled_delay: self.scheduled_delay,
            max_export_batch_size: min(self.max_export_batch_size, self.max_queue_size),
            export_timeout: self.export_timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::in_memory_exporter::InMemorySpanExporter;
    use crate::trace::{ExportResult, SpanContext, Status};
    use crate::{SpanId, TraceFlags, TraceId};
    use futures_util::future::BoxFuture;
    use futures_util::FutureExt;
    use std::sync::Arc;
    use std::time::SystemTime;

    fn create_test_span(name: &str) -> SpanData {
        let now = SystemTime::now();
        SpanData {
            span_context: SpanContext::new(
                TraceId::from(1u128),
                SpanId::from(1u64),
                TraceFlags::SAMPLED,
                false,
            ),
            parent_span_id: SpanId::INVALID,
            name: name.to_string().into(),
            start_time: now,
            end_time: now,
            attributes: Vec::new(),
            events: Vec::new(),
            status: Status::Unset,
        }
    }

    #[derive(Debug)]
    struct MockSpanExporter {
        exported_spans: Arc<Mutex<Vec<SpanData>>>,
    }

    impl MockSpanExporter {
        fn new() -> Self {
            Self {
                exported_spans: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    impl SpanExporter for MockSpanExporter {
        fn export(&mut self, batch: Vec<SpanData>) -> BoxFuture<'static, ExportResult> {
            let exported_spans = self.exported_spans.clone();
            async move {
                exported_spans.lock().unwrap().extend(batch);
                Ok(())
            }
            .boxed()
        }
    }

    #[derive(Debug)]
    struct FailingExporter;

    impl SpanExporter for FailingExporter {
        fn export(&mut self, _batch: Vec<SpanData>) -> BoxFuture<'static, ExportResult> {
            Box::pin(std::future::ready(Err(TraceError::InternalFailure(
                "collector unreachable".to_string(),
            ))))
        }
    }

    #[test]
    fn simple_processor_exports_on_end() {
        let exporter = InMemorySpanExporter::default();
        let processor = SimpleSpanProcessor::new(Box::new(exporter.clone()));
        let span = create_test_span("simple");
        processor.on_end(span.clone());
        assert_eq!(exporter.finished_spans().unwrap(), vec![span]);
        processor.shutdown().unwrap();
    }

    #[test]
    fn simple_processor_skips_unsampled() {
        let exporter = InMemorySpanExporter::default();
        let processor = SimpleSpanProcessor::new(Box::new(exporter.clone()));
        let mut span = create_test_span("unsampled");
        span.span_context = SpanContext::new(
            span.span_context.trace_id(),
            span.span_context.span_id(),
            TraceFlags::NOT_SAMPLED,
            false,
        );
        processor.on_end(span);
        assert!(exporter.finished_spans().unwrap().is_empty());
    }

    #[test]
    fn batch_size_triggers_export_before_delay() {
        let exporter = MockSpanExporter::new();
        let exported = exporter.exported_spans.clone();
        let config = BatchConfigBuilder::default()
            .with_max_export_batch_size(3)
            .with_scheduled_delay(Duration::from_secs(3600))
            .build();
        let processor = BatchSpanProcessor::new(exporter, config);

        for i in 0..3 {
            processor.on_end(create_test_span(&format!("span-{i}")));
        }

        // The batch filled, so the export happens well before the
        // one-hour delay.
        let deadline = Instant::now() + Duration::from_secs(5);
        while exported.lock().unwrap().len() < 3 {
            assert!(Instant::now() < deadline, "batch was not exported");
            thread::sleep(Duration::from_millis(10));
        }
        processor.shutdown().unwrap();
    }

    #[test]
    fn force_flush_drains_queue() {
        let exporter = MockSpanExporter::new();
        let exported = exporter.exported_spans.clone();
        let processor = BatchSpanProcessor::new(exporter, BatchConfig::default());

        processor.on_end(create_test_span("flushed"));
        processor.force_flush().unwrap();

        let spans = exported.lock().unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].name, "flushed");
    }

    #[test]
    fn shutdown_flushes_and_is_terminal() {
        let exporter = MockSpanExporter::new();
        let exported = exporter.exported_spans.clone();
        let processor = BatchSpanProcessor::new(exporter, BatchConfig::default());

        processor.on_end(create_test_span("late"));
        processor.shutdown().unwrap();
        assert_eq!(exported.lock().unwrap().len(), 1);

        assert_eq!(processor.shutdown(), Err(TraceError::AlreadyShutdown));
        assert_eq!(processor.force_flush(), Err(TraceError::AlreadyShutdown));

        // Spans ending after shutdown are silently dropped.
        processor.on_end(create_test_span("after"));
        assert_eq!(exported.lock().unwrap().len(), 1);
    }

    #[test]
    fn failed_export_surfaces_from_flush() {
        let processor = BatchSpanProcessor::new(FailingExporter, BatchConfig::default());
        processor.on_end(create_test_span("doomed"));

        let started = Instant::now();
        let result = processor.force_flush();
        assert!(result.is_err());
        assert!(started.elapsed() < DEFAULT_EXPORT_TIMEOUT);

        // A failed batch is dropped, not retried: the next flush has
        // nothing queued and succeeds.
        assert_eq!(processor.force_flush(), Ok(()));
    }

    #[test]
    fn full_queue_drops_without_blocking() {
        let exporter = MockSpanExporter::new();
        let config = BatchConfigBuilder::default()
            .with_max_queue_size(2)
            .with_max_export_batch_size(2)
            .with_scheduled_delay(Duration::from_secs(3600))
            .build();
        let processor = BatchSpanProcessor::new(exporter, config);

        let started = Instant::now();
        for i in 0..64 {
            processor.on_end(create_test_span(&format!("burst-{i}")));
        }
        // 64 enqueues against a 2-slot queue return promptly.
        assert!(started.elapsed() < Duration::from_secs(1));
        // give the worker a moment to drain the queue before shutdown
        thread::sleep(Duration::from_millis(100));
        processor.shutdown().unwrap();
    }

    #[test]
    fn batch_config_clamps_batch_size_to_queue_size() {
        let config = BatchConfigBuilder::default()
            .with_max_queue_size(256)
            .with_max_export_batch_size(1024)
            .build();
        assert_eq!(config.max_queue_size, 256);
        assert_eq!(config.max_export_batch_size, 256);
    }

    #[test]
    fn batch_config_defaults() {
        let config = BatchConfig::default();
        assert_eq!(config.max_queue_size, 2048);
        assert_eq!(config.max_export_batch_size, 512);
        assert_eq!(config.scheduled_delay, Duration::from_secs(5));
        assert_eq!(config.export_timeout, Duration::from_secs(30));
    }
}
