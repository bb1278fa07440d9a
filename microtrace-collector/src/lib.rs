//! A [`SpanExporter`] that ships finished spans to a trace collector as
//! JSON over HTTP.
//!
//! The exporter is a plain encoder and transmitter: batching, queuing and
//! flush scheduling belong to the span processor in front of it. Each
//! `export` call turns the batch into an array of span records and POSTs
//! it to the collector endpoint in one request.
//!
//! ```no_run
//! use microtrace::trace::{BatchSpanProcessor, Tracer};
//! use microtrace_collector::CollectorExporter;
//!
//! # fn main() -> Result<(), microtrace_collector::Error> {
//! let exporter = CollectorExporter::builder()
//!     .with_service_name("fortune-service")
//!     .with_endpoint("http://localhost:14268/api/traces")
//!     .build()?;
//!
//! let tracer = Tracer::builder()
//!     .with_span_processor(BatchSpanProcessor::builder(exporter).build())
//!     .build();
//! # Ok(())
//! # }
//! ```
//!
//! The HTTP client uses `reqwest`'s blocking mode and is driven from the
//! batch processor's dedicated thread. Construct the exporter before
//! entering an async runtime.
//!
//! [`SpanExporter`]: microtrace::trace::SpanExporter

#![warn(missing_debug_implementations, missing_docs, unreachable_pub)]

mod model;
mod uploader;

use std::time::Duration;

use futures_util::future::BoxFuture;
use thiserror::Error;
use url::Url;

use microtrace::trace::{ExportResult, SpanData, SpanExporter};

/// Default collector span ingestion endpoint.
const DEFAULT_COLLECTOR_ENDPOINT: &str = "http://127.0.0.1:14268/api/traces";

/// Default service name if none is configured.
const DEFAULT_SERVICE_NAME: &str = "unknown-service";

/// Default per-request timeout.
const DEFAULT_UPLOAD_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors raised while configuring the exporter.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The configured endpoint is not a valid URL.
    #[error("invalid collector endpoint: {0}")]
    InvalidEndpoint(#[from] url::ParseError),

    /// The underlying HTTP client could not be constructed.
    #[error("failed to build http client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Span exporter submitting to a trace collector over HTTP.
#[derive(Debug)]
pub struct CollectorExporter {
    service_name: String,
    uploader: uploader::Uploader,
}

impl CollectorExporter {
    /// Create a builder with the default endpoint and timeouts.
    pub fn builder() -> CollectorExporterBuilder {
        CollectorExporterBuilder::default()
    }
}

impl SpanExporter for CollectorExporter {
    fn export(&mut self, batch: Vec<SpanData>) -> BoxFuture<'static, ExportResult> {
        let records = batch
            .into_iter()
            .map(|span| model::into_record(span, &self.service_name))
            .collect();
        let result = self.uploader.upload(records);
        Box::pin(std::future::ready(result))
    }
}

/// Configuration for a [`CollectorExporter`].
#[derive(Debug)]
pub struct CollectorExporterBuilder {
    service_name: String,
    endpoint: String,
    timeout: Duration,
}

impl Default for CollectorExporterBuilder {
    fn default() -> Self {
        CollectorExporterBuilder {
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            endpoint: DEFAULT_COLLECTOR_ENDPOINT.to_string(),
            timeout: DEFAULT_UPLOAD_TIMEOUT,
        }
    }
}

impl CollectorExporterBuilder {
    /// Assign the service name recorded on every submitted span.
    pub fn with_service_name(mut self, service_name: impl Into<String>) -> Self {
        self.service_name = service_name.into();
        self
    }

    /// Assign the collector span ingestion URL.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Assign the per-request upload timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Validate the configuration and build the exporter.
    pub fn build(self) -> Result<CollectorExporter, Error> {
        let endpoint = Url::parse(&self.endpoint)?;
        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()?;
        Ok(CollectorExporter {
            service_name: self.service_name,
            uploader: uploader::Uploader::new(client, endpoint),
        })
    }
}
