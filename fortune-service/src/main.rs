//! A fortune-telling HTTP service, instrumented end to end.
//!
//! `GET /fortune` draws an omikuji and answers with the verdict. Each
//! request becomes a trace: identity is extracted from the incoming
//! `traceparent`/`baggage` headers when present, the handler runs under a
//! `fortune` span, and the draw itself is a child span. Finished spans
//! are batched and shipped to a collector in the background.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use http::HeaderMap;
use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use microtrace::propagation::{
    BaggagePropagator, CompositePropagator, Extractor, TextMapPropagator, TraceContextPropagator,
};
use microtrace::trace::{BatchConfigBuilder, BatchSpanProcessor, Sampler, Status, Tracer};
use microtrace::KeyValue;
use microtrace_collector::CollectorExporter;

mod config;
mod fortune;

use config::Config;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Reads propagation fields out of incoming request headers.
struct HeaderExtractor<'a>(&'a HeaderMap);

impl Extractor for HeaderExtractor<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|value| value.to_str().ok())
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(|name| name.as_str()).collect()
    }
}

struct AppState {
    tracer: Tracer,
    propagator: CompositePropagator,
}

async fn handle(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    match (req.method(), req.uri().path()) {
        (&Method::GET, "/fortune") => Ok(fortune_handler(req, state).await),
        _ => {
            let mut response = Response::new(Full::new(Bytes::from_static(b"not found")));
            *response.status_mut() = StatusCode::NOT_FOUND;
            Ok(response)
        }
    }
}

async fn fortune_handler(req: Request<Incoming>, state: Arc<AppState>) -> Response<Full<Bytes>> {
    let cx = state
        .propagator
        .extract(&HeaderExtractor(req.headers()));

    let mut span = state
        .tracer
        .span_builder("fortune")
        .with_attributes(vec![
            KeyValue::new("http.method", req.method().as_str().to_string()),
            KeyValue::new("http.target", req.uri().path().to_string()),
        ])
        .start(&state.tracer, &cx);
    span.add_event("handling this...", vec![]);

    let cx = cx.with_span(&span);
    let fortune = fortune::draw(&state.tracer, &cx).await;

    span.set_attribute(KeyValue::new("fortune.verdict", fortune.label()));
    span.set_status(Status::Ok);
    span.end();

    Response::new(Full::new(Bytes::from(format!(
        "運勢は{}です",
        fortune.label()
    ))))
}

async fn serve(addr: SocketAddr, state: Arc<AppState>) -> Result<(), BoxError> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "listening");

    loop {
        let (stream, remote) = tokio::select! {
            accepted = listener.accept() => accepted?,
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
                return Ok(());
            }
        };

        let state = state.clone();
        tokio::spawn(async move {
            let service = service_fn(move |req| handle(req, state.clone()));
            if let Err(err) = http1::Builder::new()
                .serve_connection(TokioIo::new(stream), service)
                .await
            {
                warn!(%remote, error = %err, "connection error");
            }
        });
    }
}

fn main() -> Result<(), BoxError> {
    tracing_subscriber::fmt::init();

    let config = Config::from_args(std::env::args().skip(1))?;

    // The exporter's blocking HTTP client must be created outside the
    // async runtime.
    let exporter = CollectorExporter::builder()
        .with_service_name(config.service_name.clone())
        .with_endpoint(config.collector_endpoint.clone())
        .build()?;

    let sampler = match config.sample_ratio {
        Some(ratio) => Sampler::ParentBased(Box::new(Sampler::TraceIdRatioBased(ratio))),
        None => Sampler::AlwaysOn,
    };
    let batch_config = BatchConfigBuilder::default()
        .with_max_export_batch_size(config.batch_max_size)
        .with_scheduled_delay(config.batch_max_delay)
        .with_export_timeout(config.flush_timeout)
        .build();
    let tracer = Tracer::builder()
        .with_sampler(sampler)
        .with_span_processor(
            BatchSpanProcessor::builder(exporter)
                .with_batch_config(batch_config)
                .build(),
        )
        .build();

    let state = Arc::new(AppState {
        tracer: tracer.clone(),
        propagator: CompositePropagator::new(vec![
            Box::new(TraceContextPropagator::new()),
            Box::new(BaggagePropagator::new()),
        ]),
    });

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let served = runtime.block_on(serve(config.listen_addr, state));
    drop(runtime);

    if let Err(err) = tracer.shutdown() {
        error!(error = %err, "tracer shutdown failed");
    }
    served
}
