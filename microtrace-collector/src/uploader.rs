//! Span submission over HTTP.

use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use url::Url;

use microtrace::trace::ExportResult;
use microtrace::TraceError;

use crate::model::SpanRecord;

#[derive(Debug)]
pub(crate) struct Uploader {
    client: Client,
    collector_endpoint: Url,
}

impl Uploader {
    pub(crate) fn new(client: Client, collector_endpoint: Url) -> Self {
        Uploader {
            client,
            collector_endpoint,
        }
    }

    /// Submit one batch of spans as a JSON array.
    pub(crate) fn upload(&self, spans: Vec<SpanRecord>) -> ExportResult {
        let body = serde_json::to_vec(&spans)
            .map_err(|err| TraceError::InternalFailure(format!("failed to encode spans: {err}")))?;

        self.client
            .post(self.collector_endpoint.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .and_then(|response| response.error_for_status())
            .map_err(|err| TraceError::InternalFailure(format!("span upload failed: {err}")))?;
        Ok(())
    }
}
