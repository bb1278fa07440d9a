//! Wire model for the collector's JSON span ingestion endpoint.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use microtrace::trace::{SpanData, Status};
use microtrace::Value;

/// One finished span, as submitted to the collector.
///
/// Ids are lowercase hex strings, timestamps are nanoseconds since the
/// Unix epoch, and the parent id is omitted for root spans.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SpanRecord {
    pub(crate) trace_id: String,
    pub(crate) span_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) parent_span_id: Option<String>,
    pub(crate) name: String,
    pub(crate) service_name: String,
    pub(crate) start_time_unix_nano: u64,
    pub(crate) end_time_unix_nano: u64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub(crate) attributes: Vec<AttributeRecord>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub(crate) events: Vec<EventRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) status: Option<StatusRecord>,
}

#[derive(Clone, Debug, Serialize)]
pub(crate) struct AttributeRecord {
    pub(crate) key: String,
    pub(crate) value: serde_json::Value,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct EventRecord {
    pub(crate) name: String,
    pub(crate) time_unix_nano: u64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub(crate) attributes: Vec<AttributeRecord>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StatusRecord {
    pub(crate) code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) message: Option<String>,
}

fn unix_nanos(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

fn attribute_value(value: &Value) -> serde_json::Value {
    match value {
        Value::Bool(b) => serde_json::Value::from(*b),
        Value::I64(i) => serde_json::Value::from(*i),
        Value::F64(f) => serde_json::Value::from(*f),
        Value::String(s) => serde_json::Value::from(s.as_ref()),
    }
}

pub(crate) fn into_record(span: SpanData, service_name: &str) -> SpanRecord {
    let status = match &span.status {
        Status::Unset => None,
        Status::Ok => Some(StatusRecord {
            code: "OK",
            message: None,
        }),
        Status::Error { description } => Some(StatusRecord {
            code: "ERROR",
            message: (!description.is_empty()).then(|| description.to_string()),
        }),
    };

    SpanRecord {
        trace_id: span.span_context.trace_id().to_string(),
        span_id: span.span_context.span_id().to_string(),
        parent_span_id: (span.parent_span_id != microtrace::SpanId::INVALID)
            .then(|| span.parent_span_id.to_string()),
        name: span.name.into_owned(),
        service_name: service_name.to_string(),
        start_time_unix_nano: unix_nanos(span.start_time),
        end_time_unix_nano: unix_nanos(span.end_time),
        attributes: span
            .attributes
            .iter()
            .map(|kv| AttributeRecord {
                key: kv.key.as_str().to_string(),
                value: attribute_value(&kv.value),
            })
            .collect(),
        events: span
            .events
            .into_iter()
            .map(|event| EventRecord {
                name: event.name.into_owned(),
                time_unix_nano: unix_nanos(event.timestamp),
                attributes: event
                    .attributes
                    .iter()
                    .map(|kv| AttributeRecord {
                        key: kv.key.as_str().to_string(),
                        value: attribute_value(&kv.value),
                    })
                    .collect(),
            })
            .collect(),
        status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use microtrace::trace::{Event, SpanContext};
    use microtrace::{KeyValue, SpanId, TraceFlags, TraceId};
    use std::time::Duration;

    fn sample_span() -> SpanData {
        let start = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        SpanData {
            span_context: SpanContext::new(
                TraceId::from(0x0af7651916cd43dd8448eb211c80319c_u128),
                SpanId::from(0x00f067aa0ba902b7_u64),
                TraceFlags::SAMPLED,
                false,
            ),
            parent_span_id: SpanId::from(0xb7ad6b7169203331_u64),
            name: "fortune".into(),
            start_time: start,
            end_time: start + Duration::from_millis(12),
            attributes: vec![
                KeyValue::new("http.method", "GET"),
                KeyValue::new("attempt", 2i64),
            ],
            events: vec![Event::new(
                "handling this...",
                start + Duration::from_millis(1),
                vec![],
            )],
            status: Status::Ok,
        }
    }

    #[test]
    fn record_serializes_ids_and_times() {
        let record = into_record(sample_span(), "fortune-service");
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["traceId"], "0af7651916cd43dd8448eb211c80319c");
        assert_eq!(json["spanId"], "00f067aa0ba902b7");
        assert_eq!(json["parentSpanId"], "b7ad6b7169203331");
        assert_eq!(json["serviceName"], "fortune-service");
        assert_eq!(json["startTimeUnixNano"], 1_700_000_000_000_000_000u64);
        assert_eq!(json["endTimeUnixNano"], 1_700_000_000_012_000_000u64);
        assert_eq!(json["status"]["code"], "OK");
        assert_eq!(json["attributes"][1]["value"], 2);
        assert_eq!(json["events"][0]["name"], "handling this...");
    }

    #[test]
    fn root_span_omits_parent_and_unset_status() {
        let mut span = sample_span();
        span.parent_span_id = SpanId::INVALID;
        span.status = Status::Unset;
        let json = serde_json::to_value(into_record(span, "svc")).unwrap();

        assert!(json.get("parentSpanId").is_none());
        assert!(json.get("status").is_none());
    }

    #[test]
    fn error_status_carries_description() {
        let mut span = sample_span();
        span.status = Status::error("collector unreachable");
        let json = serde_json::to_value(into_record(span, "svc")).unwrap();
        assert_eq!(json["status"]["code"], "ERROR");
        assert_eq!(json["status"]["message"], "collector unreachable");
    }
}
