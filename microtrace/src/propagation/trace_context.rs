//! # W3C Trace Context Propagator

use std::sync::OnceLock;

use crate::propagation::{Extractor, FieldIter, Injector, TextMapPropagator};
use crate::trace::SpanContext;
use crate::{Context, SpanId, TraceFlags, TraceId};

const SUPPORTED_VERSION: u8 = 0;
const MAX_VERSION: u8 = 254;
const TRACEPARENT_HEADER: &str = "traceparent";

static TRACE_CONTEXT_HEADER_FIELDS: OnceLock<[String; 1]> = OnceLock::new();

fn trace_context_header_fields() -> &'static [String; 1] {
    TRACE_CONTEXT_HEADER_FIELDS.get_or_init(|| [TRACEPARENT_HEADER.to_owned()])
}

/// Propagates span identity in [W3C TraceContext] format under the
/// `traceparent` header.
///
/// The header has four dash-separated fields:
///
/// `traceparent: 00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01`
///
///    - version
///    - trace-id
///    - parent-id
///    - trace-flags
///
/// Extraction returns the input context unchanged when the header is
/// missing or malformed, so an undecorated request simply starts a new
/// root trace. Injection is the deterministic inverse: for any valid
/// header, extract-then-inject reproduces it bit for bit.
///
/// [W3C TraceContext]: https://www.w3.org/TR/trace-context/
#[derive(Clone, Debug, Default)]
pub struct TraceContextPropagator {
    _private: (),
}

impl TraceContextPropagator {
    /// Create a new `TraceContextPropagator`.
    pub fn new() -> Self {
        TraceContextPropagator { _private: () }
    }

    /// Extract a span context from the w3c trace-context header.
    fn extract_span_context(&self, extractor: &dyn Extractor) -> Result<SpanContext, ()> {
        let header_value = extractor.get(TRACEPARENT_HEADER).unwrap_or("").trim();
        let parts = header_value.split_terminator('-').collect::<Vec<&str>>();
        if parts.len() < 4 {
            return Err(());
        }

        // For version 0 there must be exactly 4 parts.
        if parts[0].len() != 2 {
            return Err(());
        }
        let version = u8::from_str_radix(parts[0], 16).map_err(|_| ())?;
        if version > MAX_VERSION || version == 0 && parts.len() != 4 {
            return Err(());
        }

        // Id fields must be lowercase fixed-width hex.
        if parts[1].len() != 32 || parts[1].chars().any(|c| c.is_ascii_uppercase()) {
            return Err(());
        }
        let trace_id = TraceId::from_hex(parts[1]).map_err(|_| ())?;

        if parts[2].len() != 16 || parts[2].chars().any(|c| c.is_ascii_uppercase()) {
            return Err(());
        }
        let span_id = SpanId::from_hex(parts[2]).map_err(|_| ())?;

        if parts[3].len() != 2 {
            return Err(());
        }
        let opts = u8::from_str_radix(parts[3], 16).map_err(|_| ())?;
        if version == 0 && opts > 2 {
            return Err(());
        }

        // Clear all flags other than the supported sampling bit.
        let trace_flags = TraceFlags::new(opts) & TraceFlags::SAMPLED;

        let span_context = SpanContext::new(trace_id, span_id, trace_flags, true);
        if !span_context.is_valid() {
            return Err(());
        }

        Ok(span_context)
    }
}

impl TextMapPropagator for TraceContextPropagator {
    fn inject_context(&self, cx: &Context, injector: &mut dyn Injector) {
        if let Some(span_context) = cx.span_context().filter(|sc| sc.is_valid()) {
            let header_value = format!(
                "{:02x}-{}-{}-{:02x}",
                SUPPORTED_VERSION,
                span_context.trace_id(),
                span_context.span_id(),
                span_context.trace_flags() & TraceFlags::SAMPLED
            );
            injector.set(TRACEPARENT_HEADER, header_value);
        }
    }

    fn extract_with_context(&self, cx: &Context, extractor: &dyn Extractor) -> Context {
        self.extract_span_context(extractor)
            .map(|sc| cx.with_span_context(sc))
            .unwrap_or_else(|_| cx.clone())
    }

    fn fields(&self) -> FieldIter<'_> {
        FieldIter::new(trace_context_header_fields())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[rustfmt::skip]
    fn extract_data() -> Vec<(&'static str, SpanContext)> {
        vec![
            ("00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-00", SpanContext::new(TraceId::from(0x4bf9_2f35_77b3_4da6_a3ce_929d_0e0e_4736u128), SpanId::from(0x00f0_67aa_0ba9_02b7u64), TraceFlags::default(), true)),
            ("00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01", SpanContext::new(TraceId::from(0x4bf9_2f35_77b3_4da6_a3ce_929d_0e0e_4736u128), SpanId::from(0x00f0_67aa_0ba9_02b7u64), TraceFlags::SAMPLED, true)),
            ("02-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01", SpanContext::new(TraceId::from(0x4bf9_2f35_77b3_4da6_a3ce_929d_0e0e_4736u128), SpanId::from(0x00f0_67aa_0ba9_02b7u64), TraceFlags::SAMPLED, true)),
            ("02-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-09", SpanContext::new(TraceId::from(0x4bf9_2f35_77b3_4da6_a3ce_929d_0e0e_4736u128), SpanId::from(0x00f0_67aa_0ba9_02b7u64), TraceFlags::SAMPLED, true)),
            ("02-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-08", SpanContext::new(TraceId::from(0x4bf9_2f35_77b3_4da6_a3ce_929d_0e0e_4736u128), SpanId::from(0x00f0_67aa_0ba9_02b7u64), TraceFlags::default(), true)),
            ("02-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-09-XYZxsf09", SpanContext::new(TraceId::from(0x4bf9_2f35_77b3_4da6_a3ce_929d_0e0e_4736u128), SpanId::from(0x00f0_67aa_0ba9_02b7u64), TraceFlags::SAMPLED, true)),
            ("00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01-", SpanContext::new(TraceId::from(0x4bf9_2f35_77b3_4da6_a3ce_929d_0e0e_4736u128), SpanId::from(0x00f0_67aa_0ba9_02b7u64), TraceFlags::SAMPLED, true)),
        ]
    }

    #[rustfmt::skip]
    fn extract_data_invalid() -> Vec<(&'static str, &'static str)> {
        vec![
            ("0000-00000000000000000000000000000000-0000000000000000-01", "wrong version length"),
            ("00-ab00000000000000000000000000000000-cd00000000000000-01", "wrong trace ID length"),
            ("00-ab000000000000000000000000000000-cd0000000000000000-01", "wrong span ID length"),
            ("00-ab000000000000000000000000000000-cd00000000000000-0100", "wrong trace flag length"),
            ("qw-00000000000000000000000000000000-0000000000000000-01",   "bogus version"),
            ("00-qw000000000000000000000000000000-cd00000000000000-01",   "bogus trace ID"),
            ("00-ab000000000000000000000000000000-qw00000000000000-01",   "bogus span ID"),
            ("00-ab000000000000000000000000000000-cd00000000000000-qw",   "bogus trace flag"),
            ("A0-00000000000000000000000000000000-0000000000000000-01",   "upper case version"),
            ("00-AB000000000000000000000000000000-cd00000000000000-01",   "upper case trace ID"),
            ("00-ab000000000000000000000000000000-CD00000000000000-01",   "upper case span ID"),
            ("00-ab000000000000000000000000000000-cd00000000000000-A1",   "upper case trace flag"),
            ("00-00000000000000000000000000000000-0000000000000000-01",   "zero trace ID and span ID"),
            ("00-ab000000000000000000000000000000-cd00000000000000-09",   "trace-flag unused bits set"),
            ("00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7",      "missing options"),
            ("00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-",     "empty options"),
            ("",                                                          "empty header"),
            ("00--00",                                                    "missing trace ID"),
        ]
    }

    #[test]
    fn extract_w3c() {
        let propagator = TraceContextPropagator::new();

        for (trace_parent, expected_context) in extract_data() {
            let mut extractor = HashMap::new();
            extractor.insert(TRACEPARENT_HEADER.to_string(), trace_parent.to_string());

            assert_eq!(
                propagator.extract(&extractor).span_context(),
                Some(&expected_context),
                "{trace_parent}"
            )
        }
    }

    #[test]
    fn extract_w3c_reject_invalid() {
        let propagator = TraceContextPropagator::new();

        for (invalid_header, reason) in extract_data_invalid() {
            let mut extractor = HashMap::new();
            extractor.insert(TRACEPARENT_HEADER.to_string(), invalid_header.to_string());

            assert_eq!(
                propagator.extract(&extractor).span_context(),
                None,
                "{reason}"
            )
        }
    }

    #[test]
    fn inject_w3c() {
        let propagator = TraceContextPropagator::new();

        let sampled = SpanContext::new(
            TraceId::from(0x4bf9_2f35_77b3_4da6_a3ce_929d_0e0e_4736u128),
            SpanId::from(0x00f0_67aa_0ba9_02b7u64),
            TraceFlags::SAMPLED,
            true,
        );
        let mut injector = HashMap::new();
        propagator.inject_context(&Context::new().with_span_context(sampled), &mut injector);
        assert_eq!(
            Extractor::get(&injector, TRACEPARENT_HEADER),
            Some("00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01")
        );

        // Nothing is written for an absent or invalid span context.
        let mut empty = HashMap::new();
        propagator.inject_context(&Context::new(), &mut empty);
        propagator.inject_context(
            &Context::new().with_span_context(SpanContext::NONE),
            &mut empty,
        );
        assert!(empty.is_empty());
    }

    #[test]
    fn extract_then_inject_round_trips() {
        let propagator = TraceContextPropagator::new();

        for header in [
            "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-00",
            "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01",
            "00-0000000000000000000000000000002a-000000000000002a-01",
        ] {
            let mut extractor = HashMap::new();
            extractor.insert(TRACEPARENT_HEADER.to_string(), header.to_string());
            let cx = propagator.extract(&extractor);

            let mut injector = HashMap::new();
            propagator.inject_context(&cx, &mut injector);
            assert_eq!(Extractor::get(&injector, TRACEPARENT_HEADER), Some(header));
        }
    }
}
