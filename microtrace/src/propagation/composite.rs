use crate::propagation::{Extractor, FieldIter, Injector, TextMapPropagator};
use crate::Context;

/// Composite propagator that runs several propagators over one carrier.
///
/// A service boundary typically installs one of these combining
/// [`TraceContextPropagator`] and [`BaggagePropagator`], so a single
/// extract/inject call handles both trace identity and baggage.
///
/// [`TraceContextPropagator`]: crate::propagation::TraceContextPropagator
/// [`BaggagePropagator`]: crate::propagation::BaggagePropagator
#[derive(Debug)]
pub struct CompositePropagator {
    propagators: Vec<Box<dyn TextMapPropagator + Send + Sync>>,
    fields: Vec<String>,
}

impl CompositePropagator {
    /// Constructs a `CompositePropagator` from the given propagators,
    /// applied in order.
    pub fn new(propagators: Vec<Box<dyn TextMapPropagator + Send + Sync>>) -> Self {
        let mut fields: Vec<String> = propagators
            .iter()
            .flat_map(|p| p.fields())
            .map(String::from)
            .collect();
        fields.dedup();
        CompositePropagator {
            propagators,
            fields,
        }
    }
}

impl TextMapPropagator for CompositePropagator {
    fn inject_context(&self, cx: &Context, injector: &mut dyn Injector) {
        for propagator in &self.propagators {
            propagator.inject_context(cx, injector)
        }
    }

    fn extract_with_context(&self, cx: &Context, extractor: &dyn Extractor) -> Context {
        self.propagators
            .iter()
            .fold(cx.clone(), |current_cx, propagator| {
                propagator.extract_with_context(&current_cx, extractor)
            })
    }

    fn fields(&self) -> FieldIter<'_> {
        FieldIter::new(&self.fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::propagation::{BaggagePropagator, TraceContextPropagator};
    use crate::trace::SpanContext;
    use crate::{Baggage, SpanId, TraceFlags, TraceId};
    use std::collections::HashMap;

    fn composite() -> CompositePropagator {
        CompositePropagator::new(vec![
            Box::new(TraceContextPropagator::new()),
            Box::new(BaggagePropagator::new()),
        ])
    }

    #[test]
    fn extracts_both_headers() {
        let propagator = composite();
        let mut carrier = HashMap::new();
        carrier.insert(
            "traceparent".to_string(),
            "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01".to_string(),
        );
        carrier.insert("baggage".to_string(), "user_id=1".to_string());

        let cx = propagator.extract(&carrier);
        let sc = cx.span_context().expect("span context extracted");
        assert_eq!(
            sc.trace_id(),
            TraceId::from(0x4bf9_2f35_77b3_4da6_a3ce_929d_0e0e_4736u128)
        );
        assert!(sc.is_remote());
        assert_eq!(cx.baggage().get("user_id"), Some("1"));
    }

    #[test]
    fn injects_both_headers() {
        let propagator = composite();
        let mut baggage = Baggage::new();
        baggage.insert("user_id", "1");
        let cx = Context::new()
            .with_span_context(SpanContext::new(
                TraceId::from(1u128),
                SpanId::from(2u64),
                TraceFlags::SAMPLED,
                false,
            ))
            .with_baggage(baggage);

        let mut carrier = HashMap::new();
        propagator.inject_context(&cx, &mut carrier);
        assert_eq!(
            carrier.get("traceparent").map(String::as_str),
            Some("00-00000000000000000000000000000001-0000000000000002-01")
        );
        assert_eq!(carrier.get("baggage").map(String::as_str), Some("user_id=1"));
    }

    #[test]
    fn reports_all_fields() {
        let propagator = composite();
        let fields: Vec<&str> = propagator.fields().collect();
        assert_eq!(fields, vec!["traceparent", "baggage"]);
    }
}
