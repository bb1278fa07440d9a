use crate::trace::SpanContext;
use crate::TraceId;

/// The `ShouldSample` interface allows implementations to decide, at span
/// start, whether a span is recorded and exported.
///
/// The tracer is polymorphic over this capability: swapping the always-on
/// policy for a probabilistic or rate-based one never changes the
/// tracer's external contract. Whatever the decision, the span still
/// receives a valid [`SpanContext`], so trace identity keeps propagating
/// through unsampled sections of the tree.
pub trait ShouldSample: CloneShouldSample + Send + Sync + std::fmt::Debug {
    /// Returns `true` if a span with the given name, fresh `trace_id` and
    /// optional parent should be recorded and exported.
    fn should_sample(
        &self,
        parent_context: Option<&SpanContext>,
        trace_id: TraceId,
        name: &str,
    ) -> bool;
}

/// This trait should not be used directly; users should use
/// [`ShouldSample`].
pub trait CloneShouldSample {
    /// Clone this sampler into a new box.
    fn box_clone(&self) -> Box<dyn ShouldSample>;
}

impl<T> CloneShouldSample for T
where
    T: ShouldSample + Clone + 'static,
{
    fn box_clone(&self) -> Box<dyn ShouldSample> {
        Box::new(self.clone())
    }
}

impl Clone for Box<dyn ShouldSample> {
    fn clone(&self) -> Self {
        self.box_clone()
    }
}

/// Built-in sampling policies.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub enum Sampler {
    /// Always sample the trace. The default policy.
    AlwaysOn,
    /// Never sample the trace.
    AlwaysOff,
    /// Respects the parent span's sampling decision, delegating to the
    /// given sampler for root spans.
    ParentBased(Box<dyn ShouldSample>),
    /// Sample a given fraction of traces, deterministically on the trace
    /// id so every span of one trace gets the same decision. Fractions
    /// >= 1 always sample, fractions <= 0 never do.
    TraceIdRatioBased(f64),
}

impl ShouldSample for Sampler {
    fn should_sample(
        &self,
        parent_context: Option<&SpanContext>,
        trace_id: TraceId,
        name: &str,
    ) -> bool {
        match self {
            Sampler::AlwaysOn => true,
            Sampler::AlwaysOff => false,
            Sampler::ParentBased(delegate) => match parent_context.filter(|sc| sc.is_valid()) {
                Some(parent) => parent.is_sampled(),
                None => delegate.should_sample(parent_context, trace_id, name),
            },
            // The ratio is compared against the low 63 bits of the trace
            // id, matching the decision for every span in the trace.
            Sampler::TraceIdRatioBased(prob) => {
                if *prob >= 1.0 {
                    true
                } else if *prob <= 0.0 {
                    false
                } else {
                    let bytes = trace_id.to_bytes();
                    let low: [u8; 8] = bytes[8..16].try_into().expect("slice is 8 bytes");
                    let x = u64::from_be_bytes(low) >> 1;
                    x < (prob * (1u64 << 63) as f64) as u64
                }
            }
        }
    }
}
