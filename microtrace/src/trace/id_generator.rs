//! Id generation.

use std::cell::RefCell;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rand::{rngs, Rng, SeedableRng};

use crate::{SpanId, TraceId};

/// Interface for generating trace and span ids.
///
/// Implementations must be effectively collision-free for span ids within
/// one trace, and safe to call from many request flows concurrently.
pub trait IdGenerator: Send + Sync + fmt::Debug {
    /// Generate a new `TraceId`.
    fn new_trace_id(&self) -> TraceId;

    /// Generate a new `SpanId`.
    fn new_span_id(&self) -> SpanId;
}

/// Default [`IdGenerator`] implementation.
///
/// Generates ids from a per-thread random number generator, so no lock is
/// taken on the span-start hot path.
#[derive(Clone, Debug, Default)]
pub struct RandomIdGenerator {
    _private: (),
}

impl IdGenerator for RandomIdGenerator {
    fn new_trace_id(&self) -> TraceId {
        CURRENT_RNG.with(|rng| TraceId::from(rng.borrow_mut().gen::<u128>()))
    }

    fn new_span_id(&self) -> SpanId {
        CURRENT_RNG.with(|rng| SpanId::from(rng.borrow_mut().gen::<u64>()))
    }
}

thread_local! {
    /// Store random number generator for each thread
    static CURRENT_RNG: RefCell<rngs::SmallRng> = RefCell::new(rngs::SmallRng::from_entropy());
}

/// [`IdGenerator`] that increments a shared counter for each new id.
///
/// Produces predictable ids for tests.
#[derive(Clone, Debug)]
pub struct SequentialIdGenerator(Arc<AtomicU64>);

impl SequentialIdGenerator {
    /// Create a new `SequentialIdGenerator` starting at 1.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Default for SequentialIdGenerator {
    fn default() -> Self {
        Self(Arc::new(AtomicU64::new(1)))
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn new_trace_id(&self) -> TraceId {
        TraceId::from(self.0.fetch_add(1, Ordering::SeqCst) as u128)
    }

    fn new_span_id(&self) -> SpanId {
        SpanId::from(self.0.fetch_add(1, Ordering::SeqCst))
    }
}
