//! Context propagation across process boundaries.
//!
//! Propagators encode the active [`SpanContext`] and [`Baggage`] into a
//! fixed set of string header fields on outgoing requests, and decode the
//! inverse from incoming requests. Extraction fails softly: missing or
//! malformed headers yield a context without an active span, since the
//! absence of incoming trace identity is the normal case for a root
//! request.
//!
//! [`SpanContext`]: crate::trace::SpanContext
//! [`Baggage`]: crate::Baggage

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::BuildHasher;
use std::slice;

use crate::Context;

mod baggage;
mod composite;
mod trace_context;

pub use baggage::BaggagePropagator;
pub use composite::CompositePropagator;
pub use trace_context::TraceContextPropagator;

/// Injector provides an interface for adding fields to an outbound carrier,
/// typically an HTTP header map.
pub trait Injector {
    /// Add a key and value to the carrier.
    fn set(&mut self, key: &str, value: String);
}

/// Extractor provides an interface for reading fields from an inbound
/// carrier, typically an HTTP header map.
pub trait Extractor {
    /// Get a value for a key from the carrier.
    fn get(&self, key: &str) -> Option<&str>;

    /// Collect all the keys in the carrier.
    fn keys(&self) -> Vec<&str>;
}

impl<S: BuildHasher> Injector for HashMap<String, String, S> {
    /// Set a key and value in the `HashMap`.
    fn set(&mut self, key: &str, value: String) {
        self.insert(key.to_lowercase(), value);
    }
}

impl<S: BuildHasher> Extractor for HashMap<String, String, S> {
    /// Get a value for a key from the `HashMap`.
    fn get(&self, key: &str) -> Option<&str> {
        self.get(&key.to_lowercase()).map(|v| v.as_str())
    }

    /// Collect all the keys from the `HashMap`.
    fn keys(&self) -> Vec<&str> {
        self.keys().map(|k| k.as_str()).collect()
    }
}

/// Methods to inject and extract a value as text into carriers that travel
/// in-band across process boundaries.
pub trait TextMapPropagator: Debug {
    /// Properly encodes the values of the [`Context`] and injects them into
    /// the carrier behind the [`Injector`].
    fn inject_context(&self, cx: &Context, injector: &mut dyn Injector);

    /// Retrieves encoded data using the provided [`Extractor`], merging it
    /// into an empty [`Context`].
    fn extract(&self, extractor: &dyn Extractor) -> Context {
        self.extract_with_context(&Context::new(), extractor)
    }

    /// Retrieves encoded data using the provided [`Extractor`], merging it
    /// into the given [`Context`].
    fn extract_with_context(&self, cx: &Context, extractor: &dyn Extractor) -> Context;

    /// Returns the header names this propagator reads and writes.
    fn fields(&self) -> FieldIter<'_>;
}

/// An iterator over the propagator's header field names.
#[derive(Debug)]
pub struct FieldIter<'a>(slice::Iter<'a, String>);

impl<'a> FieldIter<'a> {
    /// Create a new `FieldIter` from the given slice of header names.
    pub fn new(fields: &'a [String]) -> Self {
        FieldIter(fields.iter())
    }
}

impl<'a> Iterator for FieldIter<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next().map(|field| field.as_str())
    }
}
