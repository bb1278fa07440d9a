//! Explicitly passed request context.
//!
//! A [`Context`] carries the active [`SpanContext`] and any [`Baggage`]
//! extracted at the process boundary. It is an immutable value: every
//! derivation (`with_*`) returns a new context, and functions that start
//! child spans take the current context as input and hand a derived
//! context down the call chain. There is no thread-local or global
//! "current" context.

use crate::trace::{Span, SpanContext};

/// Arbitrary key/value context propagated alongside trace identity.
///
/// Baggage is independent of span attributes: it crosses process
/// boundaries with the request rather than being recorded on any one
/// span. Entries keep insertion order; inserting an existing key
/// overwrites its value in place.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Baggage {
    entries: Vec<(String, String)>,
}

impl Baggage {
    /// Creates an empty `Baggage`.
    pub fn new() -> Self {
        Baggage::default()
    }

    /// Returns a reference to the value associated with `key`, if any.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Inserts a key/value pair, overwriting any existing value for `key`.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let (key, value) = (key.into(), value.into());
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Iterate over entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// An execution context holding the active span identity and baggage.
#[derive(Clone, Debug, Default)]
pub struct Context {
    span_context: Option<SpanContext>,
    baggage: Baggage,
}

impl Context {
    /// Creates an empty context, as used at the start of a root request.
    pub fn new() -> Self {
        Context::default()
    }

    /// The active span context, if one has been set.
    pub fn span_context(&self) -> Option<&SpanContext> {
        self.span_context.as_ref()
    }

    /// Returns `true` if a valid span context is active.
    pub fn has_active_span(&self) -> bool {
        self.span_context.as_ref().is_some_and(|sc| sc.is_valid())
    }

    /// The baggage carried by this context.
    pub fn baggage(&self) -> &Baggage {
        &self.baggage
    }

    /// Returns a new context with the given span context active.
    pub fn with_span_context(&self, span_context: SpanContext) -> Self {
        Context {
            span_context: Some(span_context),
            baggage: self.baggage.clone(),
        }
    }

    /// Returns the derived context for children of `span`.
    ///
    /// This is the context to thread into any operation that may start a
    /// child span or inject outgoing headers while `span` is open.
    pub fn with_span(&self, span: &Span) -> Self {
        self.with_span_context(span.span_context().clone())
    }

    /// Returns a new context carrying the given baggage.
    pub fn with_baggage(&self, baggage: Baggage) -> Self {
        Context {
            span_context: self.span_context.clone(),
            baggage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{SpanId, TraceFlags, TraceId};

    #[test]
    fn baggage_insert_overwrites() {
        let mut baggage = Baggage::new();
        baggage.insert("user_id", "1");
        baggage.insert("region", "eu");
        baggage.insert("user_id", "2");

        assert_eq!(baggage.get("user_id"), Some("2"));
        assert_eq!(baggage.len(), 2);
        let keys: Vec<_> = baggage.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["user_id", "region"]);
    }

    #[test]
    fn context_derivation_preserves_baggage() {
        let mut baggage = Baggage::new();
        baggage.insert("user_id", "1");
        let cx = Context::new().with_baggage(baggage);
        assert!(!cx.has_active_span());

        let sc = SpanContext::new(
            TraceId::from(1u128),
            SpanId::from(2u64),
            TraceFlags::SAMPLED,
            false,
        );
        let derived = cx.with_span_context(sc.clone());

        assert!(derived.has_active_span());
        assert_eq!(derived.span_context(), Some(&sc));
        assert_eq!(derived.baggage().get("user_id"), Some("1"));
        // the original context is untouched
        assert!(!cx.has_active_span());
    }
}
