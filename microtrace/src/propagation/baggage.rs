use std::iter;
use std::sync::OnceLock;

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use tracing::warn;

use crate::propagation::{Extractor, FieldIter, Injector, TextMapPropagator};
use crate::Context;

static BAGGAGE_HEADER: &str = "baggage";
const FRAGMENT: &AsciiSet = &CONTROLS.add(b' ').add(b'"').add(b';').add(b',').add(b'=');

static BAGGAGE_FIELDS: OnceLock<[String; 1]> = OnceLock::new();

#[inline]
fn baggage_fields() -> &'static [String; 1] {
    BAGGAGE_FIELDS.get_or_init(|| [BAGGAGE_HEADER.to_owned()])
}

/// Propagates [`Baggage`](crate::Baggage) name/value pairs in
/// [W3C Baggage] format.
///
/// The header value is a comma-separated list of percent-encoded
/// `key=value` entries:
///
/// `baggage: user_id=1,server_node=DF%2028`
///
/// Malformed entries are skipped with a warning rather than failing the
/// extraction; baggage is auxiliary context and must never break request
/// handling.
///
/// [W3C Baggage]: https://w3c.github.io/baggage
#[derive(Clone, Debug, Default)]
pub struct BaggagePropagator {
    _private: (),
}

impl BaggagePropagator {
    /// Construct a new baggage propagator.
    pub fn new() -> Self {
        BaggagePropagator { _private: () }
    }
}

impl TextMapPropagator for BaggagePropagator {
    fn inject_context(&self, cx: &Context, injector: &mut dyn Injector) {
        let baggage = cx.baggage();
        if !baggage.is_empty() {
            let header_value = baggage
                .iter()
                .map(|(name, value)| {
                    utf8_percent_encode(name.trim(), FRAGMENT)
                        .chain(iter::once("="))
                        .chain(utf8_percent_encode(value.trim(), FRAGMENT))
                        .collect::<String>()
                })
                .collect::<Vec<String>>()
                .join(",");
            injector.set(BAGGAGE_HEADER, header_value);
        }
    }

    fn extract_with_context(&self, cx: &Context, extractor: &dyn Extractor) -> Context {
        let Some(header_value) = extractor.get(BAGGAGE_HEADER) else {
            return cx.clone();
        };

        let mut baggage = cx.baggage().clone();
        for entry in header_value.split(',') {
            // Trailing `;properties` metadata is tolerated and discarded.
            let entry = entry.split(';').next().unwrap_or("");
            let Some((name, value)) = entry.split_once('=') else {
                warn!(entry, "skipping baggage entry without key-value format");
                continue;
            };
            let decoded_name = percent_decode_str(name.trim()).decode_utf8();
            let decoded_value = percent_decode_str(value.trim()).decode_utf8();
            match (decoded_name, decoded_value) {
                (Ok(name), Ok(value)) if !name.is_empty() => {
                    baggage.insert(name.into_owned(), value.into_owned());
                }
                (Ok(_), Ok(_)) => {
                    warn!(entry, "skipping baggage entry with empty key");
                }
                _ => {
                    warn!(entry, "skipping baggage entry with invalid UTF-8");
                }
            }
        }
        cx.with_baggage(baggage)
    }

    fn fields(&self) -> FieldIter<'_> {
        FieldIter::new(baggage_fields())
    }
}
