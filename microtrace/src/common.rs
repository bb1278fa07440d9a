use std::borrow::Cow;
use std::fmt;

/// Key used for span attributes and events.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key(Cow<'static, str>);

impl Key {
    /// Create a new `Key`.
    pub fn new(value: impl Into<Cow<'static, str>>) -> Self {
        Key(value.into())
    }

    /// Create a new const `Key` from a static string.
    pub const fn from_static_str(value: &'static str) -> Self {
        Key(Cow::Borrowed(value))
    }

    /// Returns a reference to the underlying key name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&'static str> for Key {
    fn from(key: &'static str) -> Self {
        Key(Cow::Borrowed(key))
    }
}

impl From<String> for Key {
    fn from(key: String) -> Self {
        Key(Cow::Owned(key))
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Typed scalar value of a span attribute.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// bool value
    Bool(bool),
    /// i64 value
    I64(i64),
    /// f64 value
    F64(f64),
    /// String value
    String(Cow<'static, str>),
}

impl Value {
    /// Returns the value as a string.
    pub fn as_str(&self) -> Cow<'_, str> {
        match self {
            Value::Bool(v) => v.to_string().into(),
            Value::I64(v) => v.to_string().into(),
            Value::F64(v) => v.to_string().into(),
            Value::String(v) => Cow::Borrowed(v.as_ref()),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::I64(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::F64(value)
    }
}

impl From<&'static str> for Value {
    fn from(value: &'static str) -> Self {
        Value::String(Cow::Borrowed(value))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(Cow::Owned(value))
    }
}

impl From<Cow<'static, str>> for Value {
    fn from(value: Cow<'static, str>) -> Self {
        Value::String(value)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => fmt::Display::fmt(v, f),
            Value::I64(v) => fmt::Display::fmt(v, f),
            Value::F64(v) => fmt::Display::fmt(v, f),
            Value::String(v) => fmt::Display::fmt(v, f),
        }
    }
}

/// A key-value pair describing an aspect of a span or event.
#[derive(Clone, Debug, PartialEq)]
pub struct KeyValue {
    /// The attribute name
    pub key: Key,
    /// The attribute value
    pub value: Value,
}

impl KeyValue {
    /// Create a new `KeyValue` pair.
    pub fn new<K, V>(key: K, value: V) -> Self
    where
        K: Into<Key>,
        V: Into<Value>,
    {
        KeyValue {
            key: key.into(),
            value: value.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_value_conversions() {
        assert_eq!(KeyValue::new("enabled", true).value, Value::Bool(true));
        assert_eq!(KeyValue::new("count", 7i64).value, Value::I64(7));
        assert_eq!(KeyValue::new("ratio", 0.5).value, Value::F64(0.5));
        assert_eq!(
            KeyValue::new("name", "fortune").value,
            Value::String("fortune".into())
        );
    }

    #[test]
    fn value_display() {
        assert_eq!(Value::I64(42).to_string(), "42");
        assert_eq!(Value::Bool(false).to_string(), "false");
        assert_eq!(Value::String("hi".into()).to_string(), "hi");
    }
}
