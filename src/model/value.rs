//! Scalar values and entries

use std::borrow::Cow;
use std::fmt;

/// A dynamically-typed scalar stored as a key or value
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    Str(String),
    Int(i64),
}

impl Value {
    /// Interpret text coming from the wire or a snapshot
    ///
    /// Text becomes an `Int` only when it is the canonical rendering of an
    /// `i64`, so `"42"` is an integer but `"042"` and `"+42"` stay strings.
    pub fn from_text(text: &str) -> Self {
        match text.parse::<i64>() {
            Ok(n) if n.to_string() == text => Value::Int(n),
            _ => Value::Str(text.to_string()),
        }
    }

    /// Textual form used for pattern matching and persistence
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            Value::Str(s) => Cow::Borrowed(s),
            Value::Int(n) => Cow::Owned(n.to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => f.write_str(s),
            Value::Int(n) => write!(f, "{}", n),
        }
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Value::from_text(text)
    }
}

impl From<String> for Value {
    fn from(text: String) -> Self {
        Value::from_text(&text)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

/// A single key/value pair inside a table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub key: Value,
    pub value: Value,
}

impl Entry {
    pub fn new(key: impl Into<Value>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}
