//! Stored Value Shapes
//!
//! Every entry holds one [`Value`]. The set of shapes is closed: text, a
//! sequence of integers, a text-to-integer mapping, or opaque bytes that the
//! store passes through untouched.
//!
//! The store never looks inside a value except to answer a narrowing lookup
//! ([`Value::project`]), which reads one integer out of a sequence or a
//! mapping and reports a typed error when the shape is wrong.

use bytes::Bytes;
use std::collections::BTreeMap;
use std::fmt;

use crate::storage::engine::StoreError;

/// The payload of a stored entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Plain text.
    Text(String),

    /// An ordered sequence of integers.
    Ints(Vec<i64>),

    /// A mapping from text to integer. Ordered so the textual form is stable.
    Map(BTreeMap<String, i64>),

    /// Opaque bytes, never interpreted.
    Raw(Bytes),
}

/// Names the shape of a [`Value`] without its contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shape {
    Text,
    Ints,
    Map,
    Raw,
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Shape::Text => "text",
            Shape::Ints => "sequence<i64>",
            Shape::Map => "map<string, i64>",
            Shape::Raw => "bytes",
        };
        f.write_str(name)
    }
}

/// Addresses a single integer inside a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// Position in an [`Value::Ints`] sequence.
    Index(usize),
    /// Key in a [`Value::Map`] mapping.
    Key(String),
}

impl Selector {
    /// The shape a value must have for this selector to apply.
    pub fn expected_shape(&self) -> Shape {
        match self {
            Selector::Index(_) => Shape::Ints,
            Selector::Key(_) => Shape::Map,
        }
    }
}

impl From<usize> for Selector {
    fn from(index: usize) -> Self {
        Selector::Index(index)
    }
}

impl From<&str> for Selector {
    fn from(key: &str) -> Self {
        Selector::Key(key.to_string())
    }
}

impl From<String> for Selector {
    fn from(key: String) -> Self {
        Selector::Key(key)
    }
}

impl Value {
    /// Creates a text value.
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    /// Creates a raw byte value.
    pub fn raw(data: impl Into<Bytes>) -> Self {
        Value::Raw(data.into())
    }

    /// Returns the shape of this value.
    pub fn shape(&self) -> Shape {
        match self {
            Value::Text(_) => Shape::Text,
            Value::Ints(_) => Shape::Ints,
            Value::Map(_) => Shape::Map,
            Value::Raw(_) => Shape::Raw,
        }
    }

    /// Views this value through `selector`.
    ///
    /// # Errors
    ///
    /// - [`StoreError::ConversionError`] if the value is not the shape the
    ///   selector addresses
    /// - [`StoreError::IndexOutOfRange`] if an index is past the end of the sequence
    /// - [`StoreError::MissingField`] if a key is absent from the mapping
    pub fn project(&self, selector: &Selector) -> Result<i64, StoreError> {
        match (self, selector) {
            (Value::Ints(items), Selector::Index(index)) => {
                items
                    .get(*index)
                    .copied()
                    .ok_or(StoreError::IndexOutOfRange {
                        index: *index,
                        len: items.len(),
                    })
            }
            (Value::Map(fields), Selector::Key(key)) => fields
                .get(key)
                .copied()
                .ok_or_else(|| StoreError::MissingField(key.clone())),
            (other, selector) => Err(StoreError::ConversionError {
                expected: selector.expected_shape(),
                found: other.shape(),
            }),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => f.write_str(s),
            Value::Ints(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Value::Map(fields) => {
                f.write_str("map[")?;
                for (i, (key, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{}:{}", key, value)?;
                }
                f.write_str("]")
            }
            Value::Raw(data) => f.write_str(&String::from_utf8_lossy(data)),
        }
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<Vec<i64>> for Value {
    fn from(items: Vec<i64>) -> Self {
        Value::Ints(items)
    }
}

impl From<BTreeMap<String, i64>> for Value {
    fn from(fields: BTreeMap<String, i64>) -> Self {
        Value::Map(fields)
    }
}

impl From<Bytes> for Value {
    fn from(data: Bytes) -> Self {
        Value::Raw(data)
    }
}
