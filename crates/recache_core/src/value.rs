//! Attribute values.

use crate::key::escape;
use crate::types::RecordId;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

const NULL_TOKEN: &str = "%00";
const TRUE_TOKEN: &str = "%true";
const FALSE_TOKEN: &str = "%false";

/// The value of a single record attribute.
///
/// Only the shapes an equality predicate can carry are supported.
/// Floats are intentionally absent: they have no stable textual form
/// to key on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Value {
    /// SQL `NULL`.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Signed integer.
    Integer(i64),
    /// Text string.
    Text(String),
}

impl Value {
    /// Renders the value the way it appears inside a cache key.
    ///
    /// Text is escaped (`%` to `%25`, `/` to `%2F`). Integers and their
    /// textual forms render identically, so a value read from
    /// `"id = '5'"` keys the same as `Integer(5)`. `NULL` and booleans
    /// render as `%`-tokens that escaped text never produces.
    #[must_use]
    pub fn key_form(&self) -> Cow<'_, str> {
        match self {
            Value::Null => Cow::Borrowed(NULL_TOKEN),
            Value::Bool(true) => Cow::Borrowed(TRUE_TOKEN),
            Value::Bool(false) => Cow::Borrowed(FALSE_TOKEN),
            Value::Integer(n) => Cow::Owned(n.to_string()),
            Value::Text(s) => escape(s),
        }
    }

    /// Coerces the value to a record identifier.
    ///
    /// Integers convert directly; text converts when it is a base-10
    /// integer (surrounding whitespace ignored). Anything else is `None`.
    #[must_use]
    pub fn to_record_id(&self) -> Option<RecordId> {
        match self {
            Value::Integer(n) => Some(RecordId(*n)),
            Value::Text(s) => s.trim().parse::<i64>().ok().map(RecordId),
            Value::Null | Value::Bool(_) => None,
        }
    }

    /// Check if this value is null.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Get this value as an integer, if it is one.
    #[must_use]
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Get this value as text, if it is text.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Integer(n) => write!(f, "{n}"),
            Value::Text(s) => write!(f, "'{s}'"),
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Integer(i64::from(n))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<RecordId> for Value {
    fn from(id: RecordId) -> Self {
        Value::Integer(id.as_i64())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}
