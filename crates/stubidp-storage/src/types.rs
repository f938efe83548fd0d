//! Row-level types exchanged between the adapter and a [`RowStore`](crate::RowStore).

use serde_json::{Map, Value};

/// The caller-opaque key-value map the OIDC engine stores for a model instance.
pub type Payload = Map<String, Value>;

/// A single column value, tagged with its storage type.
///
/// `None` is stored as SQL `NULL`.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Text(Option<String>),
    BigInt(Option<i64>),
    Json(Option<Value>),
}

impl SqlValue {
    /// Returns `true` for any `NULL` value.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(
            self,
            Self::Text(None) | Self::BigInt(None) | Self::Json(None)
        )
    }

    /// Borrows the text value, if this is non-null text.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(Some(s)) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer value, if this is a non-null integer.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::BigInt(v) => *v,
            _ => None,
        }
    }

    /// Takes the JSON value, if this is non-null JSON.
    #[must_use]
    pub fn into_json(self) -> Option<Value> {
        match self {
            Self::Json(v) => v,
            _ => None,
        }
    }
}

/// One table row as an ordered list of `(column, value)` pairs.
///
/// Records built by the adapter list every column of the table in
/// declaration order; records returned by a store do the same.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    values: Vec<(&'static str, SqlValue)>,
}

impl Record {
    /// Creates an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty record with room for `capacity` columns.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            values: Vec::with_capacity(capacity),
        }
    }

    /// Appends a column value.
    pub fn push(&mut self, column: &'static str, value: SqlValue) {
        self.values.push((column, value));
    }

    /// Builder-style [`push`](Self::push).
    #[must_use]
    pub fn with(mut self, column: &'static str, value: SqlValue) -> Self {
        self.push(column, value);
        self
    }

    /// Looks up a column value.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.values
            .iter()
            .find(|(name, _)| *name == column)
            .map(|(_, value)| value)
    }

    /// Removes a column value and returns it.
    pub fn take(&mut self, column: &str) -> Option<SqlValue> {
        let pos = self.values.iter().position(|(name, _)| *name == column)?;
        Some(self.values.remove(pos).1)
    }

    /// Replaces the value of an existing column, or appends it.
    pub fn set(&mut self, column: &'static str, value: SqlValue) {
        match self.values.iter_mut().find(|(name, _)| *name == column) {
            Some(slot) => slot.1 = value,
            None => self.values.push((column, value)),
        }
    }

    /// Borrows a non-null text column.
    #[must_use]
    pub fn text(&self, column: &str) -> Option<&str> {
        self.get(column).and_then(SqlValue::as_text)
    }

    /// Reads a non-null integer column.
    #[must_use]
    pub fn i64(&self, column: &str) -> Option<i64> {
        self.get(column).and_then(SqlValue::as_i64)
    }

    /// Iterates over `(column, value)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &SqlValue)> {
        self.values.iter().map(|(name, value)| (*name, value))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Equality predicate selecting rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter<'a> {
    /// `column = value` on a top-level text column.
    Column {
        column: &'static str,
        value: &'a str,
    },
    /// A string field nested in the `payload` JSON column equals `value`.
    PayloadField {
        field: &'static str,
        value: &'a str,
    },
}

impl<'a> Filter<'a> {
    /// Filter on a top-level column.
    #[must_use]
    pub fn column(column: &'static str, value: &'a str) -> Self {
        Self::Column { column, value }
    }

    /// Filter on a nested payload field.
    #[must_use]
    pub fn payload_field(field: &'static str, value: &'a str) -> Self {
        Self::PayloadField { field, value }
    }

    /// The value being compared against.
    #[must_use]
    pub fn value(&self) -> &'a str {
        match self {
            Self::Column { value, .. } | Self::PayloadField { value, .. } => value,
        }
    }

    /// Evaluates the filter against a record in memory.
    #[must_use]
    pub fn matches(&self, record: &Record) -> bool {
        match *self {
            Self::Column { column, value } => record.text(column) == Some(value),
            Self::PayloadField { field, value } => match record.get("payload") {
                Some(SqlValue::Json(Some(payload))) => {
                    payload.get(field).and_then(Value::as_str) == Some(value)
                }
                _ => false,
            },
        }
    }
}
