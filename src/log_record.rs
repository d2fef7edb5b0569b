//! Log record representation shipped by the hook.
//!
//! A [`LogRecord`] carries a severity, a message, a timestamp, and an ordered
//! map of structured fields. Field values are restricted to what the JSON
//! wire format can carry; [`FieldValue`] refuses to serialise anything JSON
//! cannot represent so the formatter can report it rather than emit garbage.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::ser::{Error as _, Serialize, Serializer};

use crate::level::Level;

/// Structured fields attached to a record, keyed by name.
pub type Fields = BTreeMap<String, FieldValue>;

/// A single structured field value.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    Null,
    Bool(bool),
    I64(i64),
    U64(u64),
    F64(f64),
    Str(String),
    Json(serde_json::Value),
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldValue::Null => serializer.serialize_unit(),
            FieldValue::Bool(v) => serializer.serialize_bool(*v),
            FieldValue::I64(v) => serializer.serialize_i64(*v),
            FieldValue::U64(v) => serializer.serialize_u64(*v),
            FieldValue::F64(v) if !v.is_finite() => Err(S::Error::custom(format!(
                "non-finite float {v} cannot be encoded"
            ))),
            FieldValue::F64(v) => serializer.serialize_f64(*v),
            FieldValue::Str(v) => serializer.serialize_str(v),
            FieldValue::Json(v) => v.serialize(serializer),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => f.write_str("null"),
            FieldValue::Bool(v) => write!(f, "{v}"),
            FieldValue::I64(v) => write!(f, "{v}"),
            FieldValue::U64(v) => write!(f, "{v}"),
            FieldValue::F64(v) => write!(f, "{v}"),
            FieldValue::Str(v) => f.write_str(v),
            FieldValue::Json(v) => write!(f, "{v}"),
        }
    }
}

macro_rules! field_value_from {
    ($variant:ident, $target:ty, $($source:ty),+) => {
        $(
            impl From<$source> for FieldValue {
                fn from(value: $source) -> Self {
                    FieldValue::$variant(<$target>::from(value))
                }
            }
        )+
    };
}

field_value_from!(I64, i64, i8, i16, i32, i64);
field_value_from!(U64, u64, u8, u16, u32, u64);
field_value_from!(F64, f64, f32, f64);
field_value_from!(Bool, bool, bool);
field_value_from!(Str, String, String, &str);
field_value_from!(Json, serde_json::Value, serde_json::Value);

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(FieldValue::Null, Into::into)
    }
}

/// One structured log entry.
#[derive(Clone, Debug, PartialEq)]
pub struct LogRecord {
    /// Severity of the entry.
    pub level: Level,
    /// Free-form message text.
    pub message: String,
    /// Structured fields, flattened into the output object.
    pub fields: Fields,
    /// Time the entry was created.
    pub timestamp: DateTime<Utc>,
}

impl LogRecord {
    /// Construct a record stamped with the current time.
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            fields: Fields::new(),
            timestamp: Utc::now(),
        }
    }

    /// Attach a field, replacing any previous value under `key`.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Attach several fields at once.
    pub fn with_fields<K, V>(mut self, fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<FieldValue>,
    {
        self.fields
            .extend(fields.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Record an error under the `error` key using its display text.
    pub fn with_error(self, err: &dyn std::error::Error) -> Self {
        self.with_field("error", err.to_string())
    }

    /// Override the creation timestamp.
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.level, self.message)
    }
}
