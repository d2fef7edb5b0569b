//! Record formatters and the field helpers shared by the sender loop.
//!
//! Provides the [`RecordFormatter`] trait that turns a [`LogRecord`] into the
//! bytes written to the collector, a cheaply clonable [`SharedFormatter`]
//! wrapper, and the Logstash JSON implementation used by default.

use std::{fmt, sync::Arc};

use chrono::format::{Item, StrftimeItems};
use thiserror::Error;

use crate::log_record::{Fields, LogRecord};

mod logstash;

pub use logstash::LogstashFormatter;

/// Errors raised while turning a record into bytes.
#[derive(Debug, Error)]
pub enum FormatError {
    /// A field could not be represented in the output encoding.
    #[error("unable to serialise record: {0}")]
    Serialization(#[from] serde_json::Error),
    /// The configured timestamp format is not a valid strftime pattern.
    #[error("invalid timestamp format {0:?}")]
    TimeFormat(String),
}

/// Per-send settings handed to a formatter.
#[derive(Clone, Copy, Debug, Default)]
pub struct FormatOptions<'a> {
    /// Application name emitted under `type`; empty omits the key.
    pub app_name: &'a str,
    /// Prefix stripped from field keys before emission; empty disables it.
    pub exclude_prefix: &'a str,
    /// strftime pattern for `@timestamp`; `None` selects RFC 3339.
    pub time_format: Option<&'a str>,
}

/// Trait for serialising a log record into a self-contained payload.
///
/// Implementors must be thread-safe (`Send + Sync`) because the formatter is
/// shared between the hook and its sender thread.
pub trait RecordFormatter: Send + Sync {
    /// Serialise `record` into the bytes written to the transport.
    fn format(&self, record: &LogRecord, options: &FormatOptions<'_>)
    -> Result<Vec<u8>, FormatError>;
}

/// Shared formatter trait object used by the sender loop.
#[derive(Clone)]
pub struct SharedFormatter {
    inner: Arc<dyn RecordFormatter>,
}

impl SharedFormatter {
    /// Create a shared formatter from an owned formatter implementation.
    pub fn new<F>(formatter: F) -> Self
    where
        F: RecordFormatter + 'static,
    {
        Self {
            inner: Arc::new(formatter),
        }
    }

    /// Wrap an existing shared formatter trait object.
    pub fn from_arc(inner: Arc<dyn RecordFormatter>) -> Self {
        Self { inner }
    }

    /// Format a record using the wrapped formatter.
    pub fn format(
        &self,
        record: &LogRecord,
        options: &FormatOptions<'_>,
    ) -> Result<Vec<u8>, FormatError> {
        self.inner.format(record, options)
    }
}

impl Default for SharedFormatter {
    fn default() -> Self {
        Self::new(LogstashFormatter)
    }
}

impl fmt::Debug for SharedFormatter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedFormatter(<dyn RecordFormatter>)")
    }
}

/// Merge `static_fields` into the record without overwriting its own fields.
pub fn merge_static_fields(record: &mut LogRecord, static_fields: &Fields) {
    for (key, value) in static_fields {
        if !record.fields.contains_key(key) {
            record.fields.insert(key.clone(), value.clone());
        }
    }
}

/// Remove every field whose key starts with `prefix`.
///
/// An empty prefix leaves the fields untouched.
pub fn strip_prefixed_fields(fields: &mut Fields, prefix: &str) {
    if prefix.is_empty() {
        return;
    }
    fields.retain(|key, _| !key.starts_with(prefix));
}

/// Check that `format` is a strftime pattern chrono can render.
pub fn validate_time_format(format: &str) -> Result<(), FormatError> {
    if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        return Err(FormatError::TimeFormat(format.to_owned()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{level::Level, log_record::FieldValue};
    use rstest::rstest;
    use static_assertions::assert_impl_all;

    #[rstest]
    fn shared_formatter_is_send_sync() {
        assert_impl_all!(SharedFormatter: Send, Sync);
    }

    #[rstest]
    fn merge_keeps_record_values() {
        let mut record = LogRecord::new(Level::Info, "hi").with_field("override", "yes");
        let statics = Fields::from([
            ("override".to_owned(), FieldValue::from("no")),
            ("service".to_owned(), FieldValue::from("api")),
        ]);

        merge_static_fields(&mut record, &statics);

        assert_eq!(record.fields["override"], FieldValue::from("yes"));
        assert_eq!(record.fields["service"], FieldValue::from("api"));
    }

    #[rstest]
    fn strip_removes_only_prefixed_keys() {
        let mut fields = Fields::from([
            ("->secret".to_owned(), FieldValue::from(1)),
            ("visible".to_owned(), FieldValue::from(2)),
        ]);
        strip_prefixed_fields(&mut fields, "->");
        assert_eq!(fields.keys().collect::<Vec<_>>(), ["visible"]);
    }

    #[rstest]
    fn empty_prefix_strips_nothing() {
        let mut fields = Fields::from([("->secret".to_owned(), FieldValue::from(1))]);
        strip_prefixed_fields(&mut fields, "");
        assert_eq!(fields.len(), 1);
    }

    #[rstest]
    #[case("%-I:%M%p", true)]
    #[case("%Y-%m-%dT%H:%M:%S%.3fZ", true)]
    #[case("%Q", false)]
    fn validates_time_formats(#[case] format: &str, #[case] valid: bool) {
        assert_eq!(validate_time_format(format).is_ok(), valid);
    }
}
