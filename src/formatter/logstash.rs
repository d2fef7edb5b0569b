//! Logstash JSON event formatter.
//!
//! Produces one JSON object per record terminated by `\n`, the framing the
//! Logstash `json_lines` codec reads from stream inputs.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use super::{FormatError, FormatOptions, RecordFormatter, validate_time_format};
use crate::log_record::{FieldValue, LogRecord};

const VERSION: &str = "1";
const TIMESTAMP_KEY: &str = "@timestamp";
const VERSION_KEY: &str = "@version";

#[derive(Serialize)]
struct LogstashEvent<'a> {
    #[serde(rename = "@timestamp")]
    timestamp: String,
    #[serde(rename = "@version")]
    version: &'static str,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    app_name: Option<&'a str>,
    level: &'static str,
    message: &'a str,
    #[serde(flatten)]
    fields: BTreeMap<String, &'a FieldValue>,
}

/// Formatter emitting Logstash v1 JSON events.
#[derive(Copy, Clone, Debug, Default)]
pub struct LogstashFormatter;

impl RecordFormatter for LogstashFormatter {
    fn format(
        &self,
        record: &LogRecord,
        options: &FormatOptions<'_>,
    ) -> Result<Vec<u8>, FormatError> {
        let app_name = Some(options.app_name).filter(|name| !name.is_empty());
        let event = LogstashEvent {
            timestamp: format_timestamp(&record.timestamp, options.time_format)?,
            version: VERSION,
            app_name,
            level: record.level.as_str(),
            message: &record.message,
            fields: event_fields(record, options.exclude_prefix, app_name.is_some()),
        };
        let mut payload = serde_json::to_vec(&event)?;
        payload.push(b'\n');
        Ok(payload)
    }
}

fn format_timestamp(
    timestamp: &DateTime<Utc>,
    time_format: Option<&str>,
) -> Result<String, FormatError> {
    let Some(pattern) = time_format.filter(|p| !p.is_empty()) else {
        return Ok(timestamp.to_rfc3339_opts(SecondsFormat::Secs, true));
    };
    validate_time_format(pattern)?;
    let mut rendered = String::new();
    write!(rendered, "{}", timestamp.format(pattern))
        .map_err(|_| FormatError::TimeFormat(pattern.to_owned()))?;
    Ok(rendered)
}

/// Collect record fields with the exclusion prefix removed and reserved keys
/// moved out of the way of the envelope.
fn event_fields<'a>(
    record: &'a LogRecord,
    exclude_prefix: &str,
    has_type: bool,
) -> BTreeMap<String, &'a FieldValue> {
    let mut fields = BTreeMap::new();
    for (key, value) in &record.fields {
        let key = match key.strip_prefix(exclude_prefix) {
            Some(stripped) if !exclude_prefix.is_empty() => stripped,
            _ => key.as_str(),
        };
        let key = match key {
            TIMESTAMP_KEY | VERSION_KEY => continue,
            "message" | "level" => format!("fields.{key}"),
            "type" if has_type => format!("fields.{key}"),
            _ => key.to_owned(),
        };
        fields.insert(key, value);
    }
    fields
}
