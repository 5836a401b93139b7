// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime, UtcOffset};
use tracing::debug;

use crate::{FieldSchema, FieldType};

/// Shown wherever a field has no value.
pub const PLACEHOLDER: &str = "—";

/// A record's dynamic data: field name to wire value.
pub type DataMap = serde_json::Map<String, Value>;

/// Value in the shape an edit or filter control works with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditValue {
    Text(String),
    Flag(bool),
    Range { from: String, to: String },
    Inert,
}

/// Filter-only datetime bounds, each an ISO-8601 timestamp or empty.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DateRange {
    pub from: String,
    pub to: String,
}

impl DateRange {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }

    pub fn is_unbounded(&self) -> bool {
        self.from.trim().is_empty() && self.to.trim().is_empty()
    }
}

/// Type-directed conversion between stored values and their edit and
/// display forms. Local times use a fixed offset chosen at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Codec {
    offset: UtcOffset,
}

impl Default for Codec {
    fn default() -> Self {
        Self::UTC
    }
}

impl Codec {
    pub const UTC: Self = Self {
        offset: UtcOffset::UTC,
    };

    pub const fn new(offset: UtcOffset) -> Self {
        Self { offset }
    }

    /// Uses the process's local offset, or UTC when it cannot be determined.
    pub fn local() -> Self {
        match UtcOffset::current_local_offset() {
            Ok(offset) => Self::new(offset),
            Err(error) => {
                debug!(%error, "local offset unavailable; using UTC");
                Self::UTC
            }
        }
    }

    pub const fn offset(&self) -> UtcOffset {
        self.offset
    }

    pub fn to_editable(&self, value: Option<&Value>, field: &FieldSchema) -> EditValue {
        match field.field_type() {
            FieldType::String | FieldType::Text | FieldType::Select | FieldType::Number => {
                EditValue::Text(plain_text(value))
            }
            FieldType::Boolean => EditValue::Flag(is_truthy(value)),
            FieldType::Datetime => EditValue::Text(self.timestamp_to_input(value)),
            FieldType::Json => EditValue::Text(match value {
                None | Some(Value::Null) => String::new(),
                Some(Value::String(raw)) => raw.clone(),
                Some(structured) => pretty_json(structured),
            }),
            FieldType::Static | FieldType::Group => EditValue::Inert,
        }
    }

    pub fn from_editable(&self, edit: EditValue, field: &FieldSchema) -> Value {
        match (field.field_type(), edit) {
            (FieldType::Static | FieldType::Group, _) => Value::Null,
            (FieldType::Boolean, EditValue::Flag(flag)) => Value::Bool(flag),
            (FieldType::Boolean, EditValue::Text(raw)) => Value::Bool(parse_flag(&raw)),
            (FieldType::Number, EditValue::Text(raw)) => {
                parse_number(&raw).map_or_else(empty_text, Value::Number)
            }
            (FieldType::Datetime, EditValue::Text(raw)) => {
                Value::String(self.input_to_timestamp(&raw))
            }
            (
                FieldType::String | FieldType::Text | FieldType::Select | FieldType::Json,
                EditValue::Text(raw),
            ) => Value::String(raw),
            (field_type, edit) => {
                debug!(
                    field = %field.name,
                    field_type = field_type.as_str(),
                    ?edit,
                    "edit value does not fit field type; storing empty value"
                );
                empty_value(field).unwrap_or(Value::Null)
            }
        }
    }

    pub fn format(&self, value: Option<&Value>, field: &FieldSchema) -> String {
        let Some(value) = value.filter(|value| !value.is_null()) else {
            return PLACEHOLDER.to_owned();
        };

        match field.field_type() {
            FieldType::Datetime => match value {
                Value::String(raw) if raw.trim().is_empty() => PLACEHOLDER.to_owned(),
                Value::String(raw) => parse_timestamp(raw)
                    .map(|stamp| self.format_date_time(stamp))
                    .unwrap_or_else(|| raw.clone()),
                other => plain_text(Some(other)),
            },
            FieldType::Boolean => yes_no(is_truthy(Some(value))).to_owned(),
            FieldType::Json => match value {
                Value::String(raw) => serde_json::from_str::<Value>(raw)
                    .map(|parsed| pretty_json(&parsed))
                    .unwrap_or_else(|_| raw.clone()),
                structured => pretty_json(structured),
            },
            _ => plain_text(Some(value)),
        }
    }

    /// Converts the filter range's stored bounds to local input strings.
    pub fn range_to_editable(&self, range: &DateRange) -> EditValue {
        EditValue::Range {
            from: self.text_to_input(&range.from),
            to: self.text_to_input(&range.to),
        }
    }

    pub fn range_from_editable(&self, from: &str, to: &str) -> DateRange {
        DateRange {
            from: self.input_to_timestamp(from),
            to: self.input_to_timestamp(to),
        }
    }

    /// Locale-style date and time, e.g. `2/1/2024, 10:00:00 AM`.
    pub fn format_date_time(&self, stamp: OffsetDateTime) -> String {
        stamp
            .to_offset(self.offset)
            .format(format_description!(
                "[month padding:none]/[day padding:none]/[year], [hour repr:12 padding:none]:[minute]:[second] [period]"
            ))
            .unwrap_or_else(|_| format_timestamp(stamp))
    }

    /// Locale-style date, e.g. `2/1/2024`.
    pub fn format_date(&self, stamp: OffsetDateTime) -> String {
        stamp
            .to_offset(self.offset)
            .format(format_description!(
                "[month padding:none]/[day padding:none]/[year]"
            ))
            .unwrap_or_else(|_| format_timestamp(stamp))
    }

    fn timestamp_to_input(&self, value: Option<&Value>) -> String {
        match value {
            Some(Value::String(raw)) => self.text_to_input(raw),
            _ => String::new(),
        }
    }

    fn text_to_input(&self, raw: &str) -> String {
        if raw.trim().is_empty() {
            return String::new();
        }
        let Some(stamp) = parse_timestamp(raw) else {
            debug!(value = raw, "unparseable timestamp; edit control starts empty");
            return String::new();
        };
        stamp
            .to_offset(self.offset)
            .format(format_description!("[year]-[month]-[day]T[hour]:[minute]"))
            .unwrap_or_default()
    }

    fn input_to_timestamp(&self, raw: &str) -> String {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return String::new();
        }
        let parsed = PrimitiveDateTime::parse(
            trimmed,
            format_description!("[year]-[month]-[day]T[hour]:[minute]"),
        )
        .or_else(|_| {
            PrimitiveDateTime::parse(
                trimmed,
                format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
            )
        });
        match parsed {
            Ok(local) => format_timestamp(local.assume_offset(self.offset)),
            Err(error) => {
                debug!(value = trimmed, %error, "unparseable local date-time input");
                String::new()
            }
        }
    }
}

/// Parses an ISO-8601 / RFC 3339 timestamp.
pub fn parse_timestamp(raw: &str) -> Option<OffsetDateTime> {
    OffsetDateTime::parse(raw.trim(), &Rfc3339).ok()
}

/// Canonical stored form: UTC, second precision, `Z` suffix.
pub fn format_timestamp(stamp: OffsetDateTime) -> String {
    stamp
        .to_offset(UtcOffset::UTC)
        .format(format_description!(
            "[year]-[month]-[day]T[hour]:[minute]:[second]Z"
        ))
        .unwrap_or_default()
}

/// Type-appropriate empty value for a value-holding field.
pub fn empty_value(field: &FieldSchema) -> Option<Value> {
    match field.field_type() {
        FieldType::Boolean => Some(Value::Bool(false)),
        FieldType::Static | FieldType::Group => None,
        _ => Some(empty_text()),
    }
}

/// Missing, null, false, zero and blank strings count as empty.
pub fn is_empty_value(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) | Some(Value::Bool(false)) => true,
        Some(Value::Number(number)) => number.as_f64() == Some(0.0),
        Some(Value::String(text)) => text.trim().is_empty(),
        Some(_) => false,
    }
}

pub fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(flag)) => *flag,
        Some(Value::Number(number)) => number.as_f64().is_some_and(|n| n != 0.0),
        Some(Value::String(text)) => !text.is_empty(),
        Some(Value::Array(_) | Value::Object(_)) => true,
    }
}

/// The value's plain string form; missing and null become empty.
pub fn plain_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}

pub fn parse_number(raw: &str) -> Option<Number> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(value) = trimmed.parse::<i64>() {
        return Some(Number::from(value));
    }
    if let Ok(value) = trimmed.parse::<u64>() {
        return Some(Number::from(value));
    }
    trimmed.parse::<f64>().ok().and_then(Number::from_f64)
}

pub const fn yes_no(flag: bool) -> &'static str {
    if flag { "Yes" } else { "No" }
}

fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "on" | "yes"
    )
}

fn empty_text() -> Value {
    Value::String(String::new())
}

fn pretty_json(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
