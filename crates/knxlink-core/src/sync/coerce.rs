// ── Value coercion between the store and the bus ──
//
// Store values are untyped JSON; the bus wants a value matching the
// datapoint's major type. Coercion never fails, it falls back instead.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use knxlink_api::BusValue;
use serde_json::{Number, Value};

use crate::model::{TypeCode, ValueKind};

/// Coerce a store value for a datapoint of `type_code`.
pub fn store_to_bus(value: &Value, type_code: Option<&TypeCode>) -> BusValue {
    match type_code.map_or(ValueKind::Number, TypeCode::value_kind) {
        ValueKind::Boolean => BusValue::Bool(to_bool(value)),
        ValueKind::Text => BusValue::Text(to_text(value)),
        ValueKind::Date => BusValue::Date(to_date(value).unwrap_or_else(Utc::now)),
        ValueKind::Number => BusValue::Number(to_number(value)),
    }
}

/// Store representation of a bus value. Dates become RFC 3339 text.
pub fn bus_to_store(value: &BusValue) -> Value {
    match value {
        BusValue::Bool(b) => Value::Bool(*b),
        BusValue::Number(n) => Number::from_f64(*n).map_or(Value::Null, Value::Number),
        BusValue::Text(s) => Value::String(s.clone()),
        BusValue::Date(d) => Value::String(d.to_rfc3339()),
    }
}

fn to_bool(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "on" | "yes" => true,
            "0" | "false" | "off" | "no" => false,
            other => !other.is_empty(),
        },
        Value::Null => false,
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn to_number(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::String(s) => s.trim().parse().unwrap_or(0.0),
        Value::Null | Value::Array(_) | Value::Object(_) => 0.0,
    }
}

fn to_date(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => from_epoch_millis(n),
        Value::String(s) => parse_date(s.trim()),
        _ => None,
    }
}

/// Numbers are milliseconds since the epoch.
fn from_epoch_millis(n: &Number) -> Option<DateTime<Utc>> {
    #[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
    let millis = n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))?;
    DateTime::from_timestamp_millis(millis)
}

fn parse_date(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(d) = DateTime::parse_from_rfc3339(text) {
        return Some(d.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
    }
    text.parse::<i64>().ok().and_then(DateTime::from_timestamp_millis)
}
