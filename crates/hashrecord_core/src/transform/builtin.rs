//! Built-in transforms: boolean, integer, float, json, time and string.

use super::{Transform, TransformError};
use crate::model::value::Value;
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};

pub const BOOLEAN_TAG: &str = "boolean";
pub const INTEGER_TAG: &str = "integer";
pub const FLOAT_TAG: &str = "float";
pub const JSON_TAG: &str = "json";
pub const TIME_TAG: &str = "time";
pub const STRING_TAG: &str = "string";

/// Stores `true`/`false`.
#[derive(Debug, Default, Clone, Copy)]
pub struct BooleanTransform;

impl Transform for BooleanTransform {
    fn tag(&self) -> &str {
        BOOLEAN_TAG
    }

    fn serialize(&self, value: &Value) -> Result<Option<String>, TransformError> {
        match value {
            Value::Null => Ok(None),
            Value::Bool(flag) => Ok(Some(flag.to_string())),
            Value::String(text) => parse_bool(text)
                .map(|flag| Some(flag.to_string()))
                .ok_or_else(|| TransformError::incompatible(BOOLEAN_TAG, value)),
            other => Err(TransformError::incompatible(BOOLEAN_TAG, other)),
        }
    }

    fn deserialize(&self, raw: &str) -> Result<Value, TransformError> {
        parse_bool(raw)
            .map(Value::Bool)
            .ok_or_else(|| TransformError::malformed(BOOLEAN_TAG, raw))
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

/// Stores a decimal integer.
#[derive(Debug, Default, Clone, Copy)]
pub struct IntegerTransform;

impl Transform for IntegerTransform {
    fn tag(&self) -> &str {
        INTEGER_TAG
    }

    fn serialize(&self, value: &Value) -> Result<Option<String>, TransformError> {
        match value {
            Value::Null => Ok(None),
            Value::Integer(number) => Ok(Some(number.to_string())),
            Value::Float(number) => whole_float_to_i64(*number)
                .map(|whole| Some(whole.to_string()))
                .ok_or_else(|| TransformError::incompatible(INTEGER_TAG, value)),
            Value::String(text) => text
                .trim()
                .parse::<i64>()
                .map(|number| Some(number.to_string()))
                .map_err(|_| TransformError::incompatible(INTEGER_TAG, value)),
            other => Err(TransformError::incompatible(INTEGER_TAG, other)),
        }
    }

    fn deserialize(&self, raw: &str) -> Result<Value, TransformError> {
        raw.trim()
            .parse::<i64>()
            .map(Value::Integer)
            .map_err(|_| TransformError::malformed(INTEGER_TAG, raw))
    }
}

/// Whole floats inside the `i64` range only; `i64::MAX as f64` is 2^63 and
/// already out of range.
fn whole_float_to_i64(number: f64) -> Option<i64> {
    const LOWER: f64 = i64::MIN as f64;
    const UPPER: f64 = i64::MAX as f64;
    if number.is_finite() && number.fract() == 0.0 && (LOWER..UPPER).contains(&number) {
        Some(number as i64)
    } else {
        None
    }
}

/// Stores the shortest decimal form that parses back to the same `f64`.
#[derive(Debug, Default, Clone, Copy)]
pub struct FloatTransform;

impl Transform for FloatTransform {
    fn tag(&self) -> &str {
        FLOAT_TAG
    }

    fn serialize(&self, value: &Value) -> Result<Option<String>, TransformError> {
        match value {
            Value::Null => Ok(None),
            Value::Float(number) => Ok(Some(number.to_string())),
            Value::Integer(number) => Ok(Some((*number as f64).to_string())),
            Value::String(text) => text
                .trim()
                .parse::<f64>()
                .map(|number| Some(number.to_string()))
                .map_err(|_| TransformError::incompatible(FLOAT_TAG, value)),
            other => Err(TransformError::incompatible(FLOAT_TAG, other)),
        }
    }

    fn deserialize(&self, raw: &str) -> Result<Value, TransformError> {
        raw.trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| TransformError::malformed(FLOAT_TAG, raw))
    }
}

/// Stores compact JSON text.
///
/// Object keys come out sorted (serde_json's default map), so equal
/// structures always produce the same text.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonTransform;

impl Transform for JsonTransform {
    fn tag(&self) -> &str {
        JSON_TAG
    }

    fn serialize(&self, value: &Value) -> Result<Option<String>, TransformError> {
        let json = match value {
            Value::Null | Value::Json(serde_json::Value::Null) => return Ok(None),
            Value::Json(json) => json.clone(),
            Value::Bool(flag) => serde_json::Value::Bool(*flag),
            Value::Integer(number) => serde_json::Value::from(*number),
            Value::Float(number) => serde_json::Number::from_f64(*number)
                .map(serde_json::Value::Number)
                .ok_or_else(|| TransformError::incompatible(JSON_TAG, value))?,
            Value::String(text) => serde_json::Value::String(text.clone()),
            Value::Time(_) => return Err(TransformError::incompatible(JSON_TAG, value)),
        };
        serde_json::to_string(&json)
            .map(Some)
            .map_err(|_| TransformError::incompatible(JSON_TAG, value))
    }

    fn deserialize(&self, raw: &str) -> Result<Value, TransformError> {
        serde_json::from_str::<serde_json::Value>(raw)
            .map(Value::Json)
            .map_err(|_| TransformError::malformed(JSON_TAG, raw))
    }
}

/// Stores RFC 3339 UTC text with nanosecond precision.
#[derive(Debug, Default, Clone, Copy)]
pub struct TimeTransform;

impl Transform for TimeTransform {
    fn tag(&self) -> &str {
        TIME_TAG
    }

    fn serialize(&self, value: &Value) -> Result<Option<String>, TransformError> {
        match value {
            Value::Null => Ok(None),
            Value::Time(time) => Ok(Some(format_time(time))),
            Value::String(text) => parse_time(text)
                .map(|time| Some(format_time(&time)))
                .ok_or_else(|| TransformError::incompatible(TIME_TAG, value)),
            other => Err(TransformError::incompatible(TIME_TAG, other)),
        }
    }

    fn deserialize(&self, raw: &str) -> Result<Value, TransformError> {
        parse_time(raw)
            .map(Value::Time)
            .ok_or_else(|| TransformError::malformed(TIME_TAG, raw))
    }
}

fn format_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Accepts RFC 3339 and the `2024-01-02 03:04:05 +0000` form.
fn parse_time(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if let Ok(time) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(time.with_timezone(&Utc));
    }
    if let Ok(time) = DateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f %z") {
        return Some(time.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Identity transform; the default when an attribute names no type.
#[derive(Debug, Default, Clone, Copy)]
pub struct StringTransform;

impl Transform for StringTransform {
    fn tag(&self) -> &str {
        STRING_TAG
    }

    fn serialize(&self, value: &Value) -> Result<Option<String>, TransformError> {
        match value {
            Value::Null => Ok(None),
            Value::String(text) => Ok(Some(text.clone())),
            Value::Time(time) => Ok(Some(format_time(time))),
            other => Ok(Some(other.to_string())),
        }
    }

    fn deserialize(&self, raw: &str) -> Result<Value, TransformError> {
        Ok(Value::String(raw.to_string()))
    }
}
