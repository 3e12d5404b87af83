//! Best-effort conversion of loosely-typed values into strongly-typed ones.
//!
//! Values that passed through a textual source (an environment variable, a
//! document encoding without native lists) rarely keep their intended type.
//! The slice helpers recover a typed list in priority order:
//!
//! 1. a list: every element is coerced on its own;
//! 2. a string: split on `,`, trimmed, and each piece coerced;
//! 3. any other scalar: a one-element list if it coerces;
//! 4. `null`: an empty list.
//!
//! What happens to elements that do not coerce depends on [`Coercion`].

use crate::error::CoerceError;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;
use std::time::Duration;

/// Delimiter for lists packed into a single string.
pub const LIST_DELIMITER: char = ',';

/// Element failure policy for slice coercion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Coercion {
    /// Drop elements that cannot be coerced.
    #[default]
    Lenient,
    /// Fail the whole slice if any element cannot be coerced.
    Strict,
}

/// Parse the canonical truthy/falsy tokens, case-insensitively.
pub fn parse_bool(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "1" | "t" | "true" | "y" | "yes" | "on" => Some(true),
        "0" | "f" | "false" | "n" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a duration.
///
/// Formats are tried in order:
/// 1. unit strings such as `1h30m`, `250ms`, `1.5s` (units `ns`, `us`/`µs`,
///    `ms`, `s`, `m`, `h`, `d`);
/// 2. a bare decimal number of seconds.
pub fn parse_duration(text: &str) -> Option<Duration> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    parse_unit_duration(text).or_else(|| text.parse::<f64>().ok().and_then(seconds))
}

fn parse_unit_duration(text: &str) -> Option<Duration> {
    let mut total_nanos = 0f64;
    let mut rest = text;

    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if number_len == 0 {
            return None;
        }
        let amount: f64 = rest[..number_len].parse().ok()?;
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let scale = match &rest[..unit_len] {
            "ns" => 1.0,
            "us" | "µs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3_600e9,
            "d" => 86_400e9,
            _ => return None,
        };
        rest = &rest[unit_len..];
        total_nanos += amount * scale;
    }

    if total_nanos.is_finite() && total_nanos < u64::MAX as f64 {
        Some(Duration::from_nanos(total_nanos.round() as u64))
    } else {
        None
    }
}

fn seconds(secs: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(secs).ok()
}

/// Parse a timestamp, trying each accepted layout in order.
pub fn parse_time(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(t) = DateTime::parse_from_rfc3339(text) {
        return Some(t.with_timezone(&Utc));
    }
    if let Ok(t) = DateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(t.with_timezone(&Utc));
    }
    for layout in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(t) = NaiveDateTime::parse_from_str(text, layout) {
            return Some(t.and_utc());
        }
    }
    if let Ok(d) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return d.and_hms_opt(0, 0, 0).map(|t| t.and_utc());
    }
    if let Ok(t) = DateTime::parse_from_rfc2822(text) {
        return Some(t.with_timezone(&Utc));
    }
    text.parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
}

/// Coerce a value into a boolean.
pub fn to_bool(value: &Value) -> Result<bool, CoerceError> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Number(n) => n
            .as_f64()
            .map(|f| f != 0.0)
            .ok_or_else(|| CoerceError::new(n, "bool")),
        Value::String(s) => parse_bool(s).ok_or_else(|| CoerceError::new(s, "bool")),
        other => Err(CoerceError::new(other, "bool")),
    }
}

/// Coerce a value into a signed integer.
pub fn to_i64(value: &Value) -> Result<i64, CoerceError> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).and_then(whole))
            .ok_or_else(|| CoerceError::new(n, "i64")),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().filter(|f| f.fract() == 0.0).and_then(whole))
                .ok_or_else(|| CoerceError::new(s, "i64"))
        }
        Value::Bool(b) => Ok(i64::from(*b)),
        other => Err(CoerceError::new(other, "i64")),
    }
}

fn whole(f: f64) -> Option<i64> {
    (f >= i64::MIN as f64 && f <= i64::MAX as f64).then_some(f as i64)
}

/// Coerce a value into a float.
pub fn to_f64(value: &Value) -> Result<f64, CoerceError> {
    match value {
        Value::Number(n) => n.as_f64().ok_or_else(|| CoerceError::new(n, "f64")),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| CoerceError::new(s, "f64")),
        Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        other => Err(CoerceError::new(other, "f64")),
    }
}

/// Coerce a scalar into its string form.
pub fn to_string(value: &Value) -> Result<String, CoerceError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(CoerceError::new(other, "string")),
    }
}

/// Coerce a value into a duration. Native numbers are seconds.
pub fn to_duration(value: &Value) -> Result<Duration, CoerceError> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .and_then(seconds)
            .ok_or_else(|| CoerceError::new(n, "duration")),
        Value::String(s) => parse_duration(s).ok_or_else(|| CoerceError::new(s, "duration")),
        other => Err(CoerceError::new(other, "duration")),
    }
}

/// Coerce a value into a UTC timestamp. Native numbers are Unix seconds.
pub fn to_time(value: &Value) -> Result<DateTime<Utc>, CoerceError> {
    match value {
        Value::Number(n) => {
            let parsed = match n.as_i64() {
                Some(secs) => DateTime::from_timestamp(secs, 0),
                None => n.as_f64().and_then(|f| {
                    let secs = f.floor();
                    let nanos = ((f - secs) * 1e9).round() as u32;
                    DateTime::from_timestamp(secs as i64, nanos.min(999_999_999))
                }),
            };
            parsed.ok_or_else(|| CoerceError::new(n, "time"))
        }
        Value::String(s) => parse_time(s).ok_or_else(|| CoerceError::new(s, "time")),
        other => Err(CoerceError::new(other, "time")),
    }
}

fn coerce_slice<V>(
    value: &Value,
    mode: Coercion,
    element: fn(&Value) -> Result<V, CoerceError>,
) -> Result<Vec<V>, CoerceError> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => collect(items.iter(), mode, element),
        Value::String(s) => {
            let pieces: Vec<Value> = s
                .split(LIST_DELIMITER)
                .map(str::trim)
                .filter(|piece| !piece.is_empty())
                .map(|piece| Value::String(piece.to_string()))
                .collect();
            collect(pieces.iter(), mode, element)
        }
        scalar => element(scalar).map(|v| vec![v]),
    }
}

fn collect<'a, V>(
    items: impl Iterator<Item = &'a Value>,
    mode: Coercion,
    element: fn(&Value) -> Result<V, CoerceError>,
) -> Result<Vec<V>, CoerceError> {
    let mut out = Vec::new();
    for item in items {
        match element(item) {
            Ok(v) => out.push(v),
            Err(e) if mode == Coercion::Lenient => {
                tracing::debug!(error = %e, "dropping element that does not coerce");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(out)
}

/// Coerce into a list of booleans.
pub fn to_bool_slice(value: &Value, mode: Coercion) -> Result<Vec<bool>, CoerceError> {
    coerce_slice(value, mode, to_bool)
}

/// Coerce into a list of integers.
pub fn to_i64_slice(value: &Value, mode: Coercion) -> Result<Vec<i64>, CoerceError> {
    coerce_slice(value, mode, to_i64)
}

/// Coerce into a list of floats.
pub fn to_f64_slice(value: &Value, mode: Coercion) -> Result<Vec<f64>, CoerceError> {
    coerce_slice(value, mode, to_f64)
}

/// Coerce into a list of strings.
pub fn to_string_slice(value: &Value, mode: Coercion) -> Result<Vec<String>, CoerceError> {
    coerce_slice(value, mode, to_string)
}

/// Coerce into a list of durations.
pub fn to_duration_slice(value: &Value, mode: Coercion) -> Result<Vec<Duration>, CoerceError> {
    coerce_slice(value, mode, to_duration)
}

/// Coerce into a list of timestamps.
pub fn to_time_slice(value: &Value, mode: Coercion) -> Result<Vec<DateTime<Utc>>, CoerceError> {
    coerce_slice(value, mode, to_time)
}
