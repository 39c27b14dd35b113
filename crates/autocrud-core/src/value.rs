// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Scalar value checking, parsing and comparison.
//!
//! Values travel through the engine as [`serde_json::Value`]. This module owns
//! the rules tying them to [`ScalarType`]: which JSON values a type accepts,
//! how raw path and query text is parsed, and how values normalize so that
//! equality and ordering behave the same in every storage backend.

use std::cmp::Ordering;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde_json::{Number, Value};
use uuid::Uuid;

use crate::{Error, Result, ScalarType};

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

impl ScalarType {
    /// Check a JSON value against this type and normalize it.
    ///
    /// `null` is accepted only when `nullable` is set. Timestamps come back as
    /// RFC 3339 UTC with microsecond precision, uuids as lowercase hyphenated
    /// text.
    ///
    /// # Errors
    ///
    /// [`Error::Validation`] naming `field` when the value does not fit.
    pub fn check(&self, field: &str, value: &Value, nullable: bool) -> Result<Value> {
        if value.is_null() {
            return if nullable {
                Ok(Value::Null)
            } else {
                Err(Error::validation(field, "must not be null"))
            };
        }

        match self {
            Self::Bool if value.is_boolean() => Ok(value.clone()),
            Self::Integer if value.is_i64() || value.is_u64() => {
                value
                    .as_i64()
                    .map(Value::from)
                    .ok_or_else(|| Error::validation(field, "integer out of range"))
            }
            Self::Float if value.is_number() => Ok(value.clone()),
            Self::Text if value.is_string() => Ok(value.clone()),
            Self::Timestamp => match value.as_str() {
                Some(raw) => normalize_timestamp(raw)
                    .map(Value::String)
                    .ok_or_else(|| Error::validation(field, "expected an RFC 3339 timestamp")),
                None => Err(Error::validation(field, "expected an RFC 3339 timestamp"))
            },
            Self::Uuid => match value.as_str().and_then(|raw| Uuid::parse_str(raw).ok()) {
                Some(uuid) => Ok(Value::String(uuid.hyphenated().to_string())),
                None => Err(Error::validation(field, "expected a uuid"))
            },
            Self::Json => Ok(value.clone()),
            _ => Err(Error::validation(
                field,
                format!("expected {}", self.name().to_lowercase())
            ))
        }
    }

    /// Parse raw path or query text into a checked value.
    ///
    /// # Errors
    ///
    /// [`Error::Validation`] naming `field` when the text does not parse.
    pub fn parse_str(&self, field: &str, raw: &str) -> Result<Value> {
        match self {
            Self::Text => Ok(Value::String(raw.to_owned())),
            Self::Bool => match raw.to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Ok(Value::Bool(true)),
                "false" | "0" | "no" | "off" => Ok(Value::Bool(false)),
                _ => Err(Error::validation(field, "expected a boolean"))
            },
            Self::Integer => raw
                .trim()
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| Error::validation(field, "expected an integer")),
            Self::Float => raw
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| Error::validation(field, "expected a number")),
            Self::Timestamp | Self::Uuid => self.check(field, &Value::String(raw.to_owned()), false),
            Self::Json => {
                Ok(serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_owned())))
            }
        }
    }
}

fn normalize_timestamp(raw: &str) -> Option<String> {
    let parsed = DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NAIVE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
                .map(|naive| naive.and_utc())
        })?;
    Some(parsed.to_rfc3339_opts(SecondsFormat::Micros, true))
}

/// Whether a value is one of the "empty" sentinels.
///
/// Filters holding such a value are dropped from list queries unless the
/// field is on the explicit-null allow-list.
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty()
    }
}

/// Total order over JSON values.
///
/// Null sorts first, then booleans, numbers, strings, arrays and objects.
pub fn compare(left: &Value, right: &Value) -> Ordering {
    fn rank(value: &Value) -> u8 {
        match value {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5
        }
    }

    match (left, right) {
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Number(a), Value::Number(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(a), Some(b)) => a.cmp(&b),
            _ => a
                .as_f64()
                .partial_cmp(&b.as_f64())
                .unwrap_or(Ordering::Equal)
        },
        (Value::String(a), Value::String(b)) => a.cmp(b),
        _ => rank(left).cmp(&rank(right))
    }
}

/// Render a key for messages: strings without quotes.
pub fn render_key(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string()
    }
}
