//! Defensive lookups into a loosely typed JSON tree.
//!
//! Scanner reports are schema-loose: fields go missing, numbers arrive as
//! strings, and `null` is used for "not set". Every getter here returns
//! `Ok(None)` for an absent (or `null`) field and
//! [`ConvertError::TypeMismatch`] when the field is present but cannot be
//! coerced, so callers decide whether absence is fatal.

use crate::cvss::CvssV3;
use crate::error::{ConvertError, Result};
use crate::models::Severity;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;
use std::fmt;

/// One step of a lookup path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathSegment<'a> {
    Key(&'a str),
    Index(usize),
}

impl fmt::Display for PathSegment<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(key) => write!(f, "{key}"),
            Self::Index(index) => write!(f, "{index}"),
        }
    }
}

/// Build a `[PathSegment]` array. Keys are string literals, indices are
/// written in brackets.
///
/// ```
/// use artifact_notes::{extract, path};
/// use serde_json::json;
///
/// let doc = json!({ "identifiers": { "CVE": ["CVE-2021-1234"] } });
/// let cve = extract::string_at(&doc, &path!["identifiers", "CVE", [0]]).unwrap();
/// assert_eq!(cve.as_deref(), Some("CVE-2021-1234"));
/// ```
#[macro_export]
macro_rules! path {
    (@segment [$index:expr]) => {
        $crate::extract::PathSegment::Index($index)
    };
    (@segment $key:expr) => {
        $crate::extract::PathSegment::Key($key)
    };
    ($($segment:tt),* $(,)?) => {
        [$($crate::path!(@segment $segment)),*]
    };
}

/// Render a path as a dotted string for error messages.
pub fn display_path(path: &[PathSegment<'_>]) -> String {
    path.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(".")
}

/// Resolve `path` in `value`. JSON `null` counts as absent.
pub fn lookup<'v>(value: &'v Value, path: &[PathSegment<'_>]) -> Option<&'v Value> {
    let mut current = value;
    for segment in path {
        current = match segment {
            PathSegment::Key(key) => current.as_object()?.get(*key)?,
            PathSegment::Index(index) => current.as_array()?.get(*index)?,
        };
    }
    if current.is_null() { None } else { Some(current) }
}

pub fn exists(value: &Value, path: &[PathSegment<'_>]) -> bool {
    lookup(value, path).is_some()
}

/// Resolve `path` or fail with [`ConvertError::MissingField`].
pub fn require<'v>(value: &'v Value, path: &[PathSegment<'_>]) -> Result<&'v Value> {
    lookup(value, path).ok_or_else(|| ConvertError::missing_field(display_path(path)))
}

/// Name of the JSON type of `value`, as reported in type mismatch errors.
pub fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn mismatch(path: &[PathSegment<'_>], expected: &str, found: &Value) -> ConvertError {
    ConvertError::type_mismatch(display_path(path), expected, json_type(found))
}

pub fn string_at(value: &Value, path: &[PathSegment<'_>]) -> Result<Option<String>> {
    lookup(value, path)
        .map(|found| to_string(found).ok_or_else(|| mismatch(path, "string", found)))
        .transpose()
}

pub fn f32_at(value: &Value, path: &[PathSegment<'_>]) -> Result<Option<f32>> {
    lookup(value, path)
        .map(|found| to_f32(found).ok_or_else(|| mismatch(path, "number", found)))
        .transpose()
}

pub fn timestamp_at(value: &Value, path: &[PathSegment<'_>]) -> Result<Option<DateTime<Utc>>> {
    lookup(value, path)
        .map(|found| to_timestamp(found).ok_or_else(|| mismatch(path, "timestamp", found)))
        .transpose()
}

pub fn severity_at(value: &Value, path: &[PathSegment<'_>]) -> Result<Option<Severity>> {
    lookup(value, path)
        .map(|found| to_severity(found).ok_or_else(|| mismatch(path, "severity label", found)))
        .transpose()
}

pub fn array_at<'v>(value: &'v Value, path: &[PathSegment<'_>]) -> Result<Option<&'v [Value]>> {
    lookup(value, path)
        .map(|found| {
            found
                .as_array()
                .map(Vec::as_slice)
                .ok_or_else(|| mismatch(path, "array", found))
        })
        .transpose()
}

/// Strings only; numbers and booleans are not silently stringified.
pub fn to_string(value: &Value) -> Option<String> {
    value.as_str().map(str::to_string)
}

/// Numbers, or strings holding a number (`"7.5"`). NaN, infinities and
/// values outside the `f32` range are rejected.
pub fn to_f32(value: &Value) -> Option<f32> {
    let parsed = match value {
        Value::Number(n) => n.as_f64().map(|f| f as f32),
        Value::String(s) => s.trim().parse::<f32>().ok(),
        _ => None,
    };
    parsed.filter(|f| f.is_finite())
}

/// RFC 3339, or a naive `YYYY-MM-DDTHH:MM:SS[.fff]` taken as UTC.
pub fn to_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    let s = value.as_str()?.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Some(naive.and_utc());
    }

    None
}

pub fn to_severity(value: &Value) -> Option<Severity> {
    value.as_str().map(Severity::from_label)
}

/// Break a vector string down into CVSS v3 components.
pub fn to_cvss_v3(base_score: f32, vector: &Value, path: &[PathSegment<'_>]) -> Result<CvssV3> {
    let vector = vector
        .as_str()
        .ok_or_else(|| mismatch(path, "CVSS vector string", vector))?;

    CvssV3::parse(base_score, vector).map_err(|_| {
        ConvertError::type_mismatch(display_path(path), "CVSS v3 vector", "malformed vector")
    })
}
