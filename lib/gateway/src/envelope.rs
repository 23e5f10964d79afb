//! Response envelope unwrapping.
//!
//! Gateway deployments wrap list results inconsistently: a bare array,
//! `{"data": [...]}`, `{"items": [...]}`, or a nested `{"data": {"items": [...]}}`.
//! [`unwrap_rows`] tries each known shape in a fixed order and reports which
//! one matched.

use crate::error::EnvelopeError;
use serde_json::Value as JsonValue;

/// The shape a list response was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowsShape {
    /// `[...]`
    TopLevelArray,
    /// `{"data": [...]}`
    Data,
    /// `{"items": [...]}`
    Items,
    /// `{"results": [...]}`
    Results,
    /// `{"data": {"items": [...]}}`
    NestedItems,
    /// `{"data": {"rows": [...]}}`
    NestedRows,
    /// `{"data": {"data": [...]}}`
    NestedData,
}

/// Rows unwrapped from a list response.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    /// Which shape matched.
    pub shape: RowsShape,
    /// The rows.
    pub rows: Vec<JsonValue>,
    /// Total row count reported by the Gateway, if any.
    pub total: Option<u64>,
}

const TOTAL_KEYS: &[&str] = &["total", "total_count", "totalCount", "count"];

fn array_at<'a>(value: &'a JsonValue, key: &str) -> Option<&'a Vec<JsonValue>> {
    value.get(key).and_then(JsonValue::as_array)
}

fn shape_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object without a row list",
    }
}

/// Locates the list of rows in a response body.
///
/// # Errors
///
/// Returns `EnvelopeError::UnrecognizedShape` if none of the known shapes match.
pub fn unwrap_rows(body: &JsonValue) -> Result<Envelope, EnvelopeError> {
    let total = extract_total(body);

    if let Some(rows) = body.as_array() {
        return Ok(Envelope {
            shape: RowsShape::TopLevelArray,
            rows: rows.clone(),
            total,
        });
    }

    let flat = [
        ("data", RowsShape::Data),
        ("items", RowsShape::Items),
        ("results", RowsShape::Results),
    ];
    for (key, shape) in flat {
        if let Some(rows) = array_at(body, key) {
            return Ok(Envelope {
                shape,
                rows: rows.clone(),
                total,
            });
        }
    }

    if let Some(inner) = body.get("data").filter(|d| d.is_object()) {
        let nested = [
            ("items", RowsShape::NestedItems),
            ("rows", RowsShape::NestedRows),
            ("data", RowsShape::NestedData),
        ];
        for (key, shape) in nested {
            if let Some(rows) = array_at(inner, key) {
                return Ok(Envelope {
                    shape,
                    rows: rows.clone(),
                    total: total.or_else(|| extract_total(inner)),
                });
            }
        }
    }

    Err(EnvelopeError::UnrecognizedShape {
        found: shape_name(body),
    })
}

/// Reads a total count from the top level or from `meta`/`pagination`.
#[must_use]
pub fn extract_total(body: &JsonValue) -> Option<u64> {
    let from = |value: &JsonValue| {
        TOTAL_KEYS
            .iter()
            .find_map(|key| value.get(*key).and_then(JsonValue::as_u64))
    };
    from(body)
        .or_else(|| body.get("meta").and_then(from))
        .or_else(|| body.get("pagination").and_then(from))
}

/// Unwraps a single-object response: `{"data": {...}}` yields the inner object.
#[must_use]
pub fn unwrap_object(body: &JsonValue) -> &JsonValue {
    match body.get("data") {
        Some(inner) if inner.is_object() => inner,
        _ => body,
    }
}

/// Returns the first of `keys` present on `row` as a non-empty string.
///
/// Numbers are rendered as strings so ids typed either way compare equal.
#[must_use]
pub fn json_str(row: &JsonValue, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match row.get(*key) {
        Some(JsonValue::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(JsonValue::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Returns the first of `keys` present on `row` as a number.
///
/// Numeric strings are accepted.
#[must_use]
pub fn json_number(row: &JsonValue, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|key| match row.get(*key) {
        Some(JsonValue::Number(n)) => n.as_f64(),
        Some(JsonValue::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}
