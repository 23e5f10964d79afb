//! The `scm_request` tool: schema, argument decoding, and normalization.

use crate::backend::ToolSpec;
use crate::error::ToolCallError;
use scm_assistant_gateway::{GatewayRequest, Method, RequestBody};
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};
use std::collections::BTreeMap;

/// Name of the single generic tool offered to the model.
pub const SCM_REQUEST: &str = "scm_request";

const DEFAULT_LIST_LIMIT: u64 = 50;
const MAX_LIST_LIMIT: u64 = 200;
const CAPPED_PARAMS: &[&str] = &["limit", "page_size"];

/// The tool definition offered to the model.
#[must_use]
pub fn scm_request_spec() -> ToolSpec {
    ToolSpec {
        name: SCM_REQUEST.to_string(),
        description: "Call the SCM Gateway REST API. Use only endpoints listed in the system \
                      prompt. Returns the HTTP status and JSON body."
            .to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "method": {"type": "string", "enum": ["GET", "POST", "PUT", "PATCH", "DELETE"]},
                "path": {"type": "string", "description": "Path starting with /, e.g. /pop/stats"},
                "query": {"type": "object", "additionalProperties": {"type": ["string", "number", "boolean"]}},
                "body": {"type": "object"},
                "multipart": {"type": "object", "additionalProperties": {"type": "string"}}
            },
            "required": ["path"]
        }),
    }
}

#[derive(Debug, Deserialize)]
struct RawArguments {
    #[serde(default)]
    method: Option<String>,
    path: String,
    #[serde(default)]
    query: Option<BTreeMap<String, JsonValue>>,
    #[serde(default)]
    body: Option<JsonValue>,
    #[serde(default)]
    multipart: Option<BTreeMap<String, JsonValue>>,
}

/// Decodes `scm_request` arguments into a Gateway request.
///
/// A query string embedded in `path` is moved into the query map without
/// overwriting keys the model set explicitly. The method defaults to GET.
///
/// # Errors
///
/// Returns an error if the arguments are not valid JSON of the tool's
/// shape, or name an unsupported method.
pub fn decode(arguments: &str) -> Result<GatewayRequest, ToolCallError> {
    let raw: RawArguments = serde_json::from_str(arguments).map_err(|e| {
        ToolCallError::InvalidArguments {
            reason: e.to_string(),
        }
    })?;

    let method = match raw.method.as_deref() {
        Some(m) if !m.trim().is_empty() => {
            m.parse::<Method>()
                .map_err(|e| ToolCallError::InvalidArguments {
                    reason: e.to_string(),
                })?
        }
        _ => Method::Get,
    };

    let (path, embedded) = match raw.path.trim().split_once('?') {
        Some((path, query)) => (path.to_string(), Some(query.to_string())),
        None => (raw.path.trim().to_string(), None),
    };
    if path.is_empty() {
        return Err(ToolCallError::InvalidArguments {
            reason: "path is empty".to_string(),
        });
    }
    let path = if path.starts_with('/') {
        path
    } else {
        format!("/{path}")
    };

    let mut request = GatewayRequest::new(method, path);
    for (key, value) in raw.query.unwrap_or_default() {
        if let Some(value) = scalar_text(&value) {
            request.query.insert(key, value);
        }
    }
    if let Some(embedded) = embedded {
        for (key, value) in url::form_urlencoded::parse(embedded.as_bytes()) {
            request
                .query
                .entry(key.into_owned())
                .or_insert_with(|| value.into_owned());
        }
    }

    if let Some(fields) = raw.multipart {
        let fields = fields
            .iter()
            .filter_map(|(k, v)| scalar_text(v).map(|v| (k.clone(), v)))
            .collect();
        request.body = Some(RequestBody::Multipart(fields));
    } else if let Some(body) = raw.body.filter(|b| !b.is_null()) {
        request.body = Some(RequestBody::Json(body));
    }
    Ok(request)
}

fn scalar_text(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::Null => None,
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Array(items) => Some(
            items
                .iter()
                .filter_map(scalar_text)
                .collect::<Vec<_>>()
                .join(","),
        ),
        other => Some(other.to_string()),
    }
}

/// Applies per-path-family defaults before execution.
///
/// - `/metrics` paths default `include_totals=false`
/// - list GETs default `limit=50`; `limit` and `page_size` are capped at 200
/// - `/pop/` list GETs default `page=1`
pub fn apply_defaults(request: &mut GatewayRequest) {
    if request.path.contains("/metrics") {
        request
            .query
            .entry("include_totals".to_string())
            .or_insert_with(|| "false".to_string());
    }

    if request.method == Method::Get && is_list_path(&request.path) {
        if !request.query.contains_key("page_size") {
            request
                .query
                .entry("limit".to_string())
                .or_insert_with(|| DEFAULT_LIST_LIMIT.to_string());
        }
        if request.path.starts_with("/pop/") {
            request
                .query
                .entry("page".to_string())
                .or_insert_with(|| "1".to_string());
        }
    }

    for key in CAPPED_PARAMS {
        if let Some(value) = request.query.get_mut(*key)
            && let Ok(n) = value.trim().parse::<u64>()
            && n > MAX_LIST_LIMIT
        {
            *value = MAX_LIST_LIMIT.to_string();
        }
    }
}

// Item lookups end in an identifier (digits, UUIDs, hosts); collections
// end in a plain word.
fn is_list_path(path: &str) -> bool {
    path.rsplit('/')
        .next()
        .is_some_and(|last| !last.is_empty() && !last.chars().any(|c| c.is_ascii_digit()))
}

/// Truncates `text` to at most `max_bytes` on a character boundary.
#[must_use]
pub fn clip(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
