use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;
use tracing::debug;

/// Outcome of looking a key up in a document.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Lookup<'a> {
    Absent,
    Null,
    Present(&'a Value),
}

impl<'a> Lookup<'a> {
    pub fn value(self) -> Option<&'a Value> {
        match self {
            Lookup::Present(v) => Some(v),
            Lookup::Absent | Lookup::Null => None,
        }
    }
}

/// Look up a single key. Non-object documents have no keys.
pub fn lookup<'a>(document: &'a Value, key: &str) -> Lookup<'a> {
    match document.as_object().and_then(|obj| obj.get(key)) {
        None => Lookup::Absent,
        Some(Value::Null) => Lookup::Null,
        Some(v) => Lookup::Present(v),
    }
}

/// Resolve `path`, then `subpath` inside it when given.
///
/// Absent keys, explicit nulls and a `subpath` applied to something that is
/// not an object all yield `None`. Never fails.
pub fn extract<'a>(document: &'a Value, path: &str, subpath: Option<&str>) -> Option<&'a Value> {
    let outer = lookup(document, path).value()?;
    let Some(sub) = subpath else {
        return Some(outer);
    };
    if !outer.is_object() {
        debug!(path, subpath = sub, "field is not an object, ignoring sub-lookup");
        return None;
    }
    match lookup(outer, sub) {
        Lookup::Present(v) => Some(v),
        Lookup::Null => None,
        Lookup::Absent => {
            debug!(path, subpath = sub, "sub-field missing");
            None
        }
    }
}

/// Strings pass through; numbers and booleans are rendered as text.
pub fn extract_string(document: &Value, path: &str, subpath: Option<&str>) -> Option<String> {
    match extract(document, path, subpath)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => {
            debug!(path, kind = value_kind(other), "expected a string");
            None
        }
    }
}

/// Integers, or strings holding an integer.
pub fn extract_i64(document: &Value, path: &str, subpath: Option<&str>) -> Option<i64> {
    let value = extract(document, path, subpath)?;
    let parsed = match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    if parsed.is_none() {
        debug!(path, kind = value_kind(value), "expected an integer");
    }
    parsed
}

/// RFC 3339 timestamps, falling back to a zone-less date-time read as UTC.
pub fn extract_timestamp(
    document: &Value,
    path: &str,
    subpath: Option<&str>,
) -> Option<DateTime<Utc>> {
    let value = extract(document, path, subpath)?;
    let parsed = value.as_str().and_then(parse_timestamp);
    if parsed.is_none() {
        debug!(path, value = %value, "unparseable timestamp");
    }
    parsed
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
