//! URL query-string codec.
//!
//! # Design
//! Parameters are a `serde_json::Map` (insertion-ordered through the
//! `preserve_order` feature), so any `Serialize` type can be turned into
//! query parameters and parsed queries can be handed straight to serde.
//!
//! A key that is present with `Value::Null` is a bare key (`flag`), while a
//! key that is missing from the map is simply not emitted. Repeated keys
//! collapse into a single flat `Value::Array` in encounter order, and
//! serializing an array emits the key once per element, so the two
//! directions agree for string/null-valued maps.
//!
//! Percent-decoding is strict: a stray `%` or an escape that does not decode
//! to UTF-8 is a `QueryError`. Keys are never escaped or unescaped.

use percent_encoding::{
    percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS, NON_ALPHANUMERIC,
};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::QueryError;

/// Query parameters keyed by name, in insertion order.
pub type Params = Map<String, Value>;

/// Bytes left untouched when encoding a component: RFC 3986 unreserved
/// characters plus `! * ' ( )`.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Bytes that may not appear raw in a request URI. `%`, `&`, `=`, `?` and
/// `/` are left alone so already-encoded text keeps its meaning.
const URI_ILLEGAL: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'<')
    .add(b'>')
    .add(b'\\')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// Percent-encode a single query component.
pub fn encode_component(input: &str) -> String {
    utf8_percent_encode(input, COMPONENT).to_string()
}

/// Escape the bytes a URI may not carry raw (spaces, `#`, control and
/// non-ASCII bytes), leaving existing escapes and delimiters untouched.
/// Applied to a finished URL, this only affects the unencoded keys.
pub fn escape_for_uri(input: &str) -> String {
    utf8_percent_encode(input, URI_ILLEGAL).to_string()
}

/// Percent-decode a single query component.
///
/// `+` is kept as-is. Fails if a `%` is not followed by two hex digits or if
/// the decoded bytes are not valid UTF-8.
pub fn decode_component(input: &str) -> Result<String, QueryError> {
    let bytes = input.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let well_formed = bytes.len() > i + 2
                && bytes[i + 1].is_ascii_hexdigit()
                && bytes[i + 2].is_ascii_hexdigit();
            if !well_formed {
                return Err(QueryError::MalformedEscape { position: i });
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    percent_decode_str(input)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|_| QueryError::InvalidUtf8)
}

/// Parse a query string (with or without its leading `?`) into parameters.
///
/// Error positions count bytes from the start of `query`.
pub fn parse(query: &str) -> Result<Params, QueryError> {
    let (query, mut offset) = match query.strip_prefix('?') {
        Some(rest) => (rest, 1),
        None => (query, 0),
    };
    let mut params = Params::new();
    if query.is_empty() {
        return Ok(params);
    }

    for segment in query.split('&') {
        let (key, value) = match segment.split_once('=') {
            Some((key, raw)) => {
                let decoded =
                    decode_component(raw).map_err(|e| e.shifted(offset + key.len() + 1))?;
                (key, Value::String(decoded))
            }
            None => (segment, Value::Null),
        };
        offset += segment.len() + 1;
        match params.get_mut(key) {
            None => {
                params.insert(key.to_string(), value);
            }
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
        }
    }
    Ok(params)
}

/// Serialize parameters into a query string without a leading `?`.
pub fn stringify(params: &Params) -> String {
    let mut segments = Vec::new();
    for (key, value) in params {
        match value {
            Value::Null => segments.push(key.clone()),
            Value::Array(items) => {
                for item in items {
                    segments.push(segment(key, item));
                }
            }
            scalar => segments.push(segment(key, scalar)),
        }
    }
    segments.join("&")
}

fn segment(key: &str, value: &Value) -> String {
    match render(value) {
        Some(text) => format!("{key}={}", encode_component(&text)),
        None => key.to_string(),
    }
}

/// Text form of a single value; `None` means "emit the bare key".
fn render(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        nested => Some(nested.to_string()),
    }
}

/// Convert any serializable map-like value into `Params`.
///
/// Unit and `None` become an empty map; anything else that is not a map is
/// rejected.
pub fn to_params<P: Serialize + ?Sized>(params: &P) -> Result<Params, QueryError> {
    match serde_json::to_value(params).map_err(|_| QueryError::NotAMap)? {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Params::new()),
        _ => Err(QueryError::NotAMap),
    }
}

/// Serialize any map-like value straight to a query string.
pub fn to_query_string<P: Serialize + ?Sized>(params: &P) -> Result<String, QueryError> {
    to_params(params).map(|params| stringify(&params))
}

/// Split a URL into its path and the query string after the first `?`.
pub fn split_url(url: &str) -> (&str, &str) {
    url.split_once('?').unwrap_or((url, ""))
}

/// Overlay `overlay` onto `base`. Keys in `overlay` win; an overwritten key
/// keeps its original position.
pub fn merge(base: &mut Params, overlay: Params) {
    for (key, value) in overlay {
        base.insert(key, value);
    }
}

/// Trim surrounding whitespace from every string leaf, in place.
pub fn trim_strings(params: &mut Params) {
    for value in params.values_mut() {
        trim_value(value);
    }
}

fn trim_value(value: &mut Value) {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.len() != s.len() {
                *s = trimmed.to_string();
            }
        }
        Value::Array(items) => items.iter_mut().for_each(trim_value),
        Value::Object(map) => trim_strings(map),
        _ => {}
    }
}
