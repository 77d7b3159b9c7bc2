//! Shared PDF parsing utilities used across multiple modules.

use lopdf::{Dictionary, Object, Stream};

/// Extract a string value from a PDF dictionary for a given key.
///
/// Returns `Some(String)` if the key exists and holds a non-empty string or
/// name, `None` otherwise.
pub fn extract_string_from_dict(dict: &Dictionary, key: &[u8]) -> Option<String> {
    dict.get(key)
        .ok()
        .and_then(object_text)
        .filter(|s| !s.is_empty())
}

/// Extract a name value (`/Subtype /RichMedia`) as a string.
pub fn extract_name_from_dict(dict: &Dictionary, key: &[u8]) -> Option<String> {
    dict.get(key)
        .ok()
        .and_then(|v| v.as_name().ok())
        .map(|n| String::from_utf8_lossy(n).into_owned())
}

/// Text of a string or name object.
pub fn object_text(obj: &Object) -> Option<String> {
    match obj {
        Object::String(bytes, _) | Object::Name(bytes) => {
            Some(String::from_utf8_lossy(bytes).into_owned())
        }
        _ => None,
    }
}

/// Numeric value of an integer or real object.
pub fn object_number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r as f32),
        _ => None,
    }
}

/// Dictionary key rendered for structural paths and log lines.
pub fn key_text(key: &[u8]) -> String {
    String::from_utf8_lossy(key).into_owned()
}

/// The stream's `/Filter` entry as a list of filter names.
pub fn stream_filters(stream: &Stream) -> Vec<String> {
    match stream.dict.get(b"Filter") {
        Ok(Object::Name(n)) => vec![key_text(n)],
        Ok(Object::Array(items)) => items
            .iter()
            .filter_map(|f| f.as_name().ok())
            .map(key_text)
            .collect(),
        _ => Vec::new(),
    }
}

/// Stream bytes with filters applied. Unfiltered streams, and streams whose
/// filters lopdf cannot undo, come back as stored.
pub fn decoded_bytes(stream: &Stream) -> Vec<u8> {
    if stream.dict.get(b"Filter").is_err() {
        return stream.content.clone();
    }
    stream
        .decompressed_content()
        .unwrap_or_else(|_| stream.content.clone())
}

/// Replace everything outside `[A-Za-z0-9._-]` so a structural label can be
/// used as part of a file name.
pub fn sanitize_file_component(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "unnamed".into()
    } else {
        cleaned
    }
}
