//! Payload sanitizing: truncation, secret scrubbing and failure-tolerant
//! serialization.
//!
//! Everything in this module is infallible from the caller's point of view.
//! A payload that cannot be serialized becomes a fallback string, a payload
//! nested deeper than [`MAX_SERIALIZE_DEPTH`] is cut with a sentinel, and input
//! that is not JSON passes through [`scrub_secrets`] untouched.

use crate::constants::{defaults, markers};
use regex::{RegexSet, RegexSetBuilder};
use serde::Serialize;
use serde_json::{Map, Value};

/// Nesting bound applied before serializing captured payloads.
pub const MAX_SERIALIZE_DEPTH: usize = 64;

/// A serialized payload bounded to a maximum size.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TruncatedBody {
    pub body: String,
    pub truncated: bool,
}

impl TruncatedBody {
    /// Append a chunk, keeping the body within `max_size` bytes.
    ///
    /// Once truncated, a body stays truncated and further chunks are ignored.
    pub fn append(&mut self, chunk: &str, max_size: usize) {
        if self.truncated {
            return;
        }
        let room = max_size.saturating_sub(self.body.len());
        let kept = truncate_str(chunk, room);
        self.body.push_str(kept);
        if kept.len() < chunk.len() {
            self.truncated = true;
        }
    }
}

/// Cut `s` to at most `max_bytes` bytes without splitting a UTF-8 character.
pub fn truncate_str(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Serialize `value` and bound the result to `max_size` bytes.
///
/// Strings are taken verbatim, everything else is rendered as JSON. Applying
/// this to an already truncated body leaves it unchanged.
pub fn stringify_and_truncate(value: &Value, max_size: usize) -> TruncatedBody {
    let rendered = match value {
        Value::String(s) => s.clone(),
        other => serde_json::to_string(&bound_depth(other, MAX_SERIALIZE_DEPTH))
            .unwrap_or_else(|_| markers::UNSERIALIZABLE.to_string()),
    };

    let kept = truncate_str(&rendered, max_size);
    if kept.len() == rendered.len() {
        TruncatedBody {
            body: rendered,
            truncated: false,
        }
    } else {
        TruncatedBody {
            body: kept.to_string(),
            truncated: true,
        }
    }
}

/// Convert any serializable value to JSON, falling back to a marker string.
pub fn to_json_or_fallback<T: Serialize + ?Sized>(value: &T) -> Value {
    serde_json::to_value(value)
        .unwrap_or_else(|_| Value::String(markers::UNSERIALIZABLE.to_string()))
}

/// Copy `value`, replacing containers nested deeper than `max_depth` with a sentinel.
pub fn bound_depth(value: &Value, max_depth: usize) -> Value {
    match value {
        Value::Array(_) | Value::Object(_) if max_depth == 0 => {
            Value::String(markers::DEPTH_SENTINEL.to_string())
        }
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| bound_depth(item, max_depth - 1))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), bound_depth(v, max_depth - 1)))
                .collect(),
        ),
        scalar => scalar.clone(),
    }
}

/// Key patterns whose values are replaced before export.
///
/// Patterns match whole keys, case-insensitively.
#[derive(Debug, Clone)]
pub struct SecretPatterns {
    set: RegexSet,
    exempt_paths: Vec<String>,
}

impl SecretPatterns {
    /// Compile a pattern list. Fails on the first invalid regex.
    pub fn new<I, S>(patterns: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let anchored: Vec<String> = patterns
            .into_iter()
            .map(|p| format!("^(?:{})$", p.as_ref()))
            .collect();
        let set = RegexSetBuilder::new(anchored)
            .case_insensitive(true)
            .build()?;
        Ok(Self {
            set,
            exempt_paths: defaults::SECRET_EXEMPT_PATHS
                .iter()
                .map(|p| p.to_string())
                .collect(),
        })
    }

    /// Whether `key` names a secret.
    pub fn is_secret(&self, key: &str) -> bool {
        self.set.is_match(key)
    }

    fn is_exempt(&self, path: &str) -> bool {
        self.exempt_paths.iter().any(|p| p == path)
    }
}

impl Default for SecretPatterns {
    fn default() -> Self {
        // The default list is static and known to compile
        match Self::new(defaults::SECRET_PATTERNS) {
            Ok(patterns) => patterns,
            Err(_) => Self {
                set: RegexSet::empty(),
                exempt_paths: Vec::new(),
            },
        }
    }
}

/// Scrub secrets from a serialized JSON document.
///
/// Input that does not parse as JSON is returned unchanged.
pub fn scrub_secrets(serialized: &str, patterns: &SecretPatterns) -> String {
    match serde_json::from_str::<Value>(serialized) {
        Ok(mut value) => {
            scrub_value(&mut value, patterns);
            serde_json::to_string(&value).unwrap_or_else(|_| serialized.to_string())
        }
        Err(_) => serialized.to_string(),
    }
}

/// Scrub secrets in place.
///
/// A matched key keeps its structure: nested objects and arrays survive, every
/// leaf underneath is replaced with the redaction marker.
pub fn scrub_value(value: &mut Value, patterns: &SecretPatterns) {
    scrub_at(value, patterns, "");
}

fn scrub_at(value: &mut Value, patterns: &SecretPatterns, path: &str) {
    match value {
        Value::Object(map) => scrub_object(map, patterns, path),
        Value::Array(items) => {
            for item in items {
                scrub_at(item, patterns, path);
            }
        }
        _ => {}
    }
}

fn scrub_object(map: &mut Map<String, Value>, patterns: &SecretPatterns, path: &str) {
    for (key, child) in map.iter_mut() {
        let child_path = if path.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", path, key)
        };
        if patterns.is_secret(key) && !patterns.is_exempt(&child_path) {
            redact_leaves(child);
        } else {
            scrub_at(child, patterns, &child_path);
        }
    }
}

fn redact_leaves(value: &mut Value) {
    match value {
        Value::Object(map) => map.values_mut().for_each(redact_leaves),
        Value::Array(items) => items.iter_mut().for_each(redact_leaves),
        Value::Null => {}
        leaf => *leaf = Value::String(markers::REDACTED.to_string()),
    }
}

/// Scrub secret values from a URL query string, preserving parameter order.
///
/// A leading `?` is kept. Keys are compared after percent-decoding.
pub fn scrub_query_params(query: &str, patterns: &SecretPatterns) -> String {
    let (prefix, rest) = match query.strip_prefix('?') {
        Some(rest) => ("?", rest),
        None => ("", query),
    };
    if rest.is_empty() {
        return query.to_string();
    }

    let scrubbed: Vec<String> = rest
        .split('&')
        .map(|pair| match pair.split_once('=') {
            Some((key, _)) => {
                let decoded = urlencoding::decode(key)
                    .map(|k| k.into_owned())
                    .unwrap_or_else(|_| key.to_string());
                if patterns.is_secret(&decoded) {
                    format!("{}={}", key, markers::REDACTED)
                } else {
                    pair.to_string()
                }
            }
            None => pair.to_string(),
        })
        .collect();

    format!("{}{}", prefix, scrubbed.join("&"))
}
