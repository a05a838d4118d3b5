//! Deterministic JSON shaping.
//!
//! Two flavours are needed:
//! - `to_pretty_bytes` keeps insertion order and is used for every JSON file
//!   the source tree owns (opaque extension bags must stay ordered).
//! - `canonicalize` additionally sorts object keys and is used where byte
//!   stability matters more than authored order: `Other/` passthrough files
//!   and the checksum's per-entry canonical form.

use serde_json::{Map, Value};

use crate::Result;

/// Re-serialize arbitrary JSON bytes into canonical form: sorted keys,
/// two-space indentation, trailing newline.
pub fn canonicalize(bytes: &[u8]) -> Result<Vec<u8>> {
  let value: Value = serde_json::from_slice(bytes)?;
  to_pretty_bytes(&sort_keys(&value))
}

/// Recursively sort object keys (ordinal), leaving arrays in order.
pub fn sort_keys(value: &Value) -> Value {
  match value {
    Value::Object(map) => {
      let mut keys: Vec<&String> = map.keys().collect();
      keys.sort();
      let mut sorted = Map::with_capacity(map.len());
      for key in keys {
        sorted.insert(key.clone(), sort_keys(&map[key]));
      }
      Value::Object(sorted)
    }
    Value::Array(items) => Value::Array(items.iter().map(sort_keys).collect()),
    other => other.clone(),
  }
}

/// Pretty-print a value with two-space indentation and a trailing newline,
/// preserving the value's own key order.
pub fn to_pretty_bytes(value: &Value) -> Result<Vec<u8>> {
  let mut bytes = serde_json::to_vec_pretty(value)?;
  bytes.push(b'\n');
  Ok(bytes)
}

/// Replace CRLF and lone CR with LF.
pub fn normalize_newlines(s: &str) -> String {
  s.replace("\r\n", "\n").replace('\r', "\n")
}

/// Canonical form of a stored expression: LF-only, left-trimmed.
pub fn normalize_expression(s: &str) -> String {
  normalize_newlines(s).trim_start().to_string()
}
