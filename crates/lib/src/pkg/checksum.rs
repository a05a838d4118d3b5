//! Deterministic checksum over a canonicalized enumeration of entries.
//!
//! ZIP output is not byte-stable, so package equality is defined here
//! instead: entries sorted by normalized path, each JSON entry reduced to a
//! canonical form (sorted keys, LF-only left-trimmed strings) before
//! digesting. The checksum entry itself is excluded from its own input.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use pasrc_core::hash::{hash_bytes, PartDigest};
use pasrc_core::json::{normalize_expression, sort_keys, to_pretty_bytes};
use pasrc_core::paths::normalize;

/// Bumped when the canonical form changes.
pub const CHECKSUM_VERSION: u32 = 1;

/// Archive path of the dedicated checksum entry.
pub const CHECKSUM_ENTRY: &str = "Checksum.json";

/// `Checksum.json` body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ChecksumJson {
  pub checksum_version: u32,
  pub checksum: String,
}

/// Compute the checksum of a set of `(archive path, content)` entries.
///
/// Any entry whose normalized path equals the checksum entry is skipped, so
/// callers can pass a full enumeration.
pub fn compute<'a>(entries: impl IntoIterator<Item = (&'a str, &'a [u8])>) -> String {
  let mut indexed: Vec<(String, &[u8])> = entries
    .into_iter()
    .map(|(name, bytes)| (normalize(name), bytes))
    .filter(|(name, _)| name != &normalize(CHECKSUM_ENTRY))
    .collect();
  indexed.sort_by(|a, b| a.0.cmp(&b.0));

  let mut digest = PartDigest::new();
  for (name, bytes) in indexed {
    let canonical = canonical_entry(&name, bytes);
    digest.add_part(&name, &hash_bytes(&canonical));
  }
  format!("c{}_{}", CHECKSUM_VERSION, digest.finish())
}

/// Canonical content of one entry. JSON entries are parsed and re-serialized
/// with sorted keys and normalized string values; anything that is not JSON
/// (or fails to parse) is digested raw.
fn canonical_entry(normalized_name: &str, bytes: &[u8]) -> Vec<u8> {
  if !normalized_name.ends_with(".json") {
    return bytes.to_vec();
  }
  match serde_json::from_slice::<Value>(bytes) {
    Ok(value) => {
      let canonical = sort_keys(&normalize_strings(&value));
      to_pretty_bytes(&canonical).unwrap_or_else(|_| bytes.to_vec())
    }
    Err(_) => bytes.to_vec(),
  }
}

/// Expression strings normalize on split (LF-only, left-trimmed) and the
/// normalized form is never undone on combine; folding every string value the
/// same way keeps the checksum blind to that.
fn normalize_strings(value: &Value) -> Value {
  match value {
    Value::String(s) => Value::String(normalize_expression(s)),
    Value::Array(items) => Value::Array(items.iter().map(normalize_strings).collect()),
    Value::Object(map) => Value::Object(map.iter().map(|(k, v)| (k.clone(), normalize_strings(v))).collect()),
    other => other.clone(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn entry<'a>(name: &'a str, bytes: &'a [u8]) -> (&'a str, &'a [u8]) {
    (name, bytes)
  }

  #[test]
  fn order_of_enumeration_does_not_matter() {
    let a = compute([entry("A.json", b"{\"x\":1}"), entry("B.bin", b"\x01\x02")]);
    let b = compute([entry("B.bin", b"\x01\x02"), entry("A.json", b"{\"x\":1}")]);
    assert_eq!(a, b);
  }

  #[test]
  fn checksum_entry_is_excluded_from_itself() {
    let without = compute([entry("A.json", b"{}")]);
    let with = compute([entry("A.json", b"{}"), entry("Checksum.json", b"{\"Checksum\":\"c1_x\"}")]);
    assert_eq!(without, with);
  }

  #[test]
  fn json_formatting_is_canonicalized() {
    let compact = compute([entry("A.json", b"{\"b\":1,\"a\":2}")]);
    let pretty = compute([entry("A.json", b"{\n  \"a\": 2,\n  \"b\": 1\n}\n")]);
    assert_eq!(compact, pretty);
  }

  #[test]
  fn string_newlines_are_normalized() {
    let crlf = compute([entry("A.json", b"{\"Script\":\"a\\r\\nb\"}")]);
    let lf = compute([entry("A.json", b"{\"Script\":\"a\\nb\"}")]);
    assert_eq!(crlf, lf);
  }

  #[test]
  fn content_changes_change_the_checksum() {
    let a = compute([entry("A.json", b"{\"x\":1}")]);
    let b = compute([entry("A.json", b"{\"x\":2}")]);
    assert_ne!(a, b);
    assert!(a.starts_with("c1_"));
  }

  #[test]
  fn entry_names_participate() {
    let a = compute([entry("A.bin", b"x")]);
    let b = compute([entry("B.bin", b"x")]);
    assert_ne!(a, b);
  }
}
