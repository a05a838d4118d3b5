//! Path codecs for the two path spaces the converter moves between.
//!
//! *Archive paths* are forward-slash, compared case-insensitively, and may
//! begin with a leading separator (re-written to an underscore on disk).
//! *Filesystem paths* use whatever the platform gives us. Everything that
//! crosses the boundary goes through this module so the two spaces never mix.

use crate::error::{Error, Result};

/// Characters kept literal by [`escape_file_name`].
fn is_safe(c: char) -> bool {
  c.is_ascii_alphanumeric() || matches!(c, ' ' | '_' | '.' | '[' | ']' | '-' | '\\')
}

/// Canonical form of an archive path: trimmed, forward-slash, no leading or
/// trailing separators, lowercase.
///
/// Lookups into entry maps always go through this; collisions between two
/// distinct raw paths are the caller's concern (first wins, warn).
pub fn normalize(p: &str) -> String {
  p.trim()
    .replace('\\', "/")
    .trim_matches('/')
    .to_lowercase()
}

/// Percent-encode a string so it is safe as a file name.
///
/// ASCII outside the safe set encodes as `%hh` (two lowercase hex digits).
/// Code points above 0x7F encode as one `%%hhhh` per UTF-16 unit; this exact
/// scheme is load-bearing for round-trip and must not change.
pub fn escape_file_name(s: &str) -> String {
  let mut out = String::with_capacity(s.len());
  let mut units = [0u16; 2];
  for c in s.chars() {
    if is_safe(c) {
      out.push(c);
    } else if (c as u32) < 0x80 {
      out.push_str(&format!("%{:02x}", c as u32));
    } else {
      for unit in c.encode_utf16(&mut units) {
        out.push_str(&format!("%%{:04x}", unit));
      }
    }
  }
  out
}

/// Reverse [`escape_file_name`]. A stray `%` with insufficient hex is kept
/// literal rather than rejected.
pub fn unescape_file_name(s: &str) -> String {
  let bytes = s.as_bytes();
  let mut units: Vec<u16> = Vec::with_capacity(s.len());
  let mut i = 0;

  // Helper: parse `n` hex digits at byte offset `at`.
  let hex_at = |at: usize, n: usize| -> Option<u32> {
    let end = at.checked_add(n)?;
    if end > bytes.len() {
      return None;
    }
    let chunk = std::str::from_utf8(&bytes[at..end]).ok()?;
    u32::from_str_radix(chunk, 16).ok()
  };

  while i < bytes.len() {
    if bytes[i] == b'%' {
      if i + 1 < bytes.len() && bytes[i + 1] == b'%' {
        if let Some(v) = hex_at(i + 2, 4) {
          units.push(v as u16);
          i += 6;
          continue;
        }
      }
      if let Some(v) = hex_at(i + 1, 2) {
        units.push(v as u16);
        i += 3;
        continue;
      }
      units.push(u16::from(b'%'));
      i += 1;
    } else {
      // Multi-byte UTF-8 input stays as-is; decode the char and re-encode.
      let rest = &s[i..];
      let c = rest.chars().next().expect("non-empty remainder");
      let mut buf = [0u16; 2];
      units.extend_from_slice(c.encode_utf16(&mut buf));
      i += c.len_utf8();
    }
  }

  String::from_utf16(&units).unwrap_or_else(|_| String::from_utf16_lossy(&units))
}

/// On-disk file name for an archive entry path: a leading separator becomes an
/// underscore so the entry can live under a plain directory.
pub fn archive_to_disk_name(original: &str) -> String {
  match original.strip_prefix('/').or_else(|| original.strip_prefix('\\')) {
    Some(rest) => format!("_{}", rest),
    None => original.to_string(),
  }
}

/// Inverse of [`archive_to_disk_name`].
pub fn disk_to_archive_name(name: &str) -> String {
  match name.strip_prefix('_') {
    Some(rest) => format!("/{}", rest),
    None => name.to_string(),
  }
}

/// Compute the part of `full` below `base`.
///
/// Separator style and casing of the input are preserved in the result. The
/// result carries a trailing separator when the last component has no
/// extension, matching how the source tree records directory-like paths.
/// Fails with `InvalidPath` when `full` does not start with `base`.
pub fn relative(full: &str, base: &str) -> Result<String> {
  let full_chars: Vec<char> = full.chars().collect();
  let mut base_chars: Vec<char> = base.chars().collect();
  if !matches!(base_chars.last(), Some('/' | '\\')) {
    base_chars.push('/');
  }

  let matches_prefix = base_chars.len() <= full_chars.len()
    && base_chars.iter().zip(full_chars.iter()).all(|(b, f)| {
      let b = if *b == '\\' { '/' } else { *b };
      let f = if *f == '\\' { '/' } else { *f };
      b.eq_ignore_ascii_case(&f)
    });

  if !matches_prefix {
    return Err(Error::InvalidPath {
      path: full.to_string(),
      base: base.to_string(),
    });
  }

  let mut rel: String = full_chars[base_chars.len()..].iter().collect();
  let last_component = rel.rsplit(['/', '\\']).next().unwrap_or("");
  if !last_component.is_empty() && !last_component.contains('.') {
    let sep = if full.contains('\\') { '\\' } else { '/' };
    rel.push(sep);
  }
  Ok(rel)
}

#[cfg(test)]
mod tests {
  use super::*;

  mod escaping {
    use super::*;

    #[test]
    fn control_and_punctuation_encode_as_hex() {
      assert_eq!(escape_file_name("\r\t!$/^%"), "%0d%09%21%24%2f%5e%25");
    }

    #[test]
    fn wide_chars_encode_as_utf16_units() {
      assert_eq!(escape_file_name("\u{4523}"), "%%4523");
    }

    #[test]
    fn safe_set_is_identity() {
      let s = "0123456789AZaz[]_. \\";
      assert_eq!(escape_file_name(s), s);
    }

    #[test]
    fn unescape_accepts_uppercase_hex() {
      assert_eq!(unescape_file_name("foo-%41"), "foo-A");
    }

    #[test]
    fn unescape_reverses_escape() {
      for s in ["\r\t!$/^%", "\u{4523}", "logo (1).png", "a%b%%c", "emoji \u{1f600} name"] {
        assert_eq!(unescape_file_name(&escape_file_name(s)), s, "round-trip of {:?}", s);
      }
    }

    #[test]
    fn stray_percent_is_literal() {
      assert_eq!(unescape_file_name("100%"), "100%");
      assert_eq!(unescape_file_name("%zz"), "%zz");
      // Double percent with too few digits: first `%` stays literal, the
      // remainder parses as an ordinary `%hh` escape.
      assert_eq!(unescape_file_name("%%12"), "%\u{12}");
    }
  }

  mod normalize {
    use super::*;

    #[test]
    fn slashes_case_and_whitespace() {
      assert_eq!(normalize("  \\Assets\\Images\\Photo.PNG/  "), "assets/images/photo.png");
      assert_eq!(normalize("Header.json"), "header.json");
    }
  }

  mod relative_paths {
    use super::*;

    #[test]
    fn directory_result_gains_trailing_separator() {
      assert_eq!(relative("C:\\Foo\\Bar\\Baz", "C:\\Foo").unwrap(), "Bar\\Baz\\");
    }

    #[test]
    fn file_result_keeps_extension() {
      assert_eq!(relative("C:\\Foo\\Bar.msapp", "C:\\").unwrap(), "Foo\\Bar.msapp");
    }

    #[test]
    fn mismatched_base_fails() {
      assert!(relative("C:\\Other\\Bar", "C:\\Foo").is_err());
    }

    #[test]
    fn forward_slash_paths_work() {
      assert_eq!(relative("/tmp/app/Src/a.pa.yaml", "/tmp/app").unwrap(), "Src/a.pa.yaml");
    }
  }

  mod disk_names {
    use super::*;

    #[test]
    fn leading_separator_becomes_underscore() {
      assert_eq!(archive_to_disk_name("/meta/info"), "_meta/info");
      assert_eq!(archive_to_disk_name("plain.json"), "plain.json");
    }

    #[test]
    fn underscore_restores_separator() {
      assert_eq!(disk_to_archive_name("_meta/info"), "/meta/info");
      assert_eq!(disk_to_archive_name("plain.json"), "plain.json");
    }
  }
}
