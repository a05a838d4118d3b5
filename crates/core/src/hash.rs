//! Hash computation for checksums and content addressing.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::Result;

/// Compute the SHA-256 hash of a byte slice and return it as lowercase hex.
pub fn hash_bytes(data: &[u8]) -> String {
  let mut hasher = Sha256::new();
  hasher.update(data);
  hex::encode(hasher.finalize())
}

/// Compute the SHA-256 hash of file contents and return it as lowercase hex.
pub fn hash_file(path: &Path) -> Result<String> {
  let file = File::open(path)?;
  let mut reader = BufReader::new(file);
  let mut hasher = Sha256::new();

  let mut buffer = [0u8; 8192];
  loop {
    let bytes_read = reader.read(&mut buffer)?;
    if bytes_read == 0 {
      break;
    }
    hasher.update(&buffer[..bytes_read]);
  }

  Ok(hex::encode(hasher.finalize()))
}

/// An incremental SHA-256 digest over a sequence of named parts.
///
/// Parts are fed as `(name, content-digest)` pairs separated by a zero byte so
/// that entry boundaries cannot alias.
#[derive(Default)]
pub struct PartDigest {
  hasher: Sha256,
}

impl PartDigest {
  pub fn new() -> Self {
    Self::default()
  }

  /// Feed one named part.
  pub fn add_part(&mut self, name: &str, content_digest: &str) {
    self.hasher.update(name.as_bytes());
    self.hasher.update([0u8]);
    self.hasher.update(content_digest.as_bytes());
    self.hasher.update([0u8]);
  }

  /// Finish and return the aggregate digest as lowercase hex.
  pub fn finish(self) -> String {
    hex::encode(self.hasher.finalize())
  }
}
