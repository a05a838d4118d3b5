//! Binary asset entries and the resource manifest that describes them.

use std::collections::BTreeMap;

use pasrc_core::paths;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::document::control::JsonMap;

/// Resource content kind subject to file-name stabilization.
pub const CONTENT_LOCAL_FILE: &str = "LocalFile";

/// One binary asset from the package.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetBlob {
  /// Archive path with original casing, used when writing the package back.
  pub original_path: String,
  pub bytes: Vec<u8>,
}

/// Table of asset entries keyed by normalized archive path.
#[derive(Debug, Default, Clone)]
pub struct AssetTable {
  entries: BTreeMap<String, AssetBlob>,
}

impl AssetTable {
  pub fn new() -> Self {
    Self::default()
  }

  /// Insert an asset under its archive path. A second path that normalizes
  /// to the same key is dropped: first wins, with a warning.
  pub fn insert(&mut self, archive_path: &str, bytes: Vec<u8>) {
    let key = paths::normalize(archive_path);
    if self.entries.contains_key(&key) {
      warn!(path = archive_path, "duplicate asset path after normalization, keeping first");
      return;
    }
    self.entries.insert(
      key,
      AssetBlob {
        original_path: archive_path.to_string(),
        bytes,
      },
    );
  }

  pub fn get(&self, archive_path: &str) -> Option<&AssetBlob> {
    self.entries.get(&paths::normalize(archive_path))
  }

  pub fn contains(&self, archive_path: &str) -> bool {
    self.entries.contains_key(&paths::normalize(archive_path))
  }

  pub fn remove(&mut self, archive_path: &str) -> Option<AssetBlob> {
    self.entries.remove(&paths::normalize(archive_path))
  }

  /// Move an asset to a new archive path, keeping its bytes.
  pub fn rename(&mut self, from: &str, to: &str) -> bool {
    match self.remove(from) {
      Some(blob) => {
        self.insert(to, blob.bytes);
        true
      }
      None => false,
    }
  }

  /// Entries in normalized-path order.
  pub fn iter(&self) -> impl Iterator<Item = (&str, &AssetBlob)> {
    self.entries.iter().map(|(k, v)| (k.as_str(), v))
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }
}

/// `References/Resources.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResourcesManifest {
  #[serde(default)]
  pub resources: Vec<ResourceEntry>,

  #[serde(flatten)]
  pub extension_data: JsonMap,
}

/// One manifest entry pointing at a local asset blob or an external URI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResourceEntry {
  pub name: String,

  #[serde(default)]
  pub content: String,

  /// Archive path of the backing blob (for local files).
  #[serde(default)]
  pub path: String,

  #[serde(default)]
  pub file_name: String,

  #[serde(flatten)]
  pub extension_data: JsonMap,
}

impl ResourceEntry {
  pub fn is_local_file(&self) -> bool {
    self.content == CONTENT_LOCAL_FILE
  }

  /// Extension of the backing file including the leading dot, or "".
  pub fn file_extension(&self) -> &str {
    match self.file_name.rfind('.') {
      Some(i) => &self.file_name[i..],
      None => "",
    }
  }

  /// File name without its extension.
  pub fn file_stem(&self) -> &str {
    match self.file_name.rfind('.') {
      Some(i) => &self.file_name[..i],
      None => &self.file_name,
    }
  }
}

/// `PublishInfo.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PublishInfo {
  #[serde(default)]
  pub logo_file_name: String,

  #[serde(flatten)]
  pub extension_data: JsonMap,
}

/// Sidecar written next to an asset renamed for a non-collision reason, so
/// pack can restore the original name even without entropy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AssetSidecar {
  pub original_name: String,
  pub new_file_name: String,
  pub path: String,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn insert_is_case_insensitive_first_wins() {
    let mut table = AssetTable::new();
    table.insert("Assets/Images/Photo.png", vec![1]);
    table.insert("assets/images/photo.PNG", vec![2]);

    assert_eq!(table.len(), 1);
    let blob = table.get("ASSETS/IMAGES/PHOTO.PNG").unwrap();
    assert_eq!(blob.bytes, vec![1]);
    assert_eq!(blob.original_path, "Assets/Images/Photo.png");
  }

  #[test]
  fn rename_moves_bytes() {
    let mut table = AssetTable::new();
    table.insert("Assets/a.png", vec![7]);
    assert!(table.rename("Assets/a.png", "Assets/b.png"));
    assert!(table.get("Assets/a.png").is_none());
    assert_eq!(table.get("Assets/b.png").unwrap().bytes, vec![7]);
    assert!(!table.rename("Assets/missing.png", "Assets/x.png"));
  }

  #[test]
  fn resource_extension_helpers() {
    let entry = ResourceEntry {
      name: "Photo".to_string(),
      content: CONTENT_LOCAL_FILE.to_string(),
      path: "Assets/Images/e6c4d3-ab.png".to_string(),
      file_name: "e6c4d3-ab.png".to_string(),
      extension_data: JsonMap::new(),
    };
    assert!(entry.is_local_file());
    assert_eq!(entry.file_extension(), ".png");
    assert_eq!(entry.file_stem(), "e6c4d3-ab");

    let bare = ResourceEntry {
      file_name: "noext".to_string(),
      ..entry
    };
    assert_eq!(bare.file_extension(), "");
    assert_eq!(bare.file_stem(), "noext");
  }
}
