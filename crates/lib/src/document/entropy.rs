//! The entropy side-channel.
//!
//! Every value that is volatile or non-semantic — timestamps, auto-generated
//! identifiers, insertion orders, ambiguous normalizations — lands here
//! instead of in the diffable source files. Writers that normalize a value
//! record its original form; readers that rehydrate consult it. Missing
//! entropy is never fatal: each consumer has a deterministic fallback.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::document::control::JsonMap;

/// Side-channel of non-semantic state, persisted as `Entropy/Entropy.json`.
///
/// Fields unknown to this version are preserved through the flattened tail.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entropy {
  /// Control name → unique id from the package.
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub control_unique_ids: BTreeMap<String, u64>,

  /// Logo file name before normalization to `logo<ext>`.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub old_logo_file_name: Option<String>,

  /// Renamed asset file stem → original file name.
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub local_resource_file_names: BTreeMap<String, String>,

  /// Resource name → position in the original manifest array.
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub resource_order: BTreeMap<String, u32>,

  /// Header fields moved out of `Properties.json` because they churn.
  #[serde(default, skip_serializing_if = "JsonMap::is_empty")]
  pub volatile_properties: JsonMap,

  /// Data source name → position in the original manifest array.
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub data_source_order: BTreeMap<String, u32>,

  /// Control name → original archive entry path of its tree.
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub control_file_names: BTreeMap<String, String>,

  #[serde(flatten)]
  pub extra: JsonMap,
}

impl Entropy {
  pub fn new() -> Self {
    Self::default()
  }

  /// Record a control's unique id as parsed from the package.
  pub fn record_unique_id(&mut self, control: &str, id: u64) {
    self.control_unique_ids.insert(control.to_string(), id);
  }

  pub fn unique_id(&self, control: &str) -> Option<u64> {
    self.control_unique_ids.get(control).copied()
  }

  /// Mint an id for a control the entropy does not know: one past the
  /// largest id present, so the choice is deterministic and collision-free.
  pub fn mint_unique_id(&mut self, control: &str) -> u64 {
    let next = self.control_unique_ids.values().max().copied().unwrap_or(0) + 1;
    self.control_unique_ids.insert(control.to_string(), next);
    next
  }

  /// Record the original file name behind a stabilized asset name.
  pub fn record_resource_file_name(&mut self, renamed_stem: &str, original: &str) {
    self
      .local_resource_file_names
      .insert(renamed_stem.to_string(), original.to_string());
  }

  pub fn resource_file_name(&self, renamed_stem: &str) -> Option<&str> {
    self.local_resource_file_names.get(renamed_stem).map(String::as_str)
  }

  /// Next fresh numeric asset name, 4-digit zero-padded, greater than any
  /// number recorded among the original file names.
  pub fn next_resource_number(&self) -> u32 {
    let max_seen = self
      .local_resource_file_names
      .values()
      .filter_map(|original| {
        let stem = original.rsplit_once('.').map(|(s, _)| s).unwrap_or(original);
        stem.parse::<u32>().ok()
      })
      .max()
      .unwrap_or(0);
    max_seen + 1
  }
}
