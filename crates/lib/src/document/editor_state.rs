//! Per-control presentation metadata and its store.
//!
//! Editor state is everything split peels off a control that is not logical
//! structure: ordering, style, publish indices, and the opaque extension
//! bags. It lives in `Src/EditorState/<topParent>.editorstate.json` files in
//! the source tree and is keyed document-wide by control name.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::document::control::JsonMap;

/// Presentation state for one control.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ControlState {
  pub name: String,

  #[serde(default)]
  pub top_parent_name: String,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub publish_order_index: Option<i64>,

  /// Position among siblings in the packed tree.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub parent_index: Option<f64>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub style_name: Option<String>,

  /// Property states in the package's original rule order. This ordering is
  /// the only one that round-trips.
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub properties: Vec<PropertyState>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub is_component_definition: Option<bool>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub gallery_template_child_name: Option<String>,

  /// The control's opaque wire fields, reattached verbatim on combine.
  #[serde(default, skip_serializing_if = "JsonMap::is_empty")]
  pub extension_data: JsonMap,
}

/// Presentation state for one property rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PropertyState {
  pub property_name: String,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name_map: Option<Value>,

  #[serde(default)]
  pub rule_provider_type: String,

  #[serde(default, skip_serializing_if = "JsonMap::is_empty")]
  pub extension_data: JsonMap,
}

/// Error from inserting a duplicate control name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateState {
  pub name: String,
}

/// Document-wide store of control states, keyed by control name
/// (case-sensitive).
#[derive(Debug, Default, Clone)]
pub struct EditorStateStore {
  states: BTreeMap<String, ControlState>,
}

impl EditorStateStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Insert a state; a name already present is a duplicate.
  pub fn insert(&mut self, state: ControlState) -> Result<(), DuplicateState> {
    let name = state.name.clone();
    if self.states.contains_key(&name) {
      return Err(DuplicateState { name });
    }
    self.states.insert(name, state);
    Ok(())
  }

  /// Insert, silently replacing an existing entry. Used inside test-suite
  /// subtrees where duplicate names are permitted.
  pub fn insert_or_replace(&mut self, state: ControlState) {
    self.states.insert(state.name.clone(), state);
  }

  pub fn get(&self, name: &str) -> Option<&ControlState> {
    self.states.get(name)
  }

  pub fn get_mut(&mut self, name: &str) -> Option<&mut ControlState> {
    self.states.get_mut(name)
  }

  pub fn contains(&self, name: &str) -> bool {
    self.states.contains_key(name)
  }

  pub fn len(&self) -> usize {
    self.states.len()
  }

  pub fn is_empty(&self) -> bool {
    self.states.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = &ControlState> {
    self.states.values()
  }

  /// Group states by their top parent, preserving name order inside each
  /// group. Drives the per-file sharding of the source tree.
  pub fn by_top_parent(&self) -> BTreeMap<&str, Vec<&ControlState>> {
    let mut groups: BTreeMap<&str, Vec<&ControlState>> = BTreeMap::new();
    for state in self.states.values() {
      groups.entry(state.top_parent_name.as_str()).or_default().push(state);
    }
    groups
  }
}
