//! Wire shapes for control trees as they appear inside the package.
//!
//! Every struct carries a flattened, insertion-ordered extension map: fields
//! this tool does not model must survive a round trip byte-for-byte, so they
//! are never funneled through a typed shape.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::document::template::TemplateState;

/// Ordered map of raw JSON values (requires serde_json's `preserve_order`).
pub type JsonMap = serde_json::Map<String, Value>;

/// Rule provider recorded when no editor state exists for a property.
pub const RULE_PROVIDER_UNKNOWN: &str = "Unknown";

fn default_rule_provider() -> String {
  RULE_PROVIDER_UNKNOWN.to_string()
}

/// Envelope of a `Controls/<n>.json` or `Components/<n>.json` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ControlEnvelope {
  pub top_parent: ControlJson,
}

/// One control node in a package tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ControlJson {
  pub name: String,

  #[serde(default)]
  pub control_unique_id: String,

  #[serde(default)]
  pub variant_name: String,

  #[serde(default)]
  pub parent: String,

  /// Position among siblings when packed (`parentIndex` in the state model).
  #[serde(default = "ControlJson::default_index")]
  pub index: f64,

  #[serde(default)]
  pub publish_order_index: i64,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub style_name: Option<String>,

  pub template: TemplateState,

  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub rules: Vec<RuleEntry>,

  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub children: Vec<ControlJson>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub component_definition_info: Option<ComponentDefinitionInfo>,

  #[serde(flatten)]
  pub extension_data: JsonMap,
}

impl ControlJson {
  fn default_index() -> f64 {
    -1.0
  }

  /// The control's `ZIndex` rule parsed as a double; non-numeric or missing
  /// parses to -1 so such children sort first.
  pub fn z_index(&self) -> f64 {
    self
      .rules
      .iter()
      .find(|r| r.property == "ZIndex")
      .and_then(|r| r.invariant_script.trim().parse::<f64>().ok())
      .unwrap_or(-1.0)
  }
}

/// One property rule on a control.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RuleEntry {
  pub property: String,

  #[serde(default)]
  pub invariant_script: String,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name_map: Option<Value>,

  #[serde(default = "default_rule_provider")]
  pub rule_provider_type: String,

  #[serde(flatten)]
  pub extension_data: JsonMap,
}

impl RuleEntry {
  pub fn new(property: impl Into<String>, script: impl Into<String>) -> Self {
    Self {
      property: property.into(),
      invariant_script: script.into(),
      name_map: None,
      rule_provider_type: default_rule_provider(),
      extension_data: JsonMap::new(),
    }
  }
}

/// Metadata attached to a component definition's root control.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ComponentDefinitionInfo {
  pub name: String,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub last_modified_timestamp: Option<String>,

  /// Child control names in packed order.
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub children_order: Vec<String>,

  #[serde(flatten)]
  pub extension_data: JsonMap,
}
