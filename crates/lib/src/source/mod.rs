//! The sharded on-disk source tree.
//!
//! # Layout
//!
//! ```text
//! <root>/
//! ├── CanvasManifest.json
//! ├── ControlTemplates.json
//! ├── ComponentReferences.json        (optional)
//! ├── Connections/Connections.json    (optional)
//! ├── Src/
//! │   ├── <screen>.pa.yaml
//! │   ├── Themes.json
//! │   ├── Components/<name>.pa.yaml (+ <name>.json)
//! │   ├── Tests/<name>.pa.yaml
//! │   └── EditorState/<topParent>.editorstate.json
//! ├── pkgs/                           (regenerated convenience copies)
//! ├── DataSources/<dataSource>.json
//! ├── Assets/<resource files> + Resources.json
//! ├── Entropy/Entropy.json + Checksum.json (+ AppCheckerResult.sarif)
//! └── Other/<unknown files, verbatim>
//! ```

pub mod read;
pub mod write;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::document::PublishInfo;

pub use read::read_source;
pub use write::write_source;

pub const CANVAS_MANIFEST: &str = "CanvasManifest.json";
pub const CONTROL_TEMPLATES: &str = "ControlTemplates.json";
pub const COMPONENT_REFERENCES: &str = "ComponentReferences.json";
pub const CONNECTIONS_DIR: &str = "Connections";
pub const CONNECTIONS_FILE: &str = "Connections.json";
pub const SRC_DIR: &str = "Src";
pub const COMPONENTS_DIR: &str = "Components";
pub const TESTS_DIR: &str = "Tests";
pub const EDITOR_STATE_DIR: &str = "EditorState";
pub const THEMES_FILE: &str = "Themes.json";
pub const PKGS_DIR: &str = "pkgs";
pub const TABLE_DEFINITIONS_DIR: &str = "TableDefinitions";
pub const WADL_DIR: &str = "Wadl";
pub const SWAGGER_DIR: &str = "Swagger";
pub const DATA_SOURCES_DIR: &str = "DataSources";
pub const ASSETS_DIR: &str = "Assets";
pub const RESOURCES_FILE: &str = "Resources.json";
pub const ENTROPY_DIR: &str = "Entropy";
pub const ENTROPY_FILE: &str = "Entropy.json";
pub const CHECKSUM_FILE: &str = "Checksum.json";
pub const CHECKER_RESULT_FILE: &str = "AppCheckerResult.sarif";
pub const OTHER_DIR: &str = "Other";

pub const CONTROL_EXT: &str = ".pa.yaml";
pub const EDITOR_STATE_EXT: &str = ".editorstate.json";

/// `CanvasManifest.json`: the scalar headers plus enumeration order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CanvasManifest {
  pub format_version: String,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub properties: Option<Value>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub header: Option<Value>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub publish_info: Option<PublishInfo>,

  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub screen_order: Vec<String>,

  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub component_order: Vec<String>,
}

/// `Src/EditorState/<topParent>.editorstate.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EditorStateFile {
  pub top_parent_name: String,

  #[serde(default)]
  pub control_states: std::collections::BTreeMap<String, crate::document::ControlState>,
}

/// `ControlTemplates.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ControlTemplatesFile {
  #[serde(default)]
  pub templates: Vec<crate::document::TemplateState>,
}
