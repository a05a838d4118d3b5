//! The in-memory document model.
//!
//! A [`Document`] is the root aggregate both directions of the pipeline work
//! on. It is created empty by either loader, mutated only during load and the
//! explicit transform passes, and treated as read-only by the writers.
//!
//! Phase machine:
//!
//! ```text
//! (empty) --load--> Loaded --after_load--> Ready
//! Ready --write_source--> Ready
//! Ready --before_write--> Writable --write_pkg--> Ready
//! ```
//!
//! Transforms are idempotent only within their direction; mixing directions
//! without reloading is rejected.

pub mod assets;
pub mod control;
pub mod editor_state;
pub mod entropy;
pub mod template;

use std::collections::BTreeMap;

use pasrc_core::diag::DiagCode;
use serde_json::Value;

use crate::ir::IrBlock;
use crate::{Error, Result, FORMAT_VERSION};

pub use assets::{AssetBlob, AssetSidecar, AssetTable, PublishInfo, ResourceEntry, ResourcesManifest};
pub use control::{ControlEnvelope, ControlJson, ComponentDefinitionInfo, JsonMap, RuleEntry};
pub use editor_state::{ControlState, EditorStateStore, PropertyState};
pub use entropy::Entropy;
pub use template::{TemplateState, TemplateStore};

/// Which loader produced the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
  Package,
  Source,
}

/// Where the document sits in the conversion pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
  Loaded,
  Ready,
  Writable,
}

/// The root aggregate.
#[derive(Debug, Clone)]
pub struct Document {
  pub origin: Origin,
  phase: Phase,

  /// Source manifest format version; must match [`FORMAT_VERSION`] exactly.
  pub format_version: String,

  pub properties: Option<Value>,
  pub header: Option<Value>,
  pub publish_info: Option<PublishInfo>,
  pub themes: Option<Value>,
  pub connections: Option<Value>,
  pub component_references: Option<Value>,

  /// Individual data source objects, keyed order restored from entropy.
  pub data_sources: Vec<Value>,

  pub resources: ResourcesManifest,
  pub templates: TemplateStore,
  pub editor_states: EditorStateStore,
  pub assets: AssetTable,

  /// Entries this tool does not recognize, preserved verbatim.
  pub unknown_files: BTreeMap<String, AssetBlob>,

  /// `AppCheckerResult.sarif`, passed through untouched.
  pub checker_result: Option<Vec<u8>>,

  pub entropy: Entropy,
  pub checksum: Option<String>,

  /// Screen names in package enumeration order.
  pub screen_order: Vec<String>,
  pub component_order: Vec<String>,

  /// Package-side control trees, present between load and split and again
  /// after combine.
  pub raw_screens: BTreeMap<String, ControlJson>,
  pub raw_components: BTreeMap<String, ControlJson>,

  /// IR-side control trees, present once the document is Ready.
  pub screens: BTreeMap<String, IrBlock>,
  pub components: BTreeMap<String, IrBlock>,

  /// Sidecars for assets renamed outside the collision scheme.
  pub asset_sidecars: Vec<AssetSidecar>,
}

impl Document {
  /// An empty document in the `Loaded` phase.
  pub fn new(origin: Origin) -> Self {
    Self {
      origin,
      phase: Phase::Loaded,
      format_version: FORMAT_VERSION.to_string(),
      properties: None,
      header: None,
      publish_info: None,
      themes: None,
      connections: None,
      component_references: None,
      data_sources: Vec::new(),
      resources: ResourcesManifest::default(),
      templates: TemplateStore::new(),
      editor_states: EditorStateStore::new(),
      assets: AssetTable::new(),
      unknown_files: BTreeMap::new(),
      checker_result: None,
      entropy: Entropy::new(),
      checksum: None,
      screen_order: Vec::new(),
      component_order: Vec::new(),
      raw_screens: BTreeMap::new(),
      raw_components: BTreeMap::new(),
      screens: BTreeMap::new(),
      components: BTreeMap::new(),
      asset_sidecars: Vec::new(),
    }
  }

  pub fn phase(&self) -> Phase {
    self.phase
  }

  /// Move the phase machine one step; a wrong starting phase means the
  /// caller mixed directions and is an internal error.
  pub(crate) fn advance(&mut self, from: Phase, to: Phase) -> Result<()> {
    if self.phase != from {
      return Err(Error::Fatal {
        code: DiagCode::InternalError,
        message: format!("document phase is {:?}, expected {:?} before {:?}", self.phase, from, to),
      });
    }
    self.phase = to;
    Ok(())
  }

  /// The `Name` of a data source object, where present.
  pub fn data_source_name(value: &Value) -> Option<&str> {
    value.get("Name").and_then(Value::as_str)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn phase_machine_rejects_mixed_directions() {
    let mut doc = Document::new(Origin::Package);
    assert_eq!(doc.phase(), Phase::Loaded);

    doc.advance(Phase::Loaded, Phase::Ready).unwrap();
    assert_eq!(doc.phase(), Phase::Ready);

    // A second after-load pass must fail rather than re-run.
    let err = doc.advance(Phase::Loaded, Phase::Ready).unwrap_err();
    assert_eq!(err.code(), Some(DiagCode::InternalError));

    doc.advance(Phase::Ready, Phase::Writable).unwrap();
    doc.advance(Phase::Writable, Phase::Ready).unwrap();
  }
}
