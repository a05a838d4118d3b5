//! The two transform passes between the wire form and the source form.
//!
//! `after_load` runs on a freshly loaded package document: volatile header
//! fields move into entropy, control trees split into IR plus editor state,
//! and assets stabilize. `before_write` is the mirror pass seeded by entropy.
//! Each pass is idempotent only within its direction; the document phase
//! machine rejects mixing them.

pub mod combine;
pub mod split;
pub mod stabilize;

use pasrc_core::diag::{DiagCode, ErrorContainer};
use serde_json::Value;
use tracing::debug;

use crate::document::{Document, Origin, Phase};
use crate::error::fatal;
use crate::Result;

/// Mutable collaborators threaded through the tree walks.
pub struct TransformCtx<'a> {
  pub diags: &'a mut ErrorContainer,
}

/// `Properties.json` fields that churn on every save and therefore live in
/// entropy rather than the diffable source.
const VOLATILE_PROPERTIES: &[&str] = &["LastSavedDateTimeUTC", "LastPublishTime", "LastControlUniqueId"];

/// Package → source direction. Loaded → Ready.
pub fn after_load(doc: &mut Document, diags: &mut ErrorContainer) -> Result<()> {
  doc.advance(Phase::Loaded, Phase::Ready)?;

  if doc.origin == Origin::Source {
    // The source loader already produced IR; nothing to split.
    return Ok(());
  }

  extract_volatile_properties(doc);
  record_data_source_order(doc);

  // Components split before screens so their templates (and custom
  // properties) are registered when instances are reached.
  let raw_components = std::mem::take(&mut doc.raw_components);
  let raw_screens = std::mem::take(&mut doc.raw_screens);
  {
    let mut ctx = TransformCtx { diags: &mut *diags };
    for name in doc.component_order.clone() {
      let Some(tree) = raw_components.get(&name) else { continue };
      let ir = split::split_tree(tree, doc, &mut ctx)?;
      doc.components.insert(name, ir);
    }
    for name in doc.screen_order.clone() {
      let Some(tree) = raw_screens.get(&name) else { continue };
      let ir = split::split_tree(tree, doc, &mut ctx)?;
      doc.screens.insert(name, ir);
    }
  }
  debug!(screens = doc.screens.len(), components = doc.components.len(), "split complete");

  stabilize::stabilize_assets(doc, diags)?;
  validate_asset_manifest(doc, diags);
  Ok(())
}

/// Source → package direction. Ready → Writable.
pub fn before_write(doc: &mut Document, diags: &mut ErrorContainer) -> Result<()> {
  doc.advance(Phase::Ready, Phase::Writable)?;

  let mut tracker = combine::CombineTracker::default();
  let components = std::mem::take(&mut doc.components);
  let screens = std::mem::take(&mut doc.screens);
  {
    let mut ctx = TransformCtx { diags: &mut *diags };
    // Definitions first: their combine rewrites the scope-rule defaults that
    // instance dummy rules read.
    for name in doc.component_order.clone() {
      let Some(ir) = components.get(&name) else { continue };
      let ctrl = combine::combine_tree(ir, doc, &mut tracker, &mut ctx)?;
      doc.raw_components.insert(name, ctrl);
    }
    for name in doc.screen_order.clone() {
      let Some(ir) = screens.get(&name) else { continue };
      let ctrl = combine::combine_tree(ir, doc, &mut tracker, &mut ctx)?;
      doc.raw_screens.insert(name, ctrl);
    }
  }
  doc.components = components;
  doc.screens = screens;

  // Every editor state must correspond to exactly one combined control.
  for state in doc.editor_states.iter() {
    if !tracker.seen.contains(&state.name) {
      diags.report(
        DiagCode::ValidationWarning,
        format!("editor state {:?} has no matching control", state.name),
      );
    }
  }

  restore_volatile_properties(doc);
  restore_data_source_order(doc);
  stabilize::unstabilize_assets(doc, diags)?;
  Ok(())
}

/// Finish a write: Writable → Ready.
pub fn after_write(doc: &mut Document) -> Result<()> {
  doc.advance(Phase::Writable, Phase::Ready)
}

fn extract_volatile_properties(doc: &mut Document) {
  let Some(Value::Object(props)) = doc.properties.as_mut() else { return };
  for key in VOLATILE_PROPERTIES {
    if let Some(value) = props.remove(*key) {
      doc.entropy.volatile_properties.insert((*key).to_string(), value);
    }
  }
}

fn restore_volatile_properties(doc: &mut Document) {
  if doc.entropy.volatile_properties.is_empty() {
    return;
  }
  if doc.properties.is_none() {
    doc.properties = Some(Value::Object(Default::default()));
  }
  let Some(Value::Object(props)) = doc.properties.as_mut() else { return };
  for (key, value) in &doc.entropy.volatile_properties {
    props.insert(key.clone(), value.clone());
  }
}

fn record_data_source_order(doc: &mut Document) {
  for (i, source) in doc.data_sources.iter().enumerate() {
    if let Some(name) = Document::data_source_name(source) {
      doc.entropy.data_source_order.insert(name.to_string(), i as u32);
    }
  }
  doc
    .data_sources
    .sort_by_key(|s| Document::data_source_name(s).unwrap_or_default().to_string());
}

fn restore_data_source_order(doc: &mut Document) {
  doc.data_sources.sort_by_key(|s| {
    Document::data_source_name(s)
      .and_then(|name| doc.entropy.data_source_order.get(name))
      .copied()
      .unwrap_or(u32::MAX)
  });
}

/// I5: the manifest and the asset table must agree.
fn validate_asset_manifest(doc: &Document, diags: &mut ErrorContainer) {
  let mut referenced: Vec<String> = doc
    .resources
    .resources
    .iter()
    .filter(|r| r.is_local_file())
    .map(|r| pasrc_core::paths::normalize(&r.path))
    .collect();
  if let Some(publish) = &doc.publish_info {
    if !publish.logo_file_name.is_empty() {
      referenced.push(pasrc_core::paths::normalize(&format!(
        "{}/{}",
        stabilize::ASSET_PREFIX,
        publish.logo_file_name
      )));
    }
  }

  for path in &referenced {
    if !doc.assets.contains(path) {
      diags.report(
        DiagCode::ValidationWarning,
        format!("manifest references missing asset {:?}", path),
      );
    }
  }
  for (path, _) in doc.assets.iter() {
    if !referenced.iter().any(|r| r == path) {
      diags.report(DiagCode::ValidationWarning, format!("asset {:?} has no manifest entry", path));
    }
  }
}

/// Convenience wrapper used by the CLI: a fatal error from a transform that
/// is not already diagnostics-backed becomes an `InternalError` record.
pub fn run_guarded<T>(
  diags: &mut ErrorContainer,
  run: impl FnOnce(&mut ErrorContainer) -> Result<T>,
) -> Result<T> {
  match run(diags) {
    Ok(value) => Ok(value),
    Err(err) => {
      if err.code().is_none() {
        Err(fatal(diags, DiagCode::InternalError, err.to_string()))
      } else {
        Err(err)
      }
    }
  }
}
