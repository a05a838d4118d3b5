//! Source tree writer: a `Ready` document onto disk.
//!
//! Files are written atomically (temp file, then rename). JSON owned by the
//! tool keeps its insertion order; passthrough files under `Other/` are
//! canonicalized so their diffs stay quiet.

use std::fs;
use std::path::{Path, PathBuf};

use pasrc_core::diag::{DiagCode, ErrorContainer};
use pasrc_core::json::{canonicalize, to_pretty_bytes};
use pasrc_core::paths::{archive_to_disk_name, escape_file_name};
use serde::Serialize;
use tracing::debug;

use crate::document::template::is_test_template;
use crate::document::{Document, Phase};
use crate::dsl::print_document;
use crate::error::fatal;
use crate::ir::IrBlock;
use crate::pkg::checksum::{ChecksumJson, CHECKSUM_VERSION};
use crate::source::*;
use crate::Result;

/// Write the document as a source tree rooted at `root`.
pub fn write_source(doc: &Document, root: &Path, diags: &mut ErrorContainer) -> Result<()> {
  if doc.phase() != Phase::Ready {
    return Err(fatal(
      diags,
      DiagCode::InternalError,
      "write_source requires a Ready document (run the after-load transform first)",
    ));
  }

  write_manifest(doc, root)?;
  write_templates(doc, root)?;
  write_trees(doc, root)?;
  write_editor_state(doc, root)?;
  write_references(doc, root)?;
  write_assets(doc, root)?;
  write_pkgs(doc, root)?;
  write_entropy(doc, root)?;
  write_other(doc, root)?;

  debug!(root = %root.display(), "source tree written");
  Ok(())
}

/// Atomic write: temp file in the target directory, then rename.
fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
  if let Some(parent) = path.parent() {
    fs::create_dir_all(parent)?;
  }
  let temp = path.with_extension("tmp");
  fs::write(&temp, bytes)?;
  fs::rename(&temp, path)?;
  Ok(())
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
  let bytes = to_pretty_bytes(&serde_json::to_value(value)?)?;
  write_file(path, &bytes)
}

/// Escape every path component for disk.
fn disk_path(root: &Path, archive_path: &str) -> PathBuf {
  let mut path = root.to_path_buf();
  for component in archive_path.split('/') {
    path.push(escape_file_name(component));
  }
  path
}

fn write_manifest(doc: &Document, root: &Path) -> Result<()> {
  let manifest = CanvasManifest {
    format_version: doc.format_version.clone(),
    properties: doc.properties.clone(),
    header: doc.header.clone(),
    publish_info: doc.publish_info.clone(),
    screen_order: doc.screen_order.clone(),
    component_order: doc.component_order.clone(),
  };
  write_json(&root.join(CANVAS_MANIFEST), &manifest)
}

fn write_templates(doc: &Document, root: &Path) -> Result<()> {
  // Component templates live next to their component source; everything else
  // goes into the shared manifest.
  let shared = ControlTemplatesFile {
    templates: doc.templates.iter().filter(|t| !t.is_component_template).cloned().collect(),
  };
  write_json(&root.join(CONTROL_TEMPLATES), &shared)
}

fn tree_file_name(ir: &IrBlock) -> String {
  format!("{}{}", escape_file_name(&ir.name.identifier), CONTROL_EXT)
}

fn write_trees(doc: &Document, root: &Path) -> Result<()> {
  let src = root.join(SRC_DIR);

  for ir in doc.screens.values() {
    let dir = if is_test_template(&ir.name.kind.type_name) {
      src.join(TESTS_DIR)
    } else {
      src.clone()
    };
    write_file(&dir.join(tree_file_name(ir)), print_document(ir).as_bytes())?;
  }

  let components_dir = src.join(COMPONENTS_DIR);
  for ir in doc.components.values() {
    write_file(&components_dir.join(tree_file_name(ir)), print_document(ir).as_bytes())?;

    // The component's template rides along as a JSON sidecar.
    if let Some(template) = doc.templates.resolve(&ir.name.kind.type_name) {
      let file = format!("{}.json", escape_file_name(&ir.name.identifier));
      write_json(&components_dir.join(file), template)?;
    }
  }

  if let Some(themes) = &doc.themes {
    write_file(&src.join(THEMES_FILE), &to_pretty_bytes(themes)?)?;
  }
  Ok(())
}

fn write_editor_state(doc: &Document, root: &Path) -> Result<()> {
  let dir = root.join(SRC_DIR).join(EDITOR_STATE_DIR);
  for (top_parent, states) in doc.editor_states.by_top_parent() {
    let file = EditorStateFile {
      top_parent_name: top_parent.to_string(),
      control_states: states.iter().map(|s| (s.name.clone(), (*s).clone())).collect(),
    };
    let name = format!("{}{}", escape_file_name(top_parent), EDITOR_STATE_EXT);
    write_json(&dir.join(name), &file)?;
  }
  Ok(())
}

fn write_references(doc: &Document, root: &Path) -> Result<()> {
  if let Some(connections) = &doc.connections {
    write_file(
      &root.join(CONNECTIONS_DIR).join(CONNECTIONS_FILE),
      &to_pretty_bytes(connections)?,
    )?;
  }
  if let Some(refs) = &doc.component_references {
    write_file(&root.join(COMPONENT_REFERENCES), &to_pretty_bytes(refs)?)?;
  }
  for source in &doc.data_sources {
    let Some(name) = Document::data_source_name(source) else { continue };
    let file = format!("{}.json", escape_file_name(name));
    write_file(&root.join(DATA_SOURCES_DIR).join(file), &to_pretty_bytes(source)?)?;
  }
  Ok(())
}

fn write_assets(doc: &Document, root: &Path) -> Result<()> {
  for (_, blob) in doc.assets.iter() {
    write_file(&disk_path(root, &blob.original_path), &blob.bytes)?;
  }
  write_json(&root.join(ASSETS_DIR).join(RESOURCES_FILE), &doc.resources)?;

  // Sidecars for assets renamed outside the collision scheme, written next
  // to the asset as `<file>.json`.
  for sidecar in &doc.asset_sidecars {
    let path = disk_path(root, &format!("{}.json", sidecar.path));
    write_json(&path, sidecar)?;
  }
  Ok(())
}

/// Convenience copies under `pkgs/`: template XML, table definitions, and
/// connector descriptions. Regenerated from the same data on every unpack;
/// the reader ignores them.
fn write_pkgs(doc: &Document, root: &Path) -> Result<()> {
  let pkgs = root.join(PKGS_DIR);

  for template in doc.templates.iter() {
    if let Some(xml) = &template.template_xml {
      let file = format!("{}_{}.xml", escape_file_name(&template.name), escape_file_name(&template.version));
      write_file(&pkgs.join(file), xml.as_bytes())?;
    }
  }

  for source in &doc.data_sources {
    let (Some(name), Some(table)) = (
      Document::data_source_name(source),
      source.get("TableDefinition").and_then(|v| v.as_str()),
    ) else {
      continue;
    };
    let file = format!("{}.json", escape_file_name(name));
    write_file(&pkgs.join(TABLE_DEFINITIONS_DIR).join(file), table.as_bytes())?;
  }

  if let Some(connections) = doc.connections.as_ref().and_then(|c| c.as_object()) {
    for (id, connection) in connections {
      if let Some(wadl) = connection.get("WadlMetadata").and_then(|v| v.as_str()) {
        let file = format!("{}.xml", escape_file_name(id));
        write_file(&pkgs.join(WADL_DIR).join(file), wadl.as_bytes())?;
      }
      if let Some(swagger) = connection.get("OpenApiDefinition") {
        let file = format!("{}.json", escape_file_name(id));
        write_file(&pkgs.join(SWAGGER_DIR).join(file), &to_pretty_bytes(swagger)?)?;
      }
    }
  }
  Ok(())
}

fn write_entropy(doc: &Document, root: &Path) -> Result<()> {
  let dir = root.join(ENTROPY_DIR);
  write_json(&dir.join(ENTROPY_FILE), &doc.entropy)?;

  if let Some(checksum) = &doc.checksum {
    let body = ChecksumJson {
      checksum_version: CHECKSUM_VERSION,
      checksum: checksum.clone(),
    };
    write_json(&dir.join(CHECKSUM_FILE), &body)?;
  }
  if let Some(sarif) = &doc.checker_result {
    write_file(&dir.join(CHECKER_RESULT_FILE), sarif)?;
  }
  Ok(())
}

fn write_other(doc: &Document, root: &Path) -> Result<()> {
  let dir = root.join(OTHER_DIR);
  for blob in doc.unknown_files.values() {
    let disk_name = archive_to_disk_name(&blob.original_path);
    let path = disk_path(&dir, &disk_name);

    // JSON passthrough files are normalized for determinism; the reader
    // hands them back to the package as the bytes written here.
    let is_json = disk_name.to_lowercase().ends_with(".json");
    let bytes = if is_json {
      canonicalize(&blob.bytes).unwrap_or_else(|_| blob.bytes.clone())
    } else {
      blob.bytes.clone()
    };
    write_file(&path, &bytes)?;
  }
  Ok(())
}
