//! Source tree reader: a directory on disk into a `Loaded` document.
//!
//! Each file parses independently; a failure produces a `ParseError`
//! diagnostic and the remaining files keep loading. The load as a whole
//! fails afterwards if any error was recorded.

use std::fs;
use std::path::{Path, PathBuf};

use pasrc_core::diag::{DiagCode, ErrorContainer, SourceSpan};
use pasrc_core::paths::{disk_to_archive_name, relative, unescape_file_name};
use serde::de::DeserializeOwned;
use tracing::debug;
use walkdir::WalkDir;

use crate::document::{Document, Entropy, Origin};
use crate::dsl::parse_document;
use crate::error::fatal;
use crate::pkg::checksum::ChecksumJson;
use crate::source::*;
use crate::{Result, FORMAT_VERSION};

/// Load a source tree rooted at `root` into a `Loaded` document.
pub fn read_source(root: &Path, diags: &mut ErrorContainer) -> Result<Document> {
  let manifest_path = root.join(CANVAS_MANIFEST);
  if !manifest_path.exists() {
    return Err(fatal(
      diags,
      DiagCode::FormatNotSupported,
      format!("{} is not a source tree (missing {})", root.display(), CANVAS_MANIFEST),
    ));
  }

  let manifest: CanvasManifest = read_json_required(&manifest_path, diags)?;
  if manifest.format_version != FORMAT_VERSION {
    return Err(fatal(
      diags,
      DiagCode::FormatNotSupported,
      format!(
        "source tree has format version {}, this build requires {}",
        manifest.format_version, FORMAT_VERSION
      ),
    ));
  }

  let mut doc = Document::new(Origin::Source);
  doc.format_version = manifest.format_version;
  doc.properties = manifest.properties;
  doc.header = manifest.header;
  doc.publish_info = manifest.publish_info;
  doc.screen_order = manifest.screen_order;
  doc.component_order = manifest.component_order;

  read_templates(&mut doc, root, diags);
  read_trees(&mut doc, root, diags);
  read_editor_state(&mut doc, root, diags)?;
  read_references(&mut doc, root, diags);
  read_assets(&mut doc, root, diags);
  read_entropy(&mut doc, root, diags);
  read_other(&mut doc, root)?;

  reconcile_order(&mut doc);

  if diags.has_errors() {
    return Err(crate::Error::Fatal {
      code: DiagCode::ParseError,
      message: format!("source tree {} has errors", root.display()),
    });
  }

  debug!(
    screens = doc.screens.len(),
    components = doc.components.len(),
    assets = doc.assets.len(),
    "source tree loaded"
  );
  Ok(doc)
}

fn read_json_required<T: DeserializeOwned>(path: &Path, diags: &mut ErrorContainer) -> Result<T> {
  let bytes =
    fs::read(path).map_err(|e| fatal(diags, DiagCode::BadParameter, format!("cannot read {}: {}", path.display(), e)))?;
  match serde_json::from_slice(&bytes) {
    Ok(value) => Ok(value),
    Err(e) => Err(crate::error::fatal_at(
      diags,
      DiagCode::ParseError,
      format!("cannot parse {}: {}", path.display(), e),
      SourceSpan::point(path.display().to_string(), e.line() as u32, e.column() as u32),
    )),
  }
}

/// Parse one JSON file; a failure is a per-file diagnostic, not a bail-out.
fn read_json<T: DeserializeOwned>(path: &Path, diags: &mut ErrorContainer) -> Option<T> {
  let bytes = match fs::read(path) {
    Ok(bytes) => bytes,
    Err(e) => {
      diags.report(DiagCode::ParseError, format!("cannot read {}: {}", path.display(), e));
      return None;
    }
  };
  match serde_json::from_slice(&bytes) {
    Ok(value) => Some(value),
    Err(e) => {
      diags.report_at(
        DiagCode::ParseError,
        format!("cannot parse {}: {}", path.display(), e),
        SourceSpan::point(path.display().to_string(), e.line() as u32, e.column() as u32),
      );
      None
    }
  }
}

/// Files directly inside `dir` with the given suffix, sorted by name.
fn files_with_suffix(dir: &Path, suffix: &str) -> Vec<PathBuf> {
  let Ok(entries) = fs::read_dir(dir) else { return Vec::new() };
  let mut paths: Vec<PathBuf> = entries
    .filter_map(|e| e.ok())
    .map(|e| e.path())
    .filter(|p| p.is_file())
    .filter(|p| p.file_name().and_then(|n| n.to_str()).is_some_and(|n| n.ends_with(suffix)))
    .collect();
  paths.sort();
  paths
}

fn read_templates(doc: &mut Document, root: &Path, diags: &mut ErrorContainer) {
  let path = root.join(CONTROL_TEMPLATES);
  if !path.exists() {
    return;
  }
  if let Some(file) = read_json::<ControlTemplatesFile>(&path, diags) {
    for template in file.templates {
      doc.templates.insert(template);
    }
  }
}

fn read_tree_file(doc: &mut Document, path: &Path, into_components: bool, diags: &mut ErrorContainer) {
  let text = match fs::read_to_string(path) {
    Ok(text) => text,
    Err(e) => {
      diags.report(DiagCode::ParseError, format!("cannot read {}: {}", path.display(), e));
      return;
    }
  };
  match parse_document(&text, &path.display().to_string()) {
    Ok(ir) => {
      let name = ir.name.identifier.clone();
      if into_components {
        doc.components.insert(name, ir);
      } else {
        doc.screens.insert(name, ir);
      }
    }
    Err(e) => diags.report_at(DiagCode::ParseError, e.message, e.span),
  }
}

fn read_trees(doc: &mut Document, root: &Path, diags: &mut ErrorContainer) {
  let src = root.join(SRC_DIR);

  for path in files_with_suffix(&src, CONTROL_EXT) {
    read_tree_file(doc, &path, false, diags);
  }
  for path in files_with_suffix(&src.join(TESTS_DIR), CONTROL_EXT) {
    read_tree_file(doc, &path, false, diags);
  }

  let components_dir = src.join(COMPONENTS_DIR);
  for path in files_with_suffix(&components_dir, CONTROL_EXT) {
    read_tree_file(doc, &path, true, diags);
  }
  // Component template sidecars.
  for path in files_with_suffix(&components_dir, ".json") {
    if let Some(mut template) = read_json::<crate::document::TemplateState>(&path, diags) {
      template.is_component_template = true;
      doc.templates.insert(template);
    }
  }

  let themes = src.join(THEMES_FILE);
  if themes.exists() {
    doc.themes = read_json(&themes, diags);
  }
}

fn read_editor_state(doc: &mut Document, root: &Path, diags: &mut ErrorContainer) -> Result<()> {
  let dir = root.join(SRC_DIR).join(EDITOR_STATE_DIR);
  for path in files_with_suffix(&dir, EDITOR_STATE_EXT) {
    let Some(file) = read_json::<EditorStateFile>(&path, diags) else { continue };
    for (_, state) in file.control_states {
      if doc.editor_states.insert(state.clone()).is_err() {
        return Err(fatal(
          diags,
          DiagCode::EditorStateError,
          format!("control state {:?} appears in more than one editor-state file", state.name),
        ));
      }
    }
  }
  Ok(())
}

fn read_references(doc: &mut Document, root: &Path, diags: &mut ErrorContainer) {
  let connections = root.join(CONNECTIONS_DIR).join(CONNECTIONS_FILE);
  if connections.exists() {
    doc.connections = read_json(&connections, diags);
  }
  let refs = root.join(COMPONENT_REFERENCES);
  if refs.exists() {
    doc.component_references = read_json(&refs, diags);
  }
  for path in files_with_suffix(&root.join(DATA_SOURCES_DIR), ".json") {
    if let Some(source) = read_json(&path, diags) {
      doc.data_sources.push(source);
    }
  }
}

fn read_assets(doc: &mut Document, root: &Path, diags: &mut ErrorContainer) {
  let assets_root = root.join(ASSETS_DIR);
  if !assets_root.is_dir() {
    return;
  }

  // First pass: every file, so sidecars can be told apart from assets (a
  // sidecar is `<file>.json` lying next to `<file>`).
  let mut files: Vec<PathBuf> = WalkDir::new(&assets_root)
    .into_iter()
    .filter_map(|e| e.ok())
    .filter(|e| e.file_type().is_file())
    .map(|e| e.into_path())
    .collect();
  files.sort();

  let resources_file = assets_root.join(RESOURCES_FILE);
  let is_sidecar = |path: &Path| -> bool {
    path.extension().is_some_and(|e| e == "json")
      && path
        .to_str()
        .and_then(|p| p.strip_suffix(".json"))
        .is_some_and(|stem| Path::new(stem).is_file())
  };

  for path in files {
    if path == resources_file {
      continue;
    }
    if is_sidecar(&path) {
      if let Some(sidecar) = read_json(&path, diags) {
        doc.asset_sidecars.push(sidecar);
      }
      continue;
    }
    match archive_path_for(root, &path) {
      Some(archive_path) => match fs::read(&path) {
        Ok(bytes) => doc.assets.insert(&archive_path, bytes),
        Err(e) => diags.report(DiagCode::ParseError, format!("cannot read {}: {}", path.display(), e)),
      },
      None => diags.report(
        DiagCode::GenericWarning,
        format!("asset path {} is not under the tree root", path.display()),
      ),
    }
  }

  if resources_file.exists() {
    if let Some(resources) = read_json(&resources_file, diags) {
      doc.resources = resources;
    }
  }
}

/// Reconstruct the archive path of an on-disk file: relative to the root,
/// forward slashes, components unescaped.
fn archive_path_for(root: &Path, path: &Path) -> Option<String> {
  let rel = relative(&path.display().to_string(), &root.display().to_string()).ok()?;
  let components: Vec<String> = rel
    .split(['/', '\\'])
    .filter(|c| !c.is_empty())
    .map(unescape_file_name)
    .collect();
  Some(components.join("/"))
}

fn read_entropy(doc: &mut Document, root: &Path, diags: &mut ErrorContainer) {
  let dir = root.join(ENTROPY_DIR);

  // Missing entropy is never fatal: every consumer has a deterministic
  // fallback.
  let entropy_file = dir.join(ENTROPY_FILE);
  if entropy_file.exists() {
    if let Some(entropy) = read_json::<Entropy>(&entropy_file, diags) {
      doc.entropy = entropy;
    }
  }

  let checksum_file = dir.join(CHECKSUM_FILE);
  if checksum_file.exists() {
    if let Some(checksum) = read_json::<ChecksumJson>(&checksum_file, diags) {
      doc.checksum = Some(checksum.checksum);
    }
  }

  let sarif = dir.join(CHECKER_RESULT_FILE);
  if sarif.exists() {
    match fs::read(&sarif) {
      Ok(bytes) => doc.checker_result = Some(bytes),
      Err(e) => diags.report(DiagCode::ParseError, format!("cannot read {}: {}", sarif.display(), e)),
    }
  }
}

/// `Other/` files pass through as raw bytes; their archive path comes back
/// from the disk name.
fn read_other(doc: &mut Document, root: &Path) -> Result<()> {
  let dir = root.join(OTHER_DIR);
  if !dir.is_dir() {
    return Ok(());
  }

  let mut files: Vec<PathBuf> = WalkDir::new(&dir)
    .into_iter()
    .filter_map(|e| e.ok())
    .filter(|e| e.file_type().is_file())
    .map(|e| e.into_path())
    .collect();
  files.sort();

  for path in files {
    let Some(rel) = archive_path_for(&dir, &path) else { continue };
    let archive_path = disk_to_archive_name(&rel);
    let bytes = fs::read(&path)?;
    doc.unknown_files.insert(
      pasrc_core::paths::normalize(&archive_path),
      crate::document::AssetBlob {
        original_path: archive_path,
        bytes,
      },
    );
  }
  Ok(())
}

/// Screens parsed from disk but missing from the manifest order are appended
/// in name order; order entries with no tree are dropped.
fn reconcile_order(doc: &mut Document) {
  doc.screen_order.retain(|name| doc.screens.contains_key(name));
  for name in doc.screens.keys() {
    if !doc.screen_order.contains(name) {
      doc.screen_order.push(name.clone());
    }
  }
  doc.component_order.retain(|name| doc.components.contains_key(name));
  for name in doc.components.keys() {
    if !doc.component_order.contains(name) {
      doc.component_order.push(name.clone());
    }
  }
}
