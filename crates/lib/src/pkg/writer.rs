//! Package writer: a `Writable` document into a ZIP file.
//!
//! Entry content is rebuilt from the document; entry order is deterministic
//! (fixed manifests, then control trees in recorded order, then sorted
//! references, assets, and passthrough files). The checksum is computed over
//! the finished enumeration and written as the last entry.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use pasrc_core::diag::{DiagCode, ErrorContainer};
use pasrc_core::json::to_pretty_bytes;
use pasrc_core::paths::escape_file_name;
use serde::Serialize;
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::document::{ControlEnvelope, ControlJson, Document, Phase};
use crate::error::fatal;
use crate::pkg::checksum::{self, ChecksumJson, CHECKSUM_ENTRY, CHECKSUM_VERSION};
use crate::pkg::loader::{DataSourcesEnvelope, TemplatesEnvelope};
use crate::Result;

/// Write the document as a package file. Returns the computed checksum.
pub fn write_pkg(doc: &Document, path: &Path, diags: &mut ErrorContainer) -> Result<String> {
  if doc.phase() != Phase::Writable {
    return Err(fatal(
      diags,
      DiagCode::InternalError,
      "write_pkg requires a Writable document (run the before-write transform first)",
    ));
  }

  let entries = build_entries(doc)?;
  let checksum = checksum::compute(entries.iter().map(|(name, bytes)| (name.as_str(), bytes.as_slice())));

  let file = File::create(path)?;
  let mut zip = ZipWriter::new(BufWriter::new(file));
  let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

  for (name, bytes) in &entries {
    zip.start_file(name.clone(), options)?;
    zip.write_all(bytes)?;
  }

  let checksum_entry = ChecksumJson {
    checksum_version: CHECKSUM_VERSION,
    checksum: checksum.clone(),
  };
  zip.start_file(CHECKSUM_ENTRY, options)?;
  zip.write_all(&json_bytes(&checksum_entry)?)?;

  let mut inner = zip.finish()?;
  inner.flush()?;
  debug!(path = %path.display(), entries = entries.len() + 1, "package written");
  Ok(checksum)
}

fn json_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>> {
  Ok(to_pretty_bytes(&serde_json::to_value(value)?)?)
}

/// Archive path for a control tree: the original entry path when entropy
/// remembers it, a name-derived one otherwise.
fn control_entry_path(doc: &Document, ctrl_name: &str, dir: &str) -> String {
  match doc.entropy.control_file_names.get(ctrl_name) {
    Some(original) => original.clone(),
    None => format!("{}/{}.json", dir, escape_file_name(ctrl_name)),
  }
}

fn control_entry(doc: &Document, name: &str, ctrl: &ControlJson, dir: &str) -> Result<(String, Vec<u8>)> {
  let envelope = ControlEnvelope {
    top_parent: ctrl.clone(),
  };
  Ok((control_entry_path(doc, name, dir), json_bytes(&envelope)?))
}

/// The full entry enumeration in write order, checksum excluded.
fn build_entries(doc: &Document) -> Result<Vec<(String, Vec<u8>)>> {
  let mut entries: Vec<(String, Vec<u8>)> = Vec::new();

  if let Some(header) = &doc.header {
    entries.push(("Header.json".to_string(), to_pretty_bytes(header)?));
  }
  if let Some(properties) = &doc.properties {
    entries.push(("Properties.json".to_string(), to_pretty_bytes(properties)?));
  }
  if let Some(publish_info) = &doc.publish_info {
    entries.push(("PublishInfo.json".to_string(), json_bytes(publish_info)?));
  }

  // Control trees keep the package's original enumeration order.
  for name in &doc.screen_order {
    if let Some(ctrl) = doc.raw_screens.get(name) {
      entries.push(control_entry(doc, name, ctrl, "Controls")?);
    }
  }
  for name in &doc.component_order {
    if let Some(ctrl) = doc.raw_components.get(name) {
      entries.push(control_entry(doc, name, ctrl, "Components")?);
    }
  }

  if !doc.templates.is_empty() {
    let envelope = TemplatesEnvelope {
      used_templates: doc.templates.iter().cloned().collect(),
      extension_data: Default::default(),
    };
    entries.push(("References/Templates.json".to_string(), json_bytes(&envelope)?));
  }
  if let Some(themes) = &doc.themes {
    entries.push(("References/Themes.json".to_string(), to_pretty_bytes(themes)?));
  }
  if !doc.resources.resources.is_empty() || !doc.resources.extension_data.is_empty() {
    entries.push(("References/Resources.json".to_string(), json_bytes(&doc.resources)?));
  }
  if !doc.data_sources.is_empty() {
    let envelope = DataSourcesEnvelope {
      data_sources: doc.data_sources.clone(),
      extension_data: Default::default(),
    };
    entries.push(("References/DataSources.json".to_string(), json_bytes(&envelope)?));
  }
  if let Some(connections) = &doc.connections {
    entries.push(("References/Connections.json".to_string(), to_pretty_bytes(connections)?));
  }
  if let Some(refs) = &doc.component_references {
    entries.push(("References/ComponentReferences.json".to_string(), to_pretty_bytes(refs)?));
  }

  for (_, blob) in doc.assets.iter() {
    entries.push((blob.original_path.clone(), blob.bytes.clone()));
  }
  if let Some(sarif) = &doc.checker_result {
    entries.push(("AppCheckerResult.sarif".to_string(), sarif.clone()));
  }
  for blob in doc.unknown_files.values() {
    entries.push((blob.original_path.clone(), blob.bytes.clone()));
  }

  Ok(entries)
}
