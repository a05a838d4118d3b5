//! Package loader: ZIP entries into a `Loaded` document.
//!
//! Entries are enumerated in archive order, canonicalized, and dispatched by
//! the kind table. A parse failure is fatal for that entry only; the other
//! entries keep loading and the failure stays in the diagnostics. Missing
//! required manifests, or any entry-level error on record, fail the load as
//! a whole once every entry has been seen.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use pasrc_core::diag::{DiagCode, ErrorContainer, SourceSpan};
use pasrc_core::paths::normalize;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};
use zip::ZipArchive;

use crate::document::control::JsonMap;
use crate::document::{AssetBlob, ControlEnvelope, Document, Origin, TemplateState};
use crate::error::fatal;
use crate::pkg::checksum::ChecksumJson;
use crate::pkg::{classify, EntryKind};
use crate::Result;

/// `References/Templates.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TemplatesEnvelope {
  #[serde(default)]
  pub used_templates: Vec<TemplateState>,

  #[serde(flatten)]
  pub extension_data: JsonMap,
}

/// `References/DataSources.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DataSourcesEnvelope {
  #[serde(default)]
  pub data_sources: Vec<Value>,

  #[serde(flatten)]
  pub extension_data: JsonMap,
}

/// Load a package file into a `Loaded` document.
pub fn load_pkg(path: &Path, diags: &mut ErrorContainer) -> Result<Document> {
  let file = File::open(path)
    .map_err(|e| fatal(diags, DiagCode::BadParameter, format!("cannot open {}: {}", path.display(), e)))?;
  let mut archive = ZipArchive::new(BufReader::new(file))?;

  let mut doc = Document::new(Origin::Package);
  let mut saw_header = false;
  let mut saw_properties = false;

  for i in 0..archive.len() {
    let mut entry = archive.by_index(i)?;
    if entry.is_dir() {
      continue;
    }
    let raw_name = entry.name().to_string();
    let mut bytes = Vec::new();
    entry.read_to_end(&mut bytes)?;

    let norm = normalize(&raw_name);
    let kind = classify(&norm);
    saw_header |= kind == EntryKind::Header;
    saw_properties |= kind == EntryKind::Properties;
    dispatch_entry(&mut doc, kind, &raw_name, bytes, diags);
  }

  if !saw_header || !saw_properties {
    return Err(fatal(
      diags,
      DiagCode::FormatNotSupported,
      format!("{} is missing a required manifest (Header.json, Properties.json)", path.display()),
    ));
  }

  // Per-entry parse failures did not abort the other entries, but the load
  // as a whole is still error-bearing.
  if diags.has_errors() {
    return Err(crate::Error::Fatal {
      code: DiagCode::ParseError,
      message: format!("{} has entries that failed to parse", path.display()),
    });
  }

  debug!(
    screens = doc.screen_order.len(),
    components = doc.component_order.len(),
    assets = doc.assets.len(),
    unknown = doc.unknown_files.len(),
    "package loaded"
  );
  Ok(doc)
}

fn dispatch_entry(doc: &mut Document, kind: EntryKind, raw_name: &str, bytes: Vec<u8>, diags: &mut ErrorContainer) {
  match kind {
    EntryKind::Header => doc.header = parse_entry(&bytes, raw_name, diags),
    EntryKind::Properties => doc.properties = parse_entry(&bytes, raw_name, diags),
    EntryKind::PublishInfo => doc.publish_info = parse_entry(&bytes, raw_name, diags),
    EntryKind::Themes => doc.themes = parse_entry(&bytes, raw_name, diags),
    EntryKind::Connections => doc.connections = parse_entry(&bytes, raw_name, diags),
    EntryKind::ComponentReferences => doc.component_references = parse_entry(&bytes, raw_name, diags),
    EntryKind::Templates => {
      if let Some(envelope) = parse_entry::<TemplatesEnvelope>(&bytes, raw_name, diags) {
        for template in envelope.used_templates {
          doc.templates.insert(template);
        }
      }
    }
    EntryKind::Resources => {
      if let Some(manifest) = parse_entry(&bytes, raw_name, diags) {
        doc.resources = manifest;
      }
    }
    EntryKind::DataSources => {
      if let Some(envelope) = parse_entry::<DataSourcesEnvelope>(&bytes, raw_name, diags) {
        doc.data_sources = envelope.data_sources;
      }
    }
    EntryKind::Control => {
      if let Some(envelope) = parse_entry::<ControlEnvelope>(&bytes, raw_name, diags) {
        let name = envelope.top_parent.name.clone();
        doc.entropy.control_file_names.insert(name.clone(), raw_name.to_string());
        doc.screen_order.push(name.clone());
        doc.raw_screens.insert(name, envelope.top_parent);
      }
    }
    EntryKind::Component => {
      if let Some(envelope) = parse_entry::<ControlEnvelope>(&bytes, raw_name, diags) {
        let name = envelope.top_parent.name.clone();
        doc.entropy.control_file_names.insert(name.clone(), raw_name.to_string());
        doc.component_order.push(name.clone());
        doc.raw_components.insert(name, envelope.top_parent);
      }
    }
    EntryKind::Asset => doc.assets.insert(raw_name, bytes),
    EntryKind::Checksum => {
      if let Some(checksum) = parse_entry::<ChecksumJson>(&bytes, raw_name, diags) {
        doc.checksum = Some(checksum.checksum);
      }
    }
    EntryKind::CheckerResult => doc.checker_result = Some(bytes),
    EntryKind::Unknown => {
      let key = normalize(raw_name);
      if doc.unknown_files.contains_key(&key) {
        warn!(path = raw_name, "duplicate entry path after normalization, keeping first");
        return;
      }
      doc.unknown_files.insert(
        key,
        AssetBlob {
          original_path: raw_name.to_string(),
          bytes,
        },
      );
    }
  }
}

/// Parse one JSON entry; a failure becomes a `ParseError` diagnostic with
/// the entry name and position, and the entry is skipped.
fn parse_entry<T: DeserializeOwned>(bytes: &[u8], name: &str, diags: &mut ErrorContainer) -> Option<T> {
  match serde_json::from_slice(bytes) {
    Ok(value) => Some(value),
    Err(e) => {
      diags.report_at(
        DiagCode::ParseError,
        format!("cannot parse {}: {}", name, e),
        SourceSpan::point(name, e.line() as u32, e.column() as u32),
      );
      None
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Write;
  use zip::write::SimpleFileOptions;
  use zip::ZipWriter;

  fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
    let file = File::create(path).unwrap();
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default();
    for (name, bytes) in entries {
      zip.start_file(name.to_string(), options).unwrap();
      zip.write_all(bytes).unwrap();
    }
    zip.finish().unwrap();
  }

  #[test]
  fn minimal_package_loads_cleanly() {
    let temp = tempfile::tempdir().unwrap();
    let pkg = temp.path().join("app.msapp");
    write_zip(&pkg, &[("Header.json", b"{}"), ("Properties.json", b"{}")]);

    let mut diags = ErrorContainer::new();
    let doc = load_pkg(&pkg, &mut diags).unwrap();
    assert!(!diags.has_errors());
    assert!(doc.header.is_some());
    assert!(doc.properties.is_some());
  }

  #[test]
  fn missing_required_manifest_is_format_not_supported() {
    let temp = tempfile::tempdir().unwrap();
    let pkg = temp.path().join("app.msapp");
    write_zip(&pkg, &[("Properties.json", b"{}")]);

    let mut diags = ErrorContainer::new();
    let err = load_pkg(&pkg, &mut diags).unwrap_err();
    assert_eq!(err.code(), Some(DiagCode::FormatNotSupported));
  }

  #[test]
  fn malformed_entry_fails_the_load_with_diagnostics() {
    let temp = tempfile::tempdir().unwrap();
    let pkg = temp.path().join("app.msapp");
    write_zip(&pkg, &[("Header.json", b"not json {{"), ("Properties.json", b"{}")]);

    let mut diags = ErrorContainer::new();
    let err = load_pkg(&pkg, &mut diags).unwrap_err();
    // The bad entry was reported and the load is error-bearing, even though
    // the other entries kept loading.
    assert_eq!(err.code(), Some(DiagCode::ParseError));
    assert!(diags.has_errors());
    assert!(diags.iter().any(|d| d.message.contains("Header.json")));
  }

  #[test]
  fn malformed_control_entry_fails_but_parses_the_rest() {
    let temp = tempfile::tempdir().unwrap();
    let pkg = temp.path().join("app.msapp");
    write_zip(
      &pkg,
      &[
        ("Header.json", b"{}"),
        ("Properties.json", b"{}"),
        ("Controls/1.json", b"{\"TopParent\": }"),
        (
          "Controls/2.json",
          b"{\"TopParent\": {\"Name\": \"Screen2\", \"Template\": {\"Name\": \"screen\"}}}",
        ),
      ],
    );

    let mut diags = ErrorContainer::new();
    let err = load_pkg(&pkg, &mut diags).unwrap_err();
    assert_eq!(err.code(), Some(DiagCode::ParseError));
    // The healthy sibling entry was still processed before the load failed.
    assert_eq!(diags.errors().count(), 1);
  }
}
