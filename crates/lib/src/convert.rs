//! End-to-end pipelines the CLI drives.

use std::path::Path;

use pasrc_core::diag::{DiagCode, ErrorContainer};
use serde_json::json;
use tracing::info;

use crate::document::{Document, Origin};
use crate::dsl::parse_document;
use crate::error::fatal;
use crate::{pkg, source, transform, Result};

/// Unpack a package file into a source tree. Returns the document for
/// inspection.
pub fn unpack_file(pkg_path: &Path, out_dir: &Path, diags: &mut ErrorContainer) -> Result<Document> {
  let mut doc = transform::run_guarded(diags, |diags| pkg::load_pkg(pkg_path, diags))?;
  transform::run_guarded(diags, |diags| transform::after_load(&mut doc, diags))?;
  source::write_source(&doc, out_dir, diags)?;
  info!(pkg = %pkg_path.display(), out = %out_dir.display(), "unpacked");
  Ok(doc)
}

/// Pack a source tree into a package file. Returns the document and the
/// checksum of the written package.
pub fn pack_tree(src_dir: &Path, pkg_path: &Path, diags: &mut ErrorContainer) -> Result<(Document, String)> {
  let mut doc = transform::run_guarded(diags, |diags| source::read_source(src_dir, diags))?;
  transform::run_guarded(diags, |diags| transform::after_load(&mut doc, diags))?;
  transform::run_guarded(diags, |diags| transform::before_write(&mut doc, diags))?;
  let checksum = pkg::write_pkg(&doc, pkg_path, diags)?;
  transform::after_write(&mut doc)?;
  info!(src = %src_dir.display(), pkg = %pkg_path.display(), "packed");
  Ok((doc, checksum))
}

/// Synthesize a package from a raw text control tree and a directory of
/// stock control templates.
pub fn make_pkg(pkg_path: &Path, pkgs_dir: &Path, pa_file: &Path, diags: &mut ErrorContainer) -> Result<String> {
  let text = std::fs::read_to_string(pa_file)
    .map_err(|e| fatal(diags, DiagCode::BadParameter, format!("cannot read {}: {}", pa_file.display(), e)))?;
  let root = parse_document(&text, &pa_file.display().to_string()).map_err(|e| {
    let message = e.message.clone();
    crate::error::fatal_at(diags, DiagCode::ParseError, message, e.span)
  })?;

  let mut doc = Document::new(Origin::Source);
  doc.header = Some(json!({ "DocVersion": "1.0", "MinVersionToLoad": "1.0" }));
  doc.properties = Some(json!({ "Name": root.name.identifier }));

  for template in crate::document::template::discover_templates(pkgs_dir)? {
    doc.templates.insert(template);
  }

  let name = root.name.identifier.clone();
  doc.screens.insert(name.clone(), root);
  doc.screen_order.push(name);

  transform::run_guarded(diags, |diags| transform::after_load(&mut doc, diags))?;
  transform::run_guarded(diags, |diags| transform::before_write(&mut doc, diags))?;
  let checksum = pkg::write_pkg(&doc, pkg_path, diags)?;
  transform::after_write(&mut doc)?;
  info!(pkg = %pkg_path.display(), "made package from {}", pa_file.display());
  Ok(checksum)
}

/// Checksum of an existing package file, computed from its entries.
pub fn checksum_of_pkg(pkg_path: &Path) -> Result<String> {
  use std::io::Read;

  let file = std::fs::File::open(pkg_path)?;
  let mut archive = zip::ZipArchive::new(std::io::BufReader::new(file))?;
  let mut entries: Vec<(String, Vec<u8>)> = Vec::new();
  for i in 0..archive.len() {
    let mut entry = archive.by_index(i)?;
    if entry.is_dir() {
      continue;
    }
    let name = entry.name().to_string();
    let mut bytes = Vec::new();
    entry.read_to_end(&mut bytes)?;
    entries.push((name, bytes));
  }
  Ok(pkg::checksum::compute(
    entries.iter().map(|(name, bytes)| (name.as_str(), bytes.as_slice())),
  ))
}
