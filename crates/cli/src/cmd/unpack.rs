//! Implementation of the `pasrc unpack` command.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use pasrc_core::diag::ErrorContainer;

use crate::output;
use pasrc_lib::source::CANVAS_MANIFEST;

/// Execute the unpack command.
///
/// Unpacks the package into the given directory, or `<pkg>_src` next to the
/// package when none is given. An existing output directory is replaced only
/// when it is empty or clearly a previously unpacked source tree.
pub fn cmd_unpack(pkg: &Path, out_dir: Option<PathBuf>) -> Result<()> {
  let out = out_dir.unwrap_or_else(|| default_out_dir(pkg));
  prepare_out_dir(&out)?;

  let mut diags = ErrorContainer::new();
  let result = pasrc_lib::convert::unpack_file(pkg, &out, &mut diags);
  output::print_diagnostics(&diags);
  let doc = result.with_context(|| format!("failed to unpack {}", pkg.display()))?;

  output::print_success(&format!("Unpacked {}", pkg.display()));
  output::print_stat("Output", &out.display().to_string());
  output::print_stat("Screens", &doc.screens.len().to_string());
  output::print_stat("Components", &doc.components.len().to_string());
  output::print_stat("Assets", &doc.assets.len().to_string());
  Ok(())
}

/// `app.msapp` unpacks to `app_src` next to it.
fn default_out_dir(pkg: &Path) -> PathBuf {
  let stem = pkg.file_stem().and_then(|s| s.to_str()).unwrap_or("pkg");
  pkg.with_file_name(format!("{}_src", stem))
}

fn prepare_out_dir(out: &Path) -> Result<()> {
  if !out.exists() {
    return Ok(());
  }
  let is_empty = fs::read_dir(out)?.next().is_none();
  if !is_empty && !out.join(CANVAS_MANIFEST).exists() {
    bail!(
      "output directory {} exists and does not look like a source tree; refusing to replace it",
      out.display()
    );
  }
  fs::remove_dir_all(out).with_context(|| format!("cannot clear {}", out.display()))?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn default_out_is_stem_plus_src() {
    assert_eq!(default_out_dir(Path::new("/tmp/app.msapp")), PathBuf::from("/tmp/app_src"));
    assert_eq!(default_out_dir(Path::new("app.msapp")), PathBuf::from("app_src"));
  }
}
