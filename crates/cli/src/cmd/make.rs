//! Implementation of the `pasrc make` command.

use std::path::Path;

use anyhow::{bail, Context, Result};
use pasrc_core::diag::ErrorContainer;

use crate::output;

/// Execute the make command.
///
/// Synthesizes a new package from a raw text control tree and the stock
/// control templates found in `pkgs_dir`.
pub fn cmd_make(pkg: &Path, pkgs_dir: &Path, pa_file: &Path) -> Result<()> {
  if !pkgs_dir.is_dir() {
    bail!("{} is not a directory", pkgs_dir.display());
  }
  if !pa_file.is_file() {
    bail!("{} is not a file", pa_file.display());
  }

  let mut diags = ErrorContainer::new();
  let result = pasrc_lib::convert::make_pkg(pkg, pkgs_dir, pa_file, &mut diags);
  output::print_diagnostics(&diags);
  let checksum = result.with_context(|| format!("failed to make {}", pkg.display()))?;

  output::print_success(&format!("Made {}", pkg.display()));
  output::print_stat("Checksum", &checksum);
  Ok(())
}
