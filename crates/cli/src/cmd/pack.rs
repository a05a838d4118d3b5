//! Implementation of the `pasrc pack` command.

use std::path::Path;

use anyhow::{bail, Context, Result};
use pasrc_core::diag::ErrorContainer;

use crate::output;

/// Execute the pack command.
///
/// Reads the source tree, runs the before-write transforms, and writes the
/// package. Prints the checksum the package was stamped with.
pub fn cmd_pack(pkg: &Path, src_dir: &Path) -> Result<()> {
  if !src_dir.is_dir() {
    bail!("{} is not a directory", src_dir.display());
  }

  let mut diags = ErrorContainer::new();
  let result = pasrc_lib::convert::pack_tree(src_dir, pkg, &mut diags);
  output::print_diagnostics(&diags);
  let (doc, checksum) = result.with_context(|| format!("failed to pack {}", src_dir.display()))?;

  output::print_success(&format!("Packed {}", pkg.display()));
  output::print_stat("Screens", &doc.screens.len().to_string());
  output::print_stat("Components", &doc.components.len().to_string());
  output::print_stat("Checksum", &checksum);
  Ok(())
}
