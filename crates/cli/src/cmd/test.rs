//! Implementation of the `pasrc test` and `pasrc testall` commands.
//!
//! A test round-trips one package: unpack to a temporary source tree, pack
//! it back, and compare the checksums of the original and the repacked
//! package.

use std::path::Path;

use anyhow::{bail, Context, Result};
use pasrc_core::diag::ErrorContainer;

use crate::output;

/// Execute the test command for one package.
pub fn cmd_test(pkg: &Path) -> Result<()> {
  roundtrip(pkg)?;
  output::print_success(&format!("Round-trip OK: {}", pkg.display()));
  Ok(())
}

/// Execute the testall command: every top-level `*.msapp` in the directory.
pub fn cmd_testall(dir: &Path) -> Result<()> {
  if !dir.is_dir() {
    bail!("{} is not a directory", dir.display());
  }

  let mut packages: Vec<_> = std::fs::read_dir(dir)?
    .filter_map(|e| e.ok())
    .map(|e| e.path())
    .filter(|p| p.is_file())
    .filter(|p| p.extension().is_some_and(|e| e.eq_ignore_ascii_case("msapp")))
    .collect();
  packages.sort();

  let mut passed = 0;
  for pkg in &packages {
    match roundtrip(pkg) {
      Ok(()) => {
        passed += 1;
        output::print_success(&format!("PASS {}", pkg.display()));
      }
      Err(err) => output::print_error(&format!("FAIL {}: {:#}", pkg.display(), err)),
    }
  }

  println!("{}/{} passed", passed, packages.len());
  if passed != packages.len() {
    bail!("{} package(s) failed the round trip", packages.len() - passed);
  }
  Ok(())
}

/// Unpack into a temporary tree, pack it back, compare checksums.
fn roundtrip(pkg: &Path) -> Result<()> {
  let temp = tempfile::tempdir().context("cannot create temporary directory")?;
  let src_dir = temp.path().join("src");
  let repacked = temp.path().join("repacked.msapp");

  let mut diags = ErrorContainer::new();
  let result = pasrc_lib::convert::unpack_file(pkg, &src_dir, &mut diags)
    .map(|_| ())
    .and_then(|_| pasrc_lib::convert::pack_tree(&src_dir, &repacked, &mut diags).map(|_| ()));
  output::print_diagnostics(&diags);
  result.with_context(|| format!("round trip of {} failed", pkg.display()))?;

  let original = pasrc_lib::convert::checksum_of_pkg(pkg)?;
  let roundtripped = pasrc_lib::convert::checksum_of_pkg(&repacked)?;
  if original != roundtripped {
    bail!("checksum mismatch: {} != {}", original, roundtripped);
  }
  Ok(())
}
