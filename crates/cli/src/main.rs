//! pasrc: pack and unpack canvas app packages as editable source trees.
//!
//! Subcommands:
//! - `pasrc unpack <pkg> [out_dir]` - unpack a package into a source tree
//! - `pasrc pack <pkg> <src_dir>` - pack a source tree into a package
//! - `pasrc make <pkg> <pkgs_dir> <pa_file>` - synthesize a package from raw text
//! - `pasrc test <pkg>` - round-trip one package and verify its checksum
//! - `pasrc testall <dir>` - round-trip every `*.msapp` in a directory
//!
//! Exit codes: 0 on success, 1 when diagnostics contain errors, 2 on usage
//! errors.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

mod cmd;
mod output;

#[derive(Parser)]
#[command(name = "pasrc")]
#[command(version, about = "Canvas app package <-> source tree converter")]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Unpack a package into an editable source tree
  Unpack {
    /// Package file (.msapp)
    pkg: PathBuf,

    /// Output directory; defaults to `<pkg>_src` next to the package
    out_dir: Option<PathBuf>,
  },

  /// Pack a source tree into a package
  Pack {
    /// Package file to write
    pkg: PathBuf,

    /// Source tree directory
    src_dir: PathBuf,
  },

  /// Synthesize a package from a raw text control tree and stock templates
  Make {
    /// Package file to write
    pkg: PathBuf,

    /// Directory of control template XML files
    pkgs_dir: PathBuf,

    /// Control tree source file
    pa_file: PathBuf,
  },

  /// Round-trip one package and verify its checksum
  Test {
    /// Package file (.msapp)
    pkg: PathBuf,
  },

  /// Round-trip every top-level `*.msapp` in a directory
  Testall {
    /// Directory of packages
    dir: PathBuf,
  },
}

fn main() -> ExitCode {
  let cli = Cli::parse();

  let level = if cli.verbose { Level::DEBUG } else { Level::WARN };
  FmtSubscriber::builder()
    .with_max_level(level)
    .with_target(false)
    .without_time()
    .with_writer(std::io::stderr)
    .init();

  let result = match cli.command {
    Commands::Unpack { pkg, out_dir } => cmd::cmd_unpack(&pkg, out_dir),
    Commands::Pack { pkg, src_dir } => cmd::cmd_pack(&pkg, &src_dir),
    Commands::Make { pkg, pkgs_dir, pa_file } => cmd::cmd_make(&pkg, &pkgs_dir, &pa_file),
    Commands::Test { pkg } => cmd::cmd_test(&pkg),
    Commands::Testall { dir } => cmd::cmd_testall(&dir),
  };

  match result {
    Ok(()) => ExitCode::SUCCESS,
    Err(err) => {
      output::print_error(&format!("{:#}", err));
      ExitCode::from(1)
    }
  }
}
