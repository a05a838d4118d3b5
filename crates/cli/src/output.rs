//! CLI output formatting.
//!
//! Colored status lines with stream-aware color suppression, plus the
//! rendering of accumulated diagnostics.

use owo_colors::{OwoColorize, Stream};
use pasrc_core::diag::{Diagnostic, ErrorContainer, Severity};

pub mod symbols {
  pub const SUCCESS: &str = "✓";
  pub const ERROR: &str = "✗";
  pub const WARNING: &str = "⚠";
}

pub fn print_success(message: &str) {
  println!(
    "{} {}",
    symbols::SUCCESS.if_supports_color(Stream::Stdout, |s| s.green()),
    message
  );
}

pub fn print_error(message: &str) {
  eprintln!(
    "{} {}",
    symbols::ERROR.if_supports_color(Stream::Stderr, |s| s.red()),
    message.if_supports_color(Stream::Stderr, |s| s.red())
  );
}

pub fn print_warning(message: &str) {
  eprintln!(
    "{} {}",
    symbols::WARNING.if_supports_color(Stream::Stderr, |s| s.yellow()),
    message.if_supports_color(Stream::Stderr, |s| s.yellow())
  );
}

pub fn print_stat(label: &str, value: &str) {
  println!(
    "  {}: {}",
    label.if_supports_color(Stream::Stdout, |s| s.dimmed()),
    value
  );
}

fn print_diagnostic(diag: &Diagnostic) {
  match diag.severity {
    Severity::Error => print_error(&diag.to_string()),
    Severity::Warning => print_warning(&diag.to_string()),
  }
}

/// Render every accumulated diagnostic to the terminal.
pub fn print_diagnostics(diags: &ErrorContainer) {
  for diag in diags.iter() {
    print_diagnostic(diag);
  }
}
