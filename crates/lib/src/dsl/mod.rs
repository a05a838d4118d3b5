//! The indentation-based textual form for control trees.
//!
//! One file holds one root control. A block renders as
//! `Name As Type[.Variant]:` followed by indented members: property lines,
//! function-definition blocks, and child blocks. The printer and parser are
//! exact inverses of each other; round-tripping a tree through text is
//! lossless.
//!
//! ```text
//! Screen1 As screen:
//!     OnVisible = Set(x, 1)
//!     Body = |1
//!         First line
//!         Second line
//!     Label1 As label.compact:
//!         Text = "hi"
//! ```
//!
//! Multi-line expressions use a `|` block marker; the digits after it count
//! the expression's trailing newlines, which indentation alone cannot carry.

pub mod parser;
pub mod printer;

use pasrc_core::diag::SourceSpan;

pub use parser::parse_document;
pub use printer::print_document;

/// Spaces per indentation level.
pub const INDENT: usize = 4;

/// A failed parse of one source file. Processing of other files continues;
/// the span points at the offending line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
  pub message: String,
  pub span: SourceSpan,
}

impl std::fmt::Display for ParseError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}: {}", self.span, self.message)
  }
}

impl std::error::Error for ParseError {}
