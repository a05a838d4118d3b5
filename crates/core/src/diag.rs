//! Structured diagnostics for the conversion pipeline.
//!
//! The [`ErrorContainer`] is the single mutable collaborator threaded through
//! every stage. It is append-only: stages add records and observe
//! `has_errors`, nothing removes entries. Fatal failures still unwind through
//! `Result`; the container is where the details accumulate.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Diagnostic severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
  Error,
  Warning,
}

/// The closed set of diagnostic kinds the pipeline produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagCode {
  /// Version mismatch or missing required manifest.
  FormatNotSupported,
  /// CLI misuse or path issues.
  BadParameter,
  /// Relative/base path mismatch.
  InvalidPath,
  /// A file failed to parse; other files keep processing.
  ParseError,
  /// Duplicate control name outside a test suite.
  DuplicateSymbol,
  /// Adding properties to a component definition.
  UnsupportedChange,
  /// Duplicate control-state entries across editor-state files.
  EditorStateError,
  ValidationWarning,
  GenericWarning,
  /// Unexpected failure inside a transform, wrapping the cause.
  InternalError,
}

impl DiagCode {
  /// The severity this code carries by default.
  pub fn severity(self) -> Severity {
    match self {
      DiagCode::ValidationWarning | DiagCode::GenericWarning => Severity::Warning,
      _ => Severity::Error,
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      DiagCode::FormatNotSupported => "FormatNotSupported",
      DiagCode::BadParameter => "BadParameter",
      DiagCode::InvalidPath => "InvalidPath",
      DiagCode::ParseError => "ParseError",
      DiagCode::DuplicateSymbol => "DuplicateSymbol",
      DiagCode::UnsupportedChange => "UnsupportedChange",
      DiagCode::EditorStateError => "EditorStateError",
      DiagCode::ValidationWarning => "ValidationWarning",
      DiagCode::GenericWarning => "GenericWarning",
      DiagCode::InternalError => "InternalError",
    }
  }
}

/// A region of a source file, 1-based lines and columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceSpan {
  pub file: String,
  pub start_line: u32,
  pub start_col: u32,
  pub end_line: u32,
  pub end_col: u32,
}

impl SourceSpan {
  pub fn point(file: impl Into<String>, line: u32, col: u32) -> Self {
    Self {
      file: file.into(),
      start_line: line,
      start_col: col,
      end_line: line,
      end_col: col,
    }
  }
}

impl fmt::Display for SourceSpan {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}:{}", self.file, self.start_line, self.start_col)
  }
}

/// One structured diagnostic record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
  pub severity: Severity,
  pub code: DiagCode,
  pub message: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub span: Option<SourceSpan>,
}

impl fmt::Display for Diagnostic {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let kind = match self.severity {
      Severity::Error => "error",
      Severity::Warning => "warning",
    };
    match &self.span {
      Some(span) => write!(f, "{} [{}] {}: {}", kind, self.code.as_str(), span, self.message),
      None => write!(f, "{} [{}]: {}", kind, self.code.as_str(), self.message),
    }
  }
}

/// Append-only diagnostics collection.
#[derive(Debug, Default, Clone)]
pub struct ErrorContainer {
  records: Vec<Diagnostic>,
}

impl ErrorContainer {
  pub fn new() -> Self {
    Self::default()
  }

  /// Append a record with the code's default severity.
  pub fn report(&mut self, code: DiagCode, message: impl Into<String>) {
    self.records.push(Diagnostic {
      severity: code.severity(),
      code,
      message: message.into(),
      span: None,
    });
  }

  /// Append a record anchored to a source span.
  pub fn report_at(&mut self, code: DiagCode, message: impl Into<String>, span: SourceSpan) {
    self.records.push(Diagnostic {
      severity: code.severity(),
      code,
      message: message.into(),
      span: Some(span),
    });
  }

  pub fn has_errors(&self) -> bool {
    self.records.iter().any(|d| d.severity == Severity::Error)
  }

  pub fn is_empty(&self) -> bool {
    self.records.is_empty()
  }

  pub fn len(&self) -> usize {
    self.records.len()
  }

  pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
    self.records.iter()
  }

  /// Errors only, in insertion order.
  pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
    self.records.iter().filter(|d| d.severity == Severity::Error)
  }
}
