//! Error types for pasrc-lib

use pasrc_core::diag::{DiagCode, ErrorContainer, SourceSpan};
use thiserror::Error;

/// Result type for pasrc-lib operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while converting a document.
///
/// Fatal pipeline failures carry a [`DiagCode`]; the matching structured
/// record is appended to the [`ErrorContainer`] at the failure site, so the
/// error itself only needs enough context to unwind.
#[derive(Error, Debug)]
pub enum Error {
  #[error(transparent)]
  Core(#[from] pasrc_core::Error),

  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),

  #[error("JSON error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("archive error: {0}")]
  Zip(#[from] zip::result::ZipError),

  #[error("template XML error: {0}")]
  Xml(#[from] quick_xml::Error),

  #[error("{message}")]
  Fatal { code: DiagCode, message: String },
}

impl Error {
  /// The diagnostic code for fatal pipeline failures, if this is one.
  pub fn code(&self) -> Option<DiagCode> {
    match self {
      Error::Fatal { code, .. } => Some(*code),
      _ => None,
    }
  }
}

/// Record a fatal diagnostic and build the error that unwinds with it.
pub fn fatal(diags: &mut ErrorContainer, code: DiagCode, message: impl Into<String>) -> Error {
  let message = message.into();
  diags.report(code, message.clone());
  Error::Fatal { code, message }
}

/// Like [`fatal`] but anchored to a source span.
pub fn fatal_at(diags: &mut ErrorContainer, code: DiagCode, message: impl Into<String>, span: SourceSpan) -> Error {
  let message = message.into();
  diags.report_at(code, message.clone(), span);
  Error::Fatal { code, message }
}
