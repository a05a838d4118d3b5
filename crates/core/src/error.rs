//! Error types for pasrc-core

use thiserror::Error;

/// Result type for pasrc-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during pasrc-core operations
#[derive(Error, Debug)]
pub enum Error {
  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),

  #[error("JSON error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("invalid path: {path} is not under {base}")]
  InvalidPath { path: String, base: String },
}
