//! pasrc-core: leaf utilities for the pasrc converter.
//!
//! This crate holds the dependency-light pieces shared by the library and the
//! CLI:
//! - `paths`: archive-path normalization, filename escaping, relative-path math
//! - `hash`: SHA-256 content digests
//! - `json`: deterministic JSON canonicalization and newline normalization
//! - `diag`: the append-only diagnostics container threaded through the pipeline

pub mod diag;
pub mod error;
pub mod hash;
pub mod json;
pub mod paths;

pub use error::{Error, Result};
