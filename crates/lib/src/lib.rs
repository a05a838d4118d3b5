//! pasrc-lib: bidirectional converter between a compiled canvas app package
//! (`.msapp`, a ZIP of JSON manifests, XML control templates, and asset
//! blobs) and a human-editable source tree.
//!
//! The defining requirement is byte-faithful round-tripping:
//! `unpack(pack(src))` reproduces the source tree, and `pack(unpack(pkg))`
//! reproduces a package that matches the original under the entry checksum.
//!
//! Pipeline, unpack direction:
//!
//! ```text
//! .msapp ──pkg::loader──> Document (raw trees)
//!        ──transform::after_load──> Document (IR + editor state + entropy)
//!        ──source::write──> sharded source tree
//! ```
//!
//! Pack reverses each stage, seeded by the entropy side-channel to undo
//! stabilizations and restore original ordering.

pub mod convert;
pub mod document;
pub mod dsl;
pub mod error;
pub mod ir;
pub mod pkg;
pub mod source;
pub mod transform;

pub use document::Document;
pub use error::{Error, Result};

/// Source manifest format version accepted by this build (major.minor).
pub const FORMAT_VERSION: &str = "0.18";
