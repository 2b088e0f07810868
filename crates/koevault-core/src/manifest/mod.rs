//! Manifest writing and rewriting.

mod rewrite;
mod writer;

pub use rewrite::rewrite_manifest;
pub use writer::ManifestWriter;
