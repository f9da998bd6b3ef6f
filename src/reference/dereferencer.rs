//! The reference-resolution seam.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

/// Failures while discovering or inlining references.
#[derive(Error, Debug)]
pub enum DereferenceError {
    #[error("Cannot read {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    #[error("Cannot fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("Cannot parse {location}: {reason}")]
    Parse { location: String, reason: String },

    #[error("Unresolved reference \"{reference}\" in {location}")]
    Unresolved { reference: String, location: String },

    #[error("Circular reference \"{reference}\" in {location}")]
    Circular { reference: String, location: String },
}

/// Resolves the references of a root document.
///
/// Implementations discover referenced documents and produce a fully
/// inlined document. Both operations read live state on every call.
#[async_trait]
pub trait Dereferencer: Send + Sync {
    /// The root plus every document it transitively references.
    ///
    /// Local entries are absolute filesystem paths; remote entries are URLs.
    async fn reference_paths(&self, root: &Path) -> Result<Vec<String>, DereferenceError>;

    /// The root document with external references inlined.
    async fn bundle(&self, root: &Path) -> Result<serde_json::Value, DereferenceError>;
}
