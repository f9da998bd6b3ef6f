//! Reference discovery for the root document.
//!
//! The [`Dereferencer`] trait is the seam to the reference-resolution
//! engine; [`ReferenceScanner`] narrows its output to the local paths the
//! watcher cares about.

mod dereferencer;
mod file;

pub use dereferencer::{DereferenceError, Dereferencer};
pub use file::{FETCH_TIMEOUT, FileDereferencer, absolute};
pub(crate) use file::decode_pointer;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Where a referenced document lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathKind {
    Local,
    Remote,
}

/// Network schemes that mark a reference as remote.
const REMOTE_SCHEMES: [&str; 2] = ["http://", "https://"];

/// Classify a reference path string.
pub fn classify(path: &str) -> PathKind {
    let is_remote = REMOTE_SCHEMES.iter().any(|scheme| {
        path.get(..scheme.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(scheme))
    });
    if is_remote {
        PathKind::Remote
    } else {
        PathKind::Local
    }
}

/// A referenced document path tagged local or remote.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ReferencePath {
    Local(PathBuf),
    Remote(String),
}

impl ReferencePath {
    pub fn from_raw(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        match classify(&raw) {
            PathKind::Local => ReferencePath::Local(PathBuf::from(raw)),
            PathKind::Remote => ReferencePath::Remote(raw),
        }
    }

    pub fn kind(&self) -> PathKind {
        match self {
            ReferencePath::Local(_) => PathKind::Local,
            ReferencePath::Remote(_) => PathKind::Remote,
        }
    }

    pub fn as_local(&self) -> Option<&Path> {
        match self {
            ReferencePath::Local(path) => Some(path),
            ReferencePath::Remote(_) => None,
        }
    }
}

/// Computes the set of documents the root document currently references.
#[derive(Clone)]
pub struct ReferenceScanner {
    dereferencer: Arc<dyn Dereferencer>,
}

impl ReferenceScanner {
    pub fn new(dereferencer: Arc<dyn Dereferencer>) -> Self {
        Self { dereferencer }
    }

    /// Every document reachable from `root`, local and remote.
    pub async fn scan(&self, root: &Path) -> Result<BTreeSet<ReferencePath>, DereferenceError> {
        let paths = self.dereferencer.reference_paths(root).await?;
        Ok(paths.into_iter().map(ReferencePath::from_raw).collect())
    }

    /// Only the local paths from [`scan`](Self::scan).
    pub async fn scan_local(&self, root: &Path) -> Result<BTreeSet<PathBuf>, DereferenceError> {
        let paths = self.scan(root).await?;
        Ok(paths
            .into_iter()
            .filter_map(|path| match path {
                ReferencePath::Local(path) => Some(path),
                ReferencePath::Remote(_) => None,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct FixedPaths(Vec<&'static str>);

    #[async_trait]
    impl Dereferencer for FixedPaths {
        async fn reference_paths(&self, _root: &Path) -> Result<Vec<String>, DereferenceError> {
            Ok(self.0.iter().map(|p| p.to_string()).collect())
        }

        async fn bundle(&self, _root: &Path) -> Result<serde_json::Value, DereferenceError> {
            Ok(serde_json::Value::Null)
        }
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify("http://example.com/api.yaml"), PathKind::Remote);
        assert_eq!(classify("https://example.com/api.yaml"), PathKind::Remote);
        assert_eq!(classify("HTTPS://EXAMPLE.COM/api.yaml"), PathKind::Remote);
        assert_eq!(classify("/srv/api/schemas/user.yaml"), PathKind::Local);
        assert_eq!(classify("schemas/user.yaml"), PathKind::Local);
        assert_eq!(classify("httpdocs/api.yaml"), PathKind::Local);
        assert_eq!(classify("ftp://example.com/api.yaml"), PathKind::Local);
        assert_eq!(classify(""), PathKind::Local);
    }

    #[tokio::test]
    async fn test_scan_local_filters_remote() {
        let scanner = ReferenceScanner::new(Arc::new(FixedPaths(vec![
            "/api/root.yaml",
            "https://example.com/common.yaml",
            "/api/schemas/user.yaml",
        ])));

        let all = scanner.scan(Path::new("/api/root.yaml")).await.unwrap();
        assert_eq!(all.len(), 3);
        assert!(all.contains(&ReferencePath::Remote(
            "https://example.com/common.yaml".to_string()
        )));

        let local = scanner.scan_local(Path::new("/api/root.yaml")).await.unwrap();
        let expected: BTreeSet<PathBuf> = ["/api/root.yaml", "/api/schemas/user.yaml"]
            .into_iter()
            .map(PathBuf::from)
            .collect();
        assert_eq!(local, expected);
    }

    #[test]
    fn test_reference_path_accessors() {
        let local = ReferencePath::from_raw("/api/root.yaml");
        assert_eq!(local.kind(), PathKind::Local);
        assert_eq!(local.as_local(), Some(Path::new("/api/root.yaml")));

        let remote = ReferencePath::from_raw("http://example.com/a.json");
        assert_eq!(remote.kind(), PathKind::Remote);
        assert!(remote.as_local().is_none());
    }
}
