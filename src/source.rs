//! Startup checks for the root document path.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StartupError {
    #[error("{path} is not a file")]
    PathNotFile { path: PathBuf },

    #[error("Cannot access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// What was found at the root document path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceStatus {
    Present,
    /// Nothing there yet; watching starts anyway and builds once it appears.
    Missing,
}

/// Check that `path` is a regular file, or does not exist yet.
///
/// A missing path is only warned about. Anything else that is not a file is
/// an error.
pub fn check_source(path: &Path) -> Result<SourceStatus, StartupError> {
    match std::fs::metadata(path) {
        Ok(metadata) if metadata.is_file() => Ok(SourceStatus::Present),
        Ok(_) => Err(StartupError::PathNotFile {
            path: path.to_path_buf(),
        }),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::warn!(
                "[supervisor] {} does not exist yet, waiting for it to be created",
                path.display()
            );
            Ok(SourceStatus::Missing)
        }
        Err(source) => Err(StartupError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_check_source() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("api.yaml");
        std::fs::write(&file, "openapi: 3.0.3\n").unwrap();

        assert_eq!(check_source(&file).unwrap(), SourceStatus::Present);
        assert_eq!(
            check_source(&dir.path().join("later.yaml")).unwrap(),
            SourceStatus::Missing
        );

        let err = check_source(dir.path()).unwrap_err();
        assert!(matches!(err, StartupError::PathNotFile { .. }));
    }
}
