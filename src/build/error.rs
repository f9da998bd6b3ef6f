//! Classified build failures.

use std::fmt;

use thiserror::Error;

use crate::reference::DereferenceError;

/// Which collaborator rejected the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Dereference,
    Validation,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Dereference => f.write_str("Dereference error"),
            FailureKind::Validation => f.write_str("Validation error"),
        }
    }
}

/// A failed build attempt. Surfaces to subscribers; never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct BuildFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl BuildFailure {
    pub fn dereference(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Dereference,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Validation,
            message: message.into(),
        }
    }
}

impl From<DereferenceError> for BuildFailure {
    fn from(e: DereferenceError) -> Self {
        BuildFailure::dereference(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_display_carries_kind() {
        let failure = BuildFailure::from(DereferenceError::Read {
            path: PathBuf::from("/api/missing.yaml"),
            reason: "No such file or directory".to_string(),
        });
        assert_eq!(failure.kind, FailureKind::Dereference);
        assert_eq!(
            failure.to_string(),
            "Dereference error: Cannot read /api/missing.yaml: No such file or directory"
        );

        let failure = BuildFailure::validation("info.title is required");
        assert_eq!(failure.to_string(), "Validation error: info.title is required");
    }
}
