//! The validated, fully dereferenced document.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// How cleanly the artifact validated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "warning", rename_all = "snake_case")]
pub enum ArtifactStatus {
    Success,
    SuccessWithWarning(String),
}

/// Immutable result of a successful build. Replaced wholesale, never edited.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildArtifact {
    pub document: Value,
    pub status: ArtifactStatus,
    pub created_at: DateTime<Utc>,
}

impl BuildArtifact {
    pub fn new(document: Value, status: ArtifactStatus) -> Self {
        Self {
            document,
            status,
            created_at: Utc::now(),
        }
    }

    pub fn warning(&self) -> Option<&str> {
        match &self.status {
            ArtifactStatus::Success => None,
            ArtifactStatus::SuccessWithWarning(warning) => Some(warning),
        }
    }

    /// Pretty JSON of the document, as served and persisted.
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.document)
    }
}
