//! Orchestrates the dereferencer and validator for one root document.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;

use super::{ArtifactStatus, BuildArtifact, BuildFailure};
use crate::reference::{Dereferencer, ReferenceScanner};
use crate::validate::{Validation, Validator};

/// Builds artifacts for a root document and owns the current one.
///
/// [`build`](Self::build) never touches the cache; the caller decides whether
/// a result is still current and [`commit`](Self::commit)s it.
pub struct Builder {
    source: PathBuf,
    dereferencer: Arc<dyn Dereferencer>,
    validator: Arc<dyn Validator>,
    validator_options: Value,
    cache: RwLock<Option<Arc<BuildArtifact>>>,
}

impl Builder {
    pub fn new(
        source: PathBuf,
        dereferencer: Arc<dyn Dereferencer>,
        validator: Arc<dyn Validator>,
        validator_options: Value,
    ) -> Self {
        Self {
            source,
            dereferencer,
            validator,
            validator_options,
            cache: RwLock::new(None),
        }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    /// A scanner sharing this builder's dereferencer.
    pub fn scanner(&self) -> ReferenceScanner {
        ReferenceScanner::new(self.dereferencer.clone())
    }

    /// Dereference and validate the source as it exists on disk right now.
    pub async fn build(&self) -> Result<BuildArtifact, BuildFailure> {
        crate::log_event!(
            "build",
            "building",
            "{} ({})",
            self.source.display(),
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
        );

        let document = match self.dereferencer.bundle(&self.source).await {
            Ok(document) => document,
            Err(e) => {
                let failure = BuildFailure::from(e);
                tracing::error!("[build] failed: {failure}");
                return Err(failure);
            }
        };

        let status = match self
            .validator
            .validate(&document, &self.validator_options)
            .await
        {
            Validation::Valid => ArtifactStatus::Success,
            Validation::ValidWithWarning(warning) => {
                tracing::warn!("[build] {warning}");
                ArtifactStatus::SuccessWithWarning(warning)
            }
            Validation::Invalid(message) => {
                let failure = BuildFailure::validation(message);
                tracing::error!("[build] failed: {failure}");
                return Err(failure);
            }
        };

        crate::log_event!("build", "built successfully");
        Ok(BuildArtifact::new(document, status))
    }

    /// Make `artifact` the current one.
    pub fn commit(&self, artifact: BuildArtifact) -> Arc<BuildArtifact> {
        let artifact = Arc::new(artifact);
        *self.cache.write() = Some(artifact.clone());
        artifact
    }

    /// Drop the current artifact; readers see none until the next commit.
    pub fn invalidate(&self) {
        *self.cache.write() = None;
    }

    pub fn current(&self) -> Option<Arc<BuildArtifact>> {
        self.cache.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::FailureKind;
    use crate::reference::DereferenceError;
    use async_trait::async_trait;
    use serde_json::json;

    struct StaticDocument(Result<Value, String>);

    #[async_trait]
    impl Dereferencer for StaticDocument {
        async fn reference_paths(&self, root: &Path) -> Result<Vec<String>, DereferenceError> {
            Ok(vec![root.display().to_string()])
        }

        async fn bundle(&self, root: &Path) -> Result<Value, DereferenceError> {
            self.0.clone().map_err(|reason| DereferenceError::Read {
                path: root.to_path_buf(),
                reason,
            })
        }
    }

    struct FixedVerdict(Validation);

    #[async_trait]
    impl Validator for FixedVerdict {
        async fn validate(&self, _document: &Value, _options: &Value) -> Validation {
            self.0.clone()
        }
    }

    fn builder(document: Result<Value, String>, verdict: Validation) -> Builder {
        Builder::new(
            PathBuf::from("/api/root.yaml"),
            Arc::new(StaticDocument(document)),
            Arc::new(FixedVerdict(verdict)),
            json!({}),
        )
    }

    #[tokio::test]
    async fn test_build_success_does_not_touch_cache() {
        let builder = builder(Ok(json!({ "openapi": "3.0.0" })), Validation::Valid);

        let artifact = builder.build().await.unwrap();
        assert_eq!(artifact.status, ArtifactStatus::Success);
        assert_eq!(artifact.document["openapi"], "3.0.0");
        assert!(builder.current().is_none());

        builder.commit(artifact.clone());
        assert_eq!(builder.current().as_deref(), Some(&artifact));

        builder.invalidate();
        assert!(builder.current().is_none());
    }

    #[tokio::test]
    async fn test_build_warning_is_tagged() {
        let builder = builder(
            Ok(json!({})),
            Validation::ValidWithWarning("paths object is empty".to_string()),
        );

        let artifact = builder.build().await.unwrap();
        assert_eq!(artifact.warning(), Some("paths object is empty"));
    }

    #[tokio::test]
    async fn test_build_failures_are_classified() {
        let failure = builder(Err("gone".to_string()), Validation::Valid)
            .build()
            .await
            .unwrap_err();
        assert_eq!(failure.kind, FailureKind::Dereference);
        assert!(failure.message.contains("gone"));

        let failure = builder(Ok(json!({})), Validation::Invalid("bad".to_string()))
            .build()
            .await
            .unwrap_err();
        assert_eq!(failure.kind, FailureKind::Validation);
        assert_eq!(failure.message, "bad");
    }
}
