//! Persists the current artifact and the documentation page to disk.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::build::BuildArtifact;

/// Name of the artifact file inside the output directory.
pub const ARTIFACT_FILE_NAME: &str = "openapi.json";

/// Documentation page bundled into the binary.
pub const INDEX_HTML: &str = include_str!("../assets/index.html");

/// Static assets written once into the output directory: (name, contents).
pub const ASSETS: &[(&str, &str)] = &[("index.html", INDEX_HTML)];

#[derive(Error, Debug)]
pub enum WriteError {
    #[error("Cannot write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot serialize artifact: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Writes artifacts to a fixed directory.
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    directory: PathBuf,
}

impl ArtifactWriter {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn artifact_path(&self) -> PathBuf {
        self.directory.join(ARTIFACT_FILE_NAME)
    }

    /// Overwrite the artifact file with `artifact`.
    pub async fn write(&self, artifact: &BuildArtifact) -> Result<PathBuf, WriteError> {
        let path = self.artifact_path();
        write_artifact(&path, artifact).await?;
        Ok(path)
    }

    /// Write and log failures instead of returning them.
    pub async fn write_logged(&self, artifact: &BuildArtifact) {
        if let Err(e) = self.write(artifact).await {
            tracing::error!("[writer] {e}");
        }
    }

    /// Create the directory if needed and copy the bundled assets into it.
    pub async fn install_assets(&self) -> Result<(), WriteError> {
        tokio::fs::create_dir_all(&self.directory)
            .await
            .map_err(|source| WriteError::Io {
                path: self.directory.clone(),
                source,
            })?;

        for (name, contents) in ASSETS {
            write_file(&self.directory.join(name), contents.as_bytes()).await?;
        }

        crate::log_event!(
            "writer",
            "installed assets",
            "{}",
            self.directory.display()
        );
        Ok(())
    }
}

/// Write `artifact` as pretty-printed JSON to an explicit path.
pub async fn write_artifact(path: &Path, artifact: &BuildArtifact) -> Result<(), WriteError> {
    let json = artifact.to_json_pretty()?;
    write_file(path, json.as_bytes()).await?;
    crate::debug_event!("writer", "wrote", "{}", path.display());
    Ok(())
}

async fn write_file(path: &Path, contents: &[u8]) -> Result<(), WriteError> {
    tokio::fs::write(path, contents)
        .await
        .map_err(|source| WriteError::Io {
            path: path.to_path_buf(),
            source,
        })
}
