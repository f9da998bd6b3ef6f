//! Dereference + validate into a cached build artifact.

mod artifact;
mod builder;
mod error;

pub use artifact::{ArtifactStatus, BuildArtifact};
pub use builder::Builder;
pub use error::{BuildFailure, FailureKind};
