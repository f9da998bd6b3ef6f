pub mod broadcast;
pub mod build;
pub mod cli;
pub mod config;
pub mod logging;
pub mod reference;
#[cfg(feature = "http-server")]
pub mod server;
pub mod source;
pub mod validate;
pub mod watcher;
pub mod writer;

pub use broadcast::{BuildEvent, EventBroadcaster, SubscriptionId};
pub use build::{ArtifactStatus, BuildArtifact, BuildFailure, Builder, FailureKind};
pub use config::Settings;
pub use reference::{Dereferencer, FileDereferencer, ReferencePath, ReferenceScanner};
pub use validate::{StructuralValidator, Validation, Validator};
pub use watcher::{BuildSupervisor, SupervisorHandle, SupervisorState};
pub use writer::ArtifactWriter;
