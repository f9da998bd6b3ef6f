//! Command implementations for the CLI.
//!
//! Each command is implemented in its own module.

pub mod build;
pub mod docs;
pub mod init;
pub mod serve;
pub mod validate;

use std::path::Path;
use std::sync::Arc;

use crate::build::Builder;
use crate::config::Settings;
use crate::reference::{FileDereferencer, absolute};
use crate::validate::StructuralValidator;

/// A builder for `document` using the default dereferencer and validator.
pub(crate) fn default_builder(document: &Path, settings: &Settings) -> Builder {
    Builder::new(
        absolute(document),
        Arc::new(FileDereferencer::new()),
        Arc::new(StructuralValidator::new()),
        settings.validator_options.clone(),
    )
}

/// Apply `--component-options` on top of the configured validator options.
pub(crate) fn apply_component_options(
    settings: &mut Settings,
    path: Option<&Path>,
) -> anyhow::Result<()> {
    if let Some(path) = path {
        settings
            .load_validator_options(path)
            .map_err(|e| anyhow::anyhow!("Cannot load {}: {e}", path.display()))?;
    }
    Ok(())
}
