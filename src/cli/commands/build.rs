//! Build command - one-shot dereference, validate and write.

use std::path::{Path, PathBuf};

use crate::config::Settings;
use crate::source::{SourceStatus, check_source};
use crate::writer::write_artifact;

pub struct BuildArgs {
    pub document: PathBuf,
    pub output: PathBuf,
    pub component_options: Option<PathBuf>,
}

/// Build once and write the artifact to `args.output`.
pub async fn run(args: BuildArgs, mut settings: Settings) -> anyhow::Result<()> {
    super::apply_component_options(&mut settings, args.component_options.as_deref())?;
    require_source(&args.document)?;

    let builder = super::default_builder(&args.document, &settings);
    let artifact = builder.build().await?;
    write_artifact(&args.output, &artifact).await?;

    if let Some(warning) = artifact.warning() {
        eprintln!("{warning}");
    }
    println!("Wrote {}", args.output.display());
    Ok(())
}

/// One-shot commands have nothing to wait for, so a missing root is an error.
pub(crate) fn require_source(document: &Path) -> anyhow::Result<()> {
    match check_source(document)? {
        SourceStatus::Present => Ok(()),
        SourceStatus::Missing => anyhow::bail!("{} does not exist", document.display()),
    }
}
