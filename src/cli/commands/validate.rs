//! Validate command - one-shot validation.

use std::path::PathBuf;

use crate::config::Settings;

pub struct ValidateArgs {
    pub document: PathBuf,
    pub component_options: Option<PathBuf>,
}

/// Validate once. Errors are returned so the process exits non-zero.
pub async fn run(args: ValidateArgs, mut settings: Settings) -> anyhow::Result<()> {
    super::apply_component_options(&mut settings, args.component_options.as_deref())?;
    super::build::require_source(&args.document)?;

    let builder = super::default_builder(&args.document, &settings);
    let artifact = builder.build().await?;

    match artifact.warning() {
        Some(warning) => println!("Valid with warnings\n{warning}"),
        None => println!("Valid"),
    }
    Ok(())
}
