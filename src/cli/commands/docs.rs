//! Docs command - write the documentation site to a directory, once or live.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::Settings;
use crate::source::check_source;
use crate::watcher::BuildSupervisor;
use crate::writer::ArtifactWriter;

/// Arguments for the docs command.
pub struct DocsArgs {
    pub document: PathBuf,
    pub out_dir: PathBuf,
    pub component_options: Option<PathBuf>,
    pub watch: bool,
    pub debounce_ms: Option<u64>,
}

/// Run the docs command, watching until interrupted when `--watch` is set.
pub async fn run(args: DocsArgs, settings: Settings) -> anyhow::Result<()> {
    run_until(args, settings, super::serve::shutdown_signal()).await
}

/// Like [`run`], with watch mode ending when `shutdown` completes.
pub async fn run_until(
    args: DocsArgs,
    mut settings: Settings,
    shutdown: impl Future<Output = ()>,
) -> anyhow::Result<()> {
    super::apply_component_options(&mut settings, args.component_options.as_deref())?;
    if let Some(debounce_ms) = args.debounce_ms {
        settings.watch.debounce_ms = debounce_ms;
    }

    let writer = ArtifactWriter::new(&args.out_dir);
    writer.install_assets().await?;

    if !args.watch {
        super::build::require_source(&args.document)?;
        let builder = super::default_builder(&args.document, &settings);
        let artifact = builder.build().await?;
        let path = writer.write(&artifact).await?;

        if let Some(warning) = artifact.warning() {
            eprintln!("{warning}");
        }
        println!("Wrote {}", path.display());
        return Ok(());
    }

    let builder = Arc::new(super::default_builder(&args.document, &settings));
    check_source(builder.source())?;

    let handle = BuildSupervisor::with_notify(builder)?
        .with_writer(writer)
        .debounce_ms(settings.watch.debounce_ms)
        .spawn();
    println!("Watching {}, writing to {}", args.document.display(), args.out_dir.display());

    shutdown.await;
    handle.stop().await;
    Ok(())
}
