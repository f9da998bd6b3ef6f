//! Serve command - watch, rebuild and serve over HTTP.

use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::broadcast::EventBroadcaster;
use crate::config::Settings;
use crate::source::check_source;
use crate::watcher::BuildSupervisor;
use crate::writer::ArtifactWriter;

/// Arguments for the serve command.
pub struct ServeArgs {
    pub document: PathBuf,
    pub port: Option<u16>,
    pub bind: Option<String>,
    pub out_dir: Option<PathBuf>,
    pub component_options: Option<PathBuf>,
    pub debounce_ms: Option<u64>,
}

/// Apply CLI flags over the loaded configuration.
fn apply_overrides(args: &ServeArgs, settings: &mut Settings) -> anyhow::Result<()> {
    if let Some(port) = args.port {
        settings.server.port = port;
    }
    if let Some(bind) = &args.bind {
        settings.server.bind = bind.clone();
    }
    if let Some(out_dir) = &args.out_dir {
        settings.output_dir = Some(out_dir.clone());
    }
    if let Some(debounce_ms) = args.debounce_ms {
        settings.watch.debounce_ms = debounce_ms;
    }
    super::apply_component_options(settings, args.component_options.as_deref())
}

/// Run the serve command until interrupted.
pub async fn run(args: ServeArgs, mut settings: Settings) -> anyhow::Result<()> {
    apply_overrides(&args, &mut settings)?;

    let builder = Arc::new(super::default_builder(&args.document, &settings));
    // A missing root only warns; it is built once it appears.
    check_source(builder.source())?;

    let broadcaster = Arc::new(EventBroadcaster::new());
    let mut supervisor = BuildSupervisor::with_notify(builder.clone())?
        .with_broadcaster(broadcaster.clone())
        .debounce_ms(settings.watch.debounce_ms);

    if let Some(dir) = &settings.output_dir {
        let writer = ArtifactWriter::new(dir);
        if let Err(e) = writer.install_assets().await {
            tracing::error!("[writer] {e}");
        }
        supervisor = supervisor.with_writer(writer);
    }

    let handle = supervisor.spawn();

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_cancel.cancel();
    });

    let result = serve_http(&settings, builder, broadcaster, cancel).await;
    handle.stop().await;
    result
}

#[cfg(feature = "http-server")]
async fn serve_http(
    settings: &Settings,
    builder: Arc<crate::build::Builder>,
    broadcaster: Arc<EventBroadcaster>,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    use anyhow::Context;
    use crate::server::{ServerState, serve};

    let bind_address = format!("{}:{}", settings.server.bind, settings.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Cannot bind {bind_address}"))?;
    serve(listener, ServerState::new(builder, broadcaster), cancel).await
}

#[cfg(not(feature = "http-server"))]
async fn serve_http(
    _settings: &Settings,
    _builder: Arc<crate::build::Builder>,
    _broadcaster: Arc<EventBroadcaster>,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    eprintln!("HTTP server support is not compiled in; watching only.");
    eprintln!("Please rebuild with: cargo build --features http-server");
    cancel.cancelled().await;
    Ok(())
}

pub(crate) async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("[supervisor] cannot listen for ctrl-c: {e}");
        std::future::pending::<()>().await;
    }
    eprintln!("Received shutdown signal");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_flags_override_settings() {
        let args = ServeArgs {
            document: PathBuf::from("api.yaml"),
            port: Some(9000),
            bind: Some("0.0.0.0".to_string()),
            out_dir: Some(PathBuf::from("site")),
            component_options: None,
            debounce_ms: None,
        };
        let mut settings = Settings::default();

        apply_overrides(&args, &mut settings).unwrap();

        assert_eq!(settings.server.port, 9000);
        assert_eq!(settings.server.bind, "0.0.0.0");
        assert_eq!(settings.output_dir, Some(PathBuf::from("site")));
        assert_eq!(settings.watch.debounce_ms, 300);
    }
}
