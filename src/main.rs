use clap::Parser;
use docwatch::cli::commands::{build, docs, init, serve, validate};
use docwatch::cli::{Cli, Commands};
use docwatch::config::Settings;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    };
    let settings = loaded.unwrap_or_else(|e| {
        eprintln!("Configuration error: {e}");
        eprintln!("Using default configuration for now.");
        Settings::default()
    });

    docwatch::logging::init_with_config(&settings.logging);

    let result = match cli.command {
        Commands::Serve {
            document,
            port,
            bind,
            out_dir,
            component_options,
            debounce_ms,
        } => {
            let args = serve::ServeArgs {
                document,
                port,
                bind,
                out_dir,
                component_options,
                debounce_ms,
            };
            serve::run(args, settings).await
        }
        Commands::Build {
            document,
            output,
            component_options,
        } => {
            let args = build::BuildArgs {
                document,
                output,
                component_options,
            };
            build::run(args, settings).await
        }
        Commands::Docs {
            document,
            out_dir,
            component_options,
            watch,
            debounce_ms,
        } => {
            let args = docs::DocsArgs {
                document,
                out_dir,
                component_options,
                watch,
                debounce_ms,
            };
            docs::run(args, settings).await
        }
        Commands::Validate {
            document,
            component_options,
        } => {
            let args = validate::ValidateArgs {
                document,
                component_options,
            };
            validate::run(args, settings).await
        }
        Commands::Init { force } => init::run_init(force).map(|_| ()),
        Commands::Config => {
            init::run_config(&settings);
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
