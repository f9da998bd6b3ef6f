//! CLI argument parsing using clap.

use clap::{
    Parser, Subcommand,
    builder::styling::{AnsiColor, Effects, Styles},
};
use std::path::{Path, PathBuf};

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

/// Live builds for multi-file OpenAPI documents
#[derive(Parser)]
#[command(
    name = "docwatch",
    version = env!("CARGO_PKG_VERSION"),
    about = "Live builds for multi-file OpenAPI documents",
    long_about = "Dereference, validate and serve an OpenAPI document, rebuilding whenever any file it references changes.",
    next_line_help = true,
    styles = clap_cargo_style()
)]
pub struct Cli {
    /// Path to a docwatch.toml file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Watch a document and serve live builds
    #[command(
        about = "Watch a document, rebuild on every change and serve the result",
        after_help = "Examples:\n  docwatch serve api/openapi.yaml\n  docwatch serve api/openapi.yaml --port 3000 --out-dir site\n  docwatch serve api/openapi.yaml --component-options redoc.json"
    )]
    Serve {
        /// Root document (JSON or YAML)
        #[arg(value_name = "DOCUMENT")]
        document: PathBuf,

        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,

        /// Address to bind to (overrides config)
        #[arg(long)]
        bind: Option<String>,

        /// Write every successful build and the docs page here
        #[arg(long, value_name = "DIR")]
        out_dir: Option<PathBuf>,

        /// JSON file with validator options
        #[arg(long, value_name = "FILE")]
        component_options: Option<PathBuf>,

        /// Quiet period before rebuilding, in milliseconds (overrides config)
        #[arg(long)]
        debounce_ms: Option<u64>,
    },

    /// Build a document once
    #[command(about = "Dereference and validate a document once and write the result")]
    Build {
        /// Root document (JSON or YAML)
        #[arg(value_name = "DOCUMENT")]
        document: PathBuf,

        /// Output file, must end in .json
        #[arg(value_name = "OUTPUT", value_parser = parse_json_path)]
        output: PathBuf,

        /// JSON file with validator options
        #[arg(long, value_name = "FILE")]
        component_options: Option<PathBuf>,
    },

    /// Write the documentation site to a directory
    #[command(
        about = "Write the docs page and built artifact to a directory, optionally keeping it current",
        after_help = "Examples:\n  docwatch docs api/openapi.yaml site\n  docwatch docs api/openapi.yaml site --watch"
    )]
    Docs {
        /// Root document (JSON or YAML)
        #[arg(value_name = "DOCUMENT")]
        document: PathBuf,

        /// Output directory
        #[arg(value_name = "OUT_DIR")]
        out_dir: PathBuf,

        /// JSON file with validator options
        #[arg(long, value_name = "FILE")]
        component_options: Option<PathBuf>,

        /// Keep rebuilding as the document changes
        #[arg(short, long)]
        watch: bool,

        /// Quiet period before rebuilding, in milliseconds (overrides config)
        #[arg(long)]
        debounce_ms: Option<u64>,
    },

    /// Validate a document once
    #[command(about = "Dereference and validate a document, exiting non-zero on error")]
    Validate {
        /// Root document (JSON or YAML)
        #[arg(value_name = "DOCUMENT")]
        document: PathBuf,

        /// JSON file with validator options
        #[arg(long, value_name = "FILE")]
        component_options: Option<PathBuf>,
    },

    /// Write a default configuration file
    #[command(about = "Create docwatch.toml with default settings")]
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Show the effective configuration
    #[command(about = "Display active settings")]
    Config,
}

fn parse_json_path(value: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(value);
    if has_json_extension(&path) {
        Ok(path)
    } else {
        Err(format!("{value} must end in .json"))
    }
}

fn has_json_extension(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}
