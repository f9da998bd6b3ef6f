//! Layered configuration for the watch pipeline.
//!
//! Sources, lowest to highest precedence:
//! - Default values
//! - TOML configuration file (`docwatch.toml`, or an explicit path)
//! - Environment variables
//! - CLI argument overrides (applied by the command runners)
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `DOCWATCH_` and use double
//! underscores to separate nested levels:
//! - `DOCWATCH_WATCH__DEBOUNCE_MS=150` sets `watch.debounce_ms`
//! - `DOCWATCH_SERVER__PORT=9000` sets `server.port`
//! - `DOCWATCH_OUTPUT_DIR=dist` sets `output_dir`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Default config file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "docwatch.toml";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// File watching behaviour
    #[serde(default)]
    pub watch: WatchConfig,

    /// HTTP transport settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Directory the artifact and documentation assets are written to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,

    /// Options handed to the validator untouched
    #[serde(default = "default_validator_options")]
    pub validator_options: serde_json::Value,

    /// Log levels
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WatchConfig {
    /// Quiet period before a burst of changes triggers a rebuild
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    /// Interface to bind
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LoggingConfig {
    /// Level applied to everything without an explicit override
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-module overrides, e.g. `notify = "warn"`
    #[serde(default)]
    pub modules: BTreeMap<String, String>,
}

fn default_debounce_ms() -> u64 {
    300
}
fn default_bind() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_validator_options() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            watch: WatchConfig::default(),
            server: ServerConfig::default(),
            output_dir: None,
            validator_options: default_validator_options(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: BTreeMap::new(),
        }
    }
}

impl Settings {
    /// Load configuration from defaults, `docwatch.toml` in the working
    /// directory (if any) and `DOCWATCH_` environment variables.
    pub fn load() -> Result<Self, Box<figment::Error>> {
        Self::load_from(PathBuf::from(CONFIG_FILE_NAME))
    }

    /// Load configuration layering a specific TOML file.
    ///
    /// A missing file is not an error; defaults and environment still apply.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, Box<figment::Error>> {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(
                Env::prefixed("DOCWATCH_")
                    .map(|key| key.as_str().to_lowercase().replace("__", ".").into()),
            )
            .extract()
            .map_err(Box::new)
    }

    /// Read a JSON file of validator options, replacing the configured ones.
    pub fn load_validator_options(&mut self, path: &Path) -> anyhow::Result<()> {
        let content = std::fs::read_to_string(path)?;
        self.validator_options = serde_json::from_str(&content)?;
        Ok(())
    }

    /// Save current configuration to file.
    pub fn save(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }
}
