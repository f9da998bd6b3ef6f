//! Init and Config commands.

use std::path::{Path, PathBuf};

use crate::config::{CONFIG_FILE_NAME, Settings};

/// Run init command - create configuration file.
pub fn run_init(force: bool) -> anyhow::Result<PathBuf> {
    let config_path = PathBuf::from(CONFIG_FILE_NAME);
    write_default_config(&config_path, force)?;
    println!("Created configuration file at: {}", config_path.display());
    println!("Edit this file to customize your settings.");
    Ok(config_path)
}

fn write_default_config(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "Configuration file already exists at: {} (use --force to overwrite)",
            path.display()
        );
    }
    Settings::default().save(path)
}

/// Run config command - display current configuration.
pub fn run_config(config: &Settings) {
    println!("Current Configuration:");
    println!("{}", "=".repeat(50));
    match toml::to_string_pretty(config) {
        Ok(toml_str) => println!("{toml_str}"),
        Err(e) => eprintln!("Error displaying config: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_default_config_respects_force() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);

        write_default_config(&path, false).unwrap();
        let loaded = Settings::load_from(&path).unwrap();
        assert_eq!(loaded.watch.debounce_ms, 300);

        assert!(write_default_config(&path, false).is_err());
        write_default_config(&path, true).unwrap();
    }
}
