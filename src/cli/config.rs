//! Configuration management commands
//!
//! qtrader config show     - Show the effective configuration
//! qtrader config validate - Validate configuration
//! qtrader config init     - Write config/default.toml with built-in defaults

use anyhow::{Context, Result};
use clap::Subcommand;
use std::path::Path;

use crate::config::AppConfig;

/// Configuration-related commands
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show the effective configuration (defaults, files and environment)
    Show {
        /// Configuration section to show (trainer, checkpoint, data, signal, logging)
        #[arg(short, long)]
        section: Option<String>,
    },

    /// Validate the layered configuration
    Validate,

    /// Write default.toml with built-in defaults
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

impl ConfigCommands {
    pub fn run(&self, config_dir: &Path) -> Result<()> {
        match self {
            Self::Show { section } => show_config(config_dir, section.as_deref()),
            Self::Validate => validate_config(config_dir),
            Self::Init { force } => init_config(config_dir, *force),
        }
    }
}

fn show_config(config_dir: &Path, section: Option<&str>) -> Result<()> {
    let config = AppConfig::load_from(config_dir).context("Failed to load configuration")?;
    let rendered = render_section(&config, section)?;

    println!("\n  Configuration ({})\n", config_dir.display());
    for line in rendered.lines() {
        println!("  {}", line);
    }
    println!();
    Ok(())
}

/// TOML for the whole config, or for one top-level section
pub fn render_section(config: &AppConfig, section: Option<&str>) -> Result<String> {
    let value = toml::Value::try_from(config).context("Failed to render configuration")?;
    match section {
        None => Ok(toml::to_string_pretty(&value)?),
        Some(name) => {
            let table = value
                .get(name)
                .with_context(|| format!("Unknown section '{name}'"))?;
            Ok(format!("[{}]\n{}", name, toml::to_string_pretty(table)?))
        }
    }
}

fn validate_config(config_dir: &Path) -> Result<()> {
    println!("\n  Validating configuration...\n");

    let config = match AppConfig::load_from(config_dir) {
        Ok(config) => config,
        Err(e) => {
            println!("  \x1b[31m✗ failed to load: {}\x1b[0m\n", e);
            anyhow::bail!("configuration could not be loaded");
        }
    };

    match config.validate() {
        Ok(()) => {
            println!("  \x1b[32m✓ Configuration valid\x1b[0m\n");
            Ok(())
        }
        Err(errors) => {
            for error in &errors {
                println!("  \x1b[31m✗ {}\x1b[0m", error);
            }
            println!();
            anyhow::bail!("{} configuration error(s)", errors.len())
        }
    }
}

fn init_config(config_dir: &Path, force: bool) -> Result<()> {
    let path = config_dir.join("default.toml");

    if path.exists() && !force {
        println!(
            "\n  \x1b[33m⚠ Configuration already exists at {}\x1b[0m",
            path.display()
        );
        println!("  Use --force to overwrite\n");
        return Ok(());
    }

    std::fs::create_dir_all(config_dir).context("Failed to create config directory")?;
    let content = format!(
        "# qtrader configuration\n# Generated by qtrader config init\n\n{}",
        render_section(&AppConfig::default(), None)?
    );
    std::fs::write(&path, content).context("Failed to write default.toml")?;
    println!("\n  \x1b[32m✓ Created {}\x1b[0m\n", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env::temp_dir;

    #[test]
    fn test_render_section() {
        let config = AppConfig::default();
        let signal = render_section(&config, Some("signal")).unwrap();
        assert!(signal.starts_with("[signal]"));
        assert!(signal.contains("port = 9001"));
        assert!(render_section(&config, Some("database")).is_err());
    }

    #[test]
    fn test_init_writes_loadable_defaults() {
        let dir = temp_dir().join("qtrader_config_init");
        let _ = std::fs::remove_dir_all(&dir);

        ConfigCommands::Init { force: false }.run(&dir).unwrap();
        let loaded = AppConfig::load_from(&dir).unwrap();
        assert_eq!(loaded.trainer, AppConfig::default().trainer);
        ConfigCommands::Validate.run(&dir).unwrap();

        let _ = std::fs::remove_dir_all(&dir);
    }
}
