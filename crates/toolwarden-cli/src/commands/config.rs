use std::path::PathBuf;

use anyhow::Result;

use toolwarden_core::config::{Config, ConfigPaths};

pub fn init(path: Option<PathBuf>, force: bool) -> Result<()> {
    let config_path = match path {
        Some(path) => path,
        None => ConfigPaths::resolve()?.config_path,
    };
    if config_path.exists() && !force {
        return Err(anyhow::anyhow!(
            "Config already exists at {} (use --force to overwrite)",
            config_path.display()
        ));
    }
    Config::default_config().save(&config_path)?;
    println!("Config written to {}", config_path.display());
    Ok(())
}

/// Prints the configuration after file loading and environment overrides.
pub fn print_effective(config: &Config) -> Result<()> {
    println!("{}", config.to_toml_string()?);
    Ok(())
}
