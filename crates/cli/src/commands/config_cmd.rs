//! `contextweave config`: configuration output.

use contextweave_config::AppConfig;

use super::{CliResult, load_config};

pub fn show_default() -> CliResult {
    print!("{}", AppConfig::default_toml());
    Ok(())
}

/// The effective configuration. The API key never leaves the process.
pub fn current() -> CliResult {
    let mut config = load_config()?;
    if config.embedding.api_key.is_some() {
        config.embedding.api_key = Some("[REDACTED]".into());
    }
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

pub fn path() -> CliResult {
    println!("{}", config_path().display());
    Ok(())
}

fn config_path() -> std::path::PathBuf {
    AppConfig::config_dir().join("config.toml")
}
