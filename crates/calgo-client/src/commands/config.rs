//! Configuration commands.

use std::path::Path;

use calgo_providers::google::AppCredentials;

use crate::config::{ClientConfig, Settings};
use crate::error::{ClientError, ClientResult};
use crate::output::OutputMode;

/// Dump the effective configuration to stdout.
pub fn dump(settings: &Settings, config_path: Option<&Path>, mode: OutputMode) -> ClientResult<()> {
    if mode == OutputMode::Json {
        println!("{}", serde_json::to_string_pretty(settings)?);
        return Ok(());
    }

    let toml_str = toml::to_string_pretty(settings)?;
    if mode == OutputMode::Plain {
        let path = config_path.map_or_else(ClientConfig::default_path, Path::to_path_buf);
        println!("# effective configuration ({})", path.display());
    }
    print!("{}", toml_str);
    Ok(())
}

/// Validate the configuration and the credentials file it points to.
pub fn validate(settings: &Settings, mode: OutputMode) -> ClientResult<()> {
    check(settings)?;
    if mode != OutputMode::Quiet {
        println!("Configuration is valid.");
    }
    Ok(())
}

fn check(settings: &Settings) -> ClientResult<()> {
    settings.validate()?;
    AppCredentials::from_file(&settings.credentials_path)
        .map_err(|e| ClientError::Config(format!("invalid Google credentials: {}", e.message())))?;
    Ok(())
}

/// Show the configuration file path.
pub fn path(config_path: Option<&Path>) -> ClientResult<()> {
    let path = config_path.map_or_else(ClientConfig::default_path, Path::to_path_buf);
    println!("{}", path.display());
    Ok(())
}
