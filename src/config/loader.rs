use std::{collections::HashMap, path::Path};

use config::{Config, Environment, File, FileFormat};
use eyre::{Context, Result};

use crate::config::models::ServerConfig;

/// Prefix of environment variables overriding file settings,
/// e.g. `FLAREPROXY_PROXY__UPSTREAM` or `FLAREPROXY_LISTEN_ADDR`.
pub const ENV_PREFIX: &str = "FLAREPROXY";

/// Load configuration from built-in defaults, an optional file and the environment.
/// Supports multiple file formats: YAML, JSON, TOML, etc.
pub async fn load_config(config_path: Option<&str>) -> Result<ServerConfig> {
    load_config_sync(config_path)
}

/// Load configuration synchronously
pub fn load_config_sync(config_path: Option<&str>) -> Result<ServerConfig> {
    load_with_env(config_path, None)
}

/// Shared loader; `env` replaces the process environment when given.
fn load_with_env(
    config_path: Option<&str>,
    env: Option<HashMap<String, String>>,
) -> Result<ServerConfig> {
    let defaults = Config::try_from(&ServerConfig::default())
        .wrap_err("Failed to serialize default configuration")?;

    let mut builder = Config::builder().add_source(defaults);

    if let Some(config_path) = config_path {
        let path = Path::new(config_path);
        if !path.exists() {
            return Err(eyre::eyre!(
                "Configuration file not found: {}",
                path.display()
            ));
        }
        builder = builder.add_source(File::new(
            path.to_str()
                .ok_or_else(|| eyre::eyre!("Invalid UTF-8 path: {}", path.display()))?,
            file_format(path),
        ));
    }

    let settings = builder
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .source(env),
        )
        .build()
        .wrap_err("Failed to build configuration")?;

    let server_config: ServerConfig = settings
        .try_deserialize()
        .wrap_err("Failed to deserialize configuration")?;

    Ok(server_config)
}

/// Determine file format based on extension
fn file_format(path: &Path) -> FileFormat {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("yaml") | Some("yml") => FileFormat::Yaml,
        Some("json") => FileFormat::Json,
        Some("ini") => FileFormat::Ini,
        _ => FileFormat::Toml, // Default to TOML
    }
}
