//! Configuration loading from disk and the environment.

use std::fs;
use std::path::Path;

use crate::config::schema::{ClientConfig, BASE_URL_ENV};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load configuration from a TOML file, apply environment overrides and
/// validate the result.
pub fn load_config(path: &Path) -> Result<ClientConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let config: ClientConfig = toml::from_str(&content).map_err(ConfigError::Parse)?;
    finish(config)
}

/// Build a configuration from defaults and the environment only.
pub fn load_from_env() -> Result<ClientConfig, ConfigError> {
    finish(ClientConfig::default())
}

fn finish(mut config: ClientConfig) -> Result<ClientConfig, ConfigError> {
    apply_env_overrides(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Override configuration values from process environment variables.
pub fn apply_env_overrides(config: &mut ClientConfig) {
    apply_overrides_from(config, |key| std::env::var(key).ok());
}

/// Override configuration values using `lookup` as the variable source.
pub fn apply_overrides_from<F>(config: &mut ClientConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup(BASE_URL_ENV).filter(|v| !v.trim().is_empty()) {
        tracing::debug!(base_url = %url, "Base URL overridden from environment");
        config.api.base_url = url;
    }
}
