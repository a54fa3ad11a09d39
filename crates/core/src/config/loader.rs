use std::path::Path;

use figment::providers::{Env, Format, Toml};
use figment::Figment;

use super::types::Config;
use super::ConfigError;

/// Prefix of environment overrides, e.g. `COURIER_DELIVERY_ACCESS_KEY`.
pub const ENV_PREFIX: &str = "COURIER_";

fn layered(path: &Path) -> Figment {
    Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("_"))
}

/// Loads `path` and applies environment overrides on top.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.is_file() {
        return Err(ConfigError::Missing(path.to_path_buf()));
    }
    layered(path)
        .extract()
        .map_err(|e| ConfigError::Parse(e.to_string()))
}

/// Parses TOML text without environment overrides.
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::Parse(e.to_string()))
}
