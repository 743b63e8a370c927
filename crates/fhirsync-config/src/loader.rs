use std::collections::HashMap;
use std::path::{Path, PathBuf};

use config::{Config, Environment, File};

use crate::{AppConfig, ConfigError, Result};

pub const DEFAULT_CONFIG_FILE: &str = "fhirsync.toml";
pub const ENV_PREFIX: &str = "FHIRSYNC";

/// Loads configuration from `path` (or `fhirsync.toml` if present) and the
/// process environment, e.g. `FHIRSYNC__REMOTE__BASE_URL=https://...`.
///
/// An explicitly given path must exist; the default file is optional.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    load_config_with_env(path, None)
}

/// Like [`load_config`], but reads overrides from `env` instead of the
/// process environment when it is `Some`.
pub fn load_config_with_env(
    path: Option<&Path>,
    env: Option<HashMap<String, String>>,
) -> Result<AppConfig> {
    let mut builder = Config::builder();
    match path {
        Some(p) => {
            if !p.exists() {
                return Err(ConfigError::NotFound(p.to_path_buf()));
            }
            builder = builder.add_source(File::from(p.to_path_buf()));
        }
        None => {
            let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
            if default_path.exists() {
                builder = builder.add_source(File::from(default_path));
            }
        }
    }
    // Environment variable overrides, e.g., FHIRSYNC__SYNC__INTERVAL_SECS=60
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .try_parsing(true)
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("sync.permanent_failure_statuses")
            .source(env),
    );
    let merged: AppConfig = builder.build()?.try_deserialize()?;
    merged.validate()?;
    Ok(merged)
}
