use super::models::AppConfig;
use super::tables::{ConfigTables, TABLE_NAMES};
use super::{CONFIG_PATH_ENV, DEFAULT_CONFIG_PATH};
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// `RECIPE_FINDER_CONFIG_PATH` when set, else `conf/config.toml`.
pub fn app_config_path() -> PathBuf {
    std::env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Read and parse `path`, falling back to defaults on any failure.
pub fn load_config(path: &Path) -> AppConfig {
    let contents = match fs::read_to_string(path) {
        Ok(data) => {
            info!(path = %path.display(), "Loaded base config");
            data
        }
        Err(err) => {
            warn!(
                path = %path.display(),
                "Falling back to default config: {err}"
            );
            return AppConfig::default();
        }
    };

    match parse_config(&contents) {
        Ok(cfg) => {
            debug!("Parsed configuration from disk");
            cfg
        }
        Err(err) => {
            warn!(path = %path.display(), "Invalid config TOML: {err:#}");
            AppConfig::default()
        }
    }
}

/// Parse either the sectioned layout (`[api]`, `[search]`, ...) or a flat
/// table of `AppConfig` keys.
pub fn parse_config(contents: &str) -> Result<AppConfig> {
    let value: toml::Table = toml::from_str(contents).context("config is not valid TOML")?;
    let sectioned = TABLE_NAMES
        .iter()
        .any(|name| matches!(value.get(*name), Some(toml::Value::Table(_))));
    if sectioned {
        let tables: ConfigTables = toml::Value::Table(value)
            .try_into()
            .context("config tables have unexpected shape")?;
        Ok(tables.into())
    } else {
        toml::Value::Table(value)
            .try_into()
            .context("flat config has unexpected shape")
    }
}

/// Render `config` in the sectioned layout.
pub fn serialize_config(config: &AppConfig) -> Result<String> {
    toml::to_string_pretty(&ConfigTables::from(config)).context("failed to serialize config")
}
