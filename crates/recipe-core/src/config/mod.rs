//! Configuration loading for the recipe search service.
//!
//! Settings are read from `conf/config.toml` (or `RECIPE_FINDER_CONFIG_PATH`)
//! when present. Missing or invalid entries fall back to defaults so a search
//! can always be issued.

mod defaults;
mod io;
mod models;
mod tables;

pub use io::{app_config_path, load_config, parse_config, serialize_config};
pub use models::{AppConfig, LogLevel};

pub const CONFIG_PATH_ENV: &str = "RECIPE_FINDER_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "conf/config.toml";
