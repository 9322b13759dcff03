use super::defaults;
use super::models::{AppConfig, LogLevel};
use serde::Deserialize;

pub(super) const TABLE_NAMES: [&str; 4] = ["api", "search", "lifecycle", "logging"];

#[derive(Debug, Clone, Default, Deserialize, serde::Serialize)]
pub(super) struct ConfigTables {
    #[serde(default)]
    api: ApiConfig,
    #[serde(default)]
    search: SearchConfig,
    #[serde(default)]
    lifecycle: LifecycleConfig,
    #[serde(default)]
    logging: LoggingConfig,
}

impl From<ConfigTables> for AppConfig {
    fn from(tables: ConfigTables) -> Self {
        AppConfig {
            api_base_url: tables.api.base_url,
            search_path: tables.api.search_path,
            max_concurrent_requests: tables.lifecycle.max_concurrent_requests,
            request_timeout_secs: tables.lifecycle.request_timeout_secs,
            search_debounce_ms: tables.search.debounce_ms,
            default_page_size: tables.search.default_page_size,
            url_sync: tables.search.url_sync,
            log_level: tables.logging.level,
        }
    }
}

impl From<&AppConfig> for ConfigTables {
    fn from(config: &AppConfig) -> Self {
        ConfigTables {
            api: ApiConfig {
                base_url: config.api_base_url.clone(),
                search_path: config.search_path.clone(),
            },
            search: SearchConfig {
                debounce_ms: config.search_debounce_ms,
                default_page_size: config.default_page_size,
                url_sync: config.url_sync,
            },
            lifecycle: LifecycleConfig {
                max_concurrent_requests: config.max_concurrent_requests,
                request_timeout_secs: config.request_timeout_secs,
            },
            logging: LoggingConfig {
                level: config.log_level,
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
struct ApiConfig {
    #[serde(default = "defaults::default_api_base_url")]
    base_url: String,
    #[serde(default = "defaults::default_search_path")]
    search_path: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::default_api_base_url(),
            search_path: defaults::default_search_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
struct SearchConfig {
    #[serde(default = "defaults::default_search_debounce_ms")]
    debounce_ms: u64,
    #[serde(default = "defaults::default_page_size")]
    default_page_size: u32,
    #[serde(default = "defaults::default_url_sync")]
    url_sync: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: defaults::default_search_debounce_ms(),
            default_page_size: defaults::default_page_size(),
            url_sync: defaults::default_url_sync(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
struct LifecycleConfig {
    #[serde(default = "defaults::default_max_concurrent_requests")]
    max_concurrent_requests: usize,
    #[serde(default = "defaults::default_request_timeout_secs")]
    request_timeout_secs: u64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: defaults::default_max_concurrent_requests(),
            request_timeout_secs: defaults::default_request_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
struct LoggingConfig {
    #[serde(default = "defaults::default_log_level")]
    level: LogLevel,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::default_log_level(),
        }
    }
}
