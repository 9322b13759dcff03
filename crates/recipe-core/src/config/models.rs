use crate::lifecycle::LifecycleOptions;
use crate::search::{ControllerOptions, MAX_PAGE_SIZE};
use serde::Deserialize;
use std::time::Duration;

/// Flat runtime configuration; see `tables` for the on-disk layout.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, serde::Serialize)]
pub struct AppConfig {
    #[serde(default = "crate::config::defaults::default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "crate::config::defaults::default_search_path")]
    pub search_path: String,
    #[serde(default = "crate::config::defaults::default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,
    #[serde(default = "crate::config::defaults::default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "crate::config::defaults::default_search_debounce_ms")]
    pub search_debounce_ms: u64,
    #[serde(default = "crate::config::defaults::default_page_size")]
    pub default_page_size: u32,
    #[serde(default = "crate::config::defaults::default_url_sync")]
    pub url_sync: bool,
    #[serde(default = "crate::config::defaults::default_log_level")]
    pub log_level: LogLevel,
}

impl Default for AppConfig {
    fn default() -> Self {
        use crate::config::defaults::*;
        AppConfig {
            api_base_url: default_api_base_url(),
            search_path: default_search_path(),
            max_concurrent_requests: default_max_concurrent_requests(),
            request_timeout_secs: default_request_timeout_secs(),
            search_debounce_ms: default_search_debounce_ms(),
            default_page_size: default_page_size(),
            url_sync: default_url_sync(),
            log_level: default_log_level(),
        }
    }
}

impl AppConfig {
    pub fn lifecycle_options(&self) -> LifecycleOptions {
        LifecycleOptions {
            max_concurrent: self.max_concurrent_requests.max(1),
            request_timeout: Duration::from_secs(self.request_timeout_secs.max(1)),
        }
    }

    pub fn controller_options(&self) -> ControllerOptions {
        ControllerOptions {
            debounce: Duration::from_millis(self.search_debounce_ms),
            url_sync: self.url_sync,
            default_limit: self.default_page_size.clamp(1, MAX_PAGE_SIZE),
            ..ControllerOptions::default()
        }
    }

    /// Full search endpoint, joining base and path with exactly one slash.
    pub fn search_endpoint(&self) -> String {
        format!(
            "{}/{}",
            self.api_base_url.trim_end_matches('/'),
            self.search_path.trim_start_matches('/')
        )
    }
}

/// Supported logging verbosity levels.
#[derive(Debug, Clone, Copy, Deserialize, serde::Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_filter_str())
    }
}

impl LogLevel {
    pub fn as_filter_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}
