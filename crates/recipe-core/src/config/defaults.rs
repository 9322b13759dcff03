use crate::config::LogLevel;

pub(crate) fn default_api_base_url() -> String {
    "http://127.0.0.1:8080".to_string()
}

pub(crate) fn default_search_path() -> String {
    "/search".to_string()
}

pub(crate) fn default_max_concurrent_requests() -> usize {
    crate::lifecycle::DEFAULT_MAX_CONCURRENT_REQUESTS
}

pub(crate) fn default_request_timeout_secs() -> u64 {
    crate::lifecycle::DEFAULT_REQUEST_TIMEOUT.as_secs()
}

pub(crate) fn default_search_debounce_ms() -> u64 {
    300
}

pub(crate) fn default_page_size() -> u32 {
    crate::search::DEFAULT_PAGE_SIZE
}

pub(crate) fn default_url_sync() -> bool {
    true
}

pub(crate) fn default_log_level() -> LogLevel {
    LogLevel::Info
}
