use std::time::Duration;

/// How long a cached query is served without refetching.
pub const DEFAULT_STALE_TIME: Duration = Duration::from_secs(30);

/// Quiet period after the last keystroke before a search is recorded.
pub const DEFAULT_SEARCH_DEBOUNCE: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub stale_time: Duration,
    pub search_debounce: Duration,
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:3000".into(),
            stale_time: DEFAULT_STALE_TIME,
            search_debounce: DEFAULT_SEARCH_DEBOUNCE,
            request_timeout: Duration::from_secs(15),
        }
    }
}

impl ClientConfig {
    /// Reads `WHISPER_API_URL`, `WHISPER_STALE_SECS` and
    /// `WHISPER_SEARCH_DEBOUNCE_MS`, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let number = |key: &str| std::env::var(key).ok().and_then(|v| v.parse::<u64>().ok());

        Self {
            base_url: std::env::var("WHISPER_API_URL").unwrap_or(defaults.base_url),
            stale_time: number("WHISPER_STALE_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.stale_time),
            search_debounce: number("WHISPER_SEARCH_DEBOUNCE_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.search_debounce),
            request_timeout: defaults.request_timeout,
        }
    }
}
