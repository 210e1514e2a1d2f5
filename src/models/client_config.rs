use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::constants::{
    DEFAULT_API_BASE, DEFAULT_CACHE_ENABLED, DEFAULT_CACHE_MAX_ENTRIES, DEFAULT_CACHE_TTL_SECS,
    DEFAULT_CLEAR_ON_SELECT, DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_POLL_INTERVAL_SECS,
    DEFAULT_SEARCH_DEBOUNCE_MS, DEFAULT_STATE_FILE,
};

/// Response cache knobs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// When false nothing is memoized; identical in-flight requests still coalesce
    pub enabled: bool,

    /// Validity window of a cached response
    pub ttl: Duration,

    /// Upper bound on stored entries
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: DEFAULT_CACHE_ENABLED,
            ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            max_entries: DEFAULT_CACHE_MAX_ENTRIES,
        }
    }
}

/// Configuration for the client-side sync subsystem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Data service base URL (no trailing slash)
    pub api_base: String,

    /// HTTP request timeout
    pub http_timeout: Duration,

    pub cache: CacheConfig,

    /// Refresh cadence for views on the finest timeframe
    pub poll_interval: Duration,

    /// Clear prior summary/bars when a new instrument is selected
    pub clear_on_select: bool,

    /// Search-as-you-type debounce window
    pub search_debounce: Duration,

    /// Persisted state document
    pub state_file: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            cache: CacheConfig::default(),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            clear_on_select: DEFAULT_CLEAR_ON_SELECT,
            search_debounce: Duration::from_millis(DEFAULT_SEARCH_DEBOUNCE_MS),
            state_file: PathBuf::from(DEFAULT_STATE_FILE),
        }
    }
}

impl ClientConfig {
    /// Defaults overridden by `QUOTEDESK_*` environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns; unparsable values are ignored
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        let parse_u64 = |key: &str| lookup(key).and_then(|s| s.trim().parse::<u64>().ok());
        let parse_bool = |key: &str| lookup(key).and_then(|s| s.trim().parse::<bool>().ok());

        if let Some(base) = lookup("QUOTEDESK_API_BASE") {
            let base = base.trim().trim_end_matches('/').to_string();
            if !base.is_empty() {
                config.api_base = base;
            }
        }
        if let Some(secs) = parse_u64("QUOTEDESK_HTTP_TIMEOUT_SECS") {
            config.http_timeout = Duration::from_secs(secs);
        }
        if let Some(enabled) = parse_bool("QUOTEDESK_CACHE_ENABLED") {
            config.cache.enabled = enabled;
        }
        if let Some(secs) = parse_u64("QUOTEDESK_CACHE_TTL_SECS") {
            config.cache.ttl = Duration::from_secs(secs);
        }
        if let Some(n) = parse_u64("QUOTEDESK_CACHE_MAX_ENTRIES") {
            config.cache.max_entries = n as usize;
        }
        // A zero interval would spin the poll loop
        if let Some(secs) = parse_u64("QUOTEDESK_POLL_INTERVAL_SECS").filter(|s| *s > 0) {
            config.poll_interval = Duration::from_secs(secs);
        }
        if let Some(clear) = parse_bool("QUOTEDESK_CLEAR_ON_SELECT") {
            config.clear_on_select = clear;
        }
        if let Some(ms) = parse_u64("QUOTEDESK_SEARCH_DEBOUNCE_MS") {
            config.search_debounce = Duration::from_millis(ms);
        }
        if let Some(path) = lookup("QUOTEDESK_STATE_FILE").filter(|p| !p.trim().is_empty()) {
            config.state_file = PathBuf::from(path.trim());
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_client_config_default() {
        let config = ClientConfig::default();
        assert!(config.cache.enabled);
        assert_eq!(config.cache.ttl, Duration::from_secs(300));
        assert_eq!(config.poll_interval, Duration::from_secs(15));
        assert!(config.clear_on_select);
        assert_eq!(config.search_debounce, Duration::from_millis(250));
    }

    #[test]
    fn test_client_config_overrides() {
        let env: HashMap<&str, &str> = [
            ("QUOTEDESK_API_BASE", " https://quotes.example.com/ "),
            ("QUOTEDESK_CACHE_ENABLED", "false"),
            ("QUOTEDESK_CACHE_TTL_SECS", "60"),
            ("QUOTEDESK_POLL_INTERVAL_SECS", "10"),
            ("QUOTEDESK_CLEAR_ON_SELECT", "false"),
            ("QUOTEDESK_STATE_FILE", "/tmp/state.json"),
        ]
        .into_iter()
        .collect();

        let config = ClientConfig::from_lookup(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.api_base, "https://quotes.example.com");
        assert!(!config.cache.enabled);
        assert_eq!(config.cache.ttl, Duration::from_secs(60));
        assert_eq!(config.poll_interval, Duration::from_secs(10));
        assert!(!config.clear_on_select);
        assert_eq!(config.state_file, PathBuf::from("/tmp/state.json"));
    }

    #[test]
    fn test_client_config_ignores_garbage() {
        let config = ClientConfig::from_lookup(|k| match k {
            "QUOTEDESK_CACHE_TTL_SECS" => Some("five minutes".to_string()),
            "QUOTEDESK_POLL_INTERVAL_SECS" => Some("0".to_string()),
            _ => None,
        });
        assert_eq!(config.cache.ttl, Duration::from_secs(300));
        assert_eq!(config.poll_interval, Duration::from_secs(15));
    }
}
