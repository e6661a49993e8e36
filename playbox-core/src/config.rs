use std::time::Duration;

use crate::output::Retention;

/// Archives are served next to the page by default.
pub const DEFAULT_BASE_URL: &str = ".";
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaygroundConfig {
    /// Root under which `pkg/<import path>.a.js` archives live.
    pub base_url: String,
    pub retention: Retention,
    /// Import path given to the compiled program.
    pub entry_package: String,
    /// File name used in diagnostics for the program source.
    pub file_name: String,
    pub fetch_timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for PlaygroundConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            retention: Retention::PerRun,
            entry_package: "main".to_string(),
            file_name: "prog".to_string(),
            fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
        }
    }
}

impl PlaygroundConfig {
    /// Defaults overlaid with `PLAYBOX_BASE_URL`, `PLAYBOX_FETCH_TIMEOUT_SECS`
    /// and `PLAYBOX_CONNECT_TIMEOUT_SECS`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(base_url) = lookup("PLAYBOX_BASE_URL").filter(|v| !v.trim().is_empty()) {
            config.base_url = base_url;
        }
        if let Some(secs) = parse_secs(lookup("PLAYBOX_FETCH_TIMEOUT_SECS")) {
            config.fetch_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_secs(lookup("PLAYBOX_CONNECT_TIMEOUT_SECS")) {
            config.connect_timeout = Duration::from_secs(secs);
        }
        config
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_retention(mut self, retention: Retention) -> Self {
        self.retention = retention;
        self
    }
}

fn parse_secs(value: Option<String>) -> Option<u64> {
    value.and_then(|v| v.trim().parse::<u64>().ok())
}
