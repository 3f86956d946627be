use std::{path::PathBuf, time::Duration};
use tracing::warn;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8080/api";
pub const DEFAULT_WS_URL: &str = "ws://127.0.0.1:8080/ws/market";

/// Connection settings shared by the REST gateways and the market feed.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// REST base URL, endpoint paths are appended to it
    pub api_url: String,
    /// Market feed WebSocket URL
    pub ws_url: String,
    /// Per-request timeout for REST calls
    pub request_timeout: Duration,
    /// Fixed delay between feed disconnect and the next connection attempt
    pub reconnect_delay: Duration,
    /// Ping interval to keep the feed alive
    pub ping_interval: Duration,
    /// Feed connection with no traffic for this long is considered dead
    pub read_timeout: Duration,
    /// Maximum channel buffer size for feed messages
    pub channel_buffer_size: usize,
    /// JSON file the session is persisted to, if any
    pub session_path: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            ws_url: DEFAULT_WS_URL.to_string(),
            request_timeout: Duration::from_secs(10),
            reconnect_delay: Duration::from_secs(5),
            ping_interval: Duration::from_secs(30),
            read_timeout: Duration::from_secs(120),
            channel_buffer_size: 1000,
            session_path: None,
        }
    }
}

impl ClientConfig {
    pub fn new(api_url: impl Into<String>, ws_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            ws_url: ws_url.into(),
            ..Default::default()
        }
    }

    /// Build a config from `SPREAD_*` environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let request_timeout = match lookup("SPREAD_REQUEST_TIMEOUT_SECS") {
            None => defaults.request_timeout,
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    warn!(
                        value = %raw,
                        "invalid SPREAD_REQUEST_TIMEOUT_SECS, using default {:?}",
                        defaults.request_timeout
                    );
                    defaults.request_timeout
                }
            },
        };

        Self {
            api_url: lookup("SPREAD_API_URL")
                .filter(|url| !url.trim().is_empty())
                .unwrap_or(defaults.api_url),
            ws_url: lookup("SPREAD_WS_URL")
                .filter(|url| !url.trim().is_empty())
                .unwrap_or(defaults.ws_url),
            request_timeout,
            session_path: lookup("SPREAD_SESSION_FILE")
                .filter(|path| !path.trim().is_empty())
                .map(PathBuf::from),
            ..defaults
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_channel_buffer_size(mut self, size: usize) -> Self {
        self.channel_buffer_size = size;
        self
    }

    pub fn with_session_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.session_path = Some(path.into());
        self
    }
}
