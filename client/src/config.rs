//! Connection manager configuration.
//!
//! Defaults: 10 s handshake timeout per candidate, 30 s polling interval,
//! 5 minute cache freshness window, polling fallback and offline cache on.

use std::path::PathBuf;
use std::time::Duration;

use crate::endpoints::EndpointCandidates;

const DEFAULT_HANDSHAKE_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_POLL_INTERVAL_MS: u64 = 30_000;
const DEFAULT_FRESHNESS_WINDOW: Duration = Duration::from_secs(5 * 60);
const DEFAULT_RECENT_LIMIT: usize = 5;
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Ordered candidate bases, tried first to last on every negotiation.
    pub endpoints: Vec<String>,
    pub handshake_timeout: Duration,
    pub polling_enabled: bool,
    pub polling_interval: Duration,
    pub cache_enabled: bool,
    pub freshness_window: Duration,
    /// Row count requested for the recent trucks and maintenance resources.
    pub recent_limit: usize,
    /// Directory for the file-backed cache.
    pub cache_dir: Option<PathBuf>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            endpoints: EndpointCandidates::new().build(),
            handshake_timeout: Duration::from_millis(DEFAULT_HANDSHAKE_TIMEOUT_MS),
            polling_enabled: true,
            polling_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            cache_enabled: true,
            freshness_window: DEFAULT_FRESHNESS_WINDOW,
            recent_limit: DEFAULT_RECENT_LIMIT,
            cache_dir: None,
        }
    }
}

impl ManagerConfig {
    /// Read `FLEET_*` variables over the defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_env_with(EndpointCandidates::new().with_page_origin(env_string("FLEET_PAGE_ORIGIN")))
    }

    /// `from_env` with caller-supplied overrides and page origin. The
    /// environment endpoint is still taken from `FLEET_SOCKET_URL`.
    #[must_use]
    pub fn from_env_with(candidates: EndpointCandidates) -> Self {
        let endpoints = candidates.with_env_endpoint(env_string("FLEET_SOCKET_URL")).build();

        Self {
            endpoints,
            handshake_timeout: Duration::from_millis(env_parse(
                "FLEET_HANDSHAKE_TIMEOUT_MS",
                DEFAULT_HANDSHAKE_TIMEOUT_MS,
            )),
            polling_enabled: env_parse("FLEET_POLLING_FALLBACK", true),
            polling_interval: Duration::from_millis(env_parse("FLEET_POLL_INTERVAL_MS", DEFAULT_POLL_INTERVAL_MS))
                .max(MIN_POLL_INTERVAL),
            cache_enabled: env_parse("FLEET_OFFLINE_CACHE", true),
            freshness_window: DEFAULT_FRESHNESS_WINDOW,
            recent_limit: env_parse("FLEET_RECENT_LIMIT", DEFAULT_RECENT_LIMIT),
            cache_dir: env_string("FLEET_CACHE_DIR").map(PathBuf::from),
        }
    }

    #[must_use]
    pub fn with_endpoints(mut self, endpoints: Vec<String>) -> Self {
        self.endpoints = endpoints;
        self
    }

    #[must_use]
    pub fn with_polling_interval(mut self, interval: Duration) -> Self {
        self.polling_interval = interval.max(MIN_POLL_INTERVAL);
        self
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}
