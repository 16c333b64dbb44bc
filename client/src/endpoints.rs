//! Candidate endpoint list for live-link negotiation.
//!
//! Order: explicit overrides, the environment endpoint (live scheme), the
//! page origin (live scheme), then fixed localhost fallbacks. Two candidates
//! that resolve to the same live-channel URL are one candidate; the first
//! keeps its position.

use std::collections::HashSet;

use events::LIVE_PATH;

pub const LOCALHOST_FALLBACKS: [&str; 2] = ["ws://localhost:3000", "ws://127.0.0.1:3000"];

#[derive(Debug, Clone)]
pub struct EndpointCandidates {
    overrides: Vec<String>,
    env_endpoint: Option<String>,
    page_origin: Option<String>,
    include_localhost: bool,
}

impl Default for EndpointCandidates {
    fn default() -> Self {
        Self { overrides: Vec::new(), env_endpoint: None, page_origin: None, include_localhost: true }
    }
}

impl EndpointCandidates {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_overrides<I, S>(mut self, overrides: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.overrides.extend(overrides.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn with_env_endpoint(mut self, endpoint: Option<String>) -> Self {
        self.env_endpoint = endpoint;
        self
    }

    #[must_use]
    pub fn with_page_origin(mut self, origin: Option<String>) -> Self {
        self.page_origin = origin;
        self
    }

    #[must_use]
    pub fn without_localhost(mut self) -> Self {
        self.include_localhost = false;
        self
    }

    #[must_use]
    pub fn build(&self) -> Vec<String> {
        let mut ordered: Vec<String> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut push = |candidate: String| {
            let candidate = candidate.trim().trim_end_matches('/').to_owned();
            if !candidate.is_empty() && seen.insert(live_url(&candidate)) {
                ordered.push(candidate);
            }
        };

        for candidate in &self.overrides {
            push(candidate.clone());
        }
        if let Some(env) = &self.env_endpoint {
            push(to_live_scheme(env));
        }
        if let Some(origin) = &self.page_origin {
            push(to_live_scheme(origin));
        }
        if self.include_localhost {
            for fallback in LOCALHOST_FALLBACKS {
                push(fallback.to_owned());
            }
        }
        ordered
    }
}

/// `https://` → `wss://`, `http://` → `ws://`; anything else unchanged.
#[must_use]
pub fn to_live_scheme(url: &str) -> String {
    if let Some(rest) = url.strip_prefix("https://") {
        return format!("wss://{rest}");
    }
    if let Some(rest) = url.strip_prefix("http://") {
        return format!("ws://{rest}");
    }
    url.to_owned()
}

/// `wss://` → `https://`, `ws://` → `http://`; anything else unchanged.
#[must_use]
pub fn to_http_scheme(url: &str) -> String {
    if let Some(rest) = url.strip_prefix("wss://") {
        return format!("https://{rest}");
    }
    if let Some(rest) = url.strip_prefix("ws://") {
        return format!("http://{rest}");
    }
    url.to_owned()
}

/// Full live-channel URL for a candidate base.
#[must_use]
pub fn live_url(base: &str) -> String {
    let base = to_live_scheme(base.trim_end_matches('/'));
    if base.ends_with(LIVE_PATH) { base } else { format!("{base}{LIVE_PATH}") }
}

/// `host:port` for a TCP reachability probe, with the scheme's default port
/// when none is given.
#[must_use]
pub fn probe_target(url: &str) -> Option<String> {
    let (default_port, rest) = if let Some(rest) = url.strip_prefix("wss://").or_else(|| url.strip_prefix("https://")) {
        (443, rest)
    } else if let Some(rest) = url.strip_prefix("ws://").or_else(|| url.strip_prefix("http://")) {
        (80, rest)
    } else {
        return None;
    };
    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
    if authority.is_empty() {
        return None;
    }
    let has_port = authority
        .rsplit_once(':')
        .is_some_and(|(_, port)| !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()));
    if has_port { Some(authority.to_owned()) } else { Some(format!("{authority}:{default_port}")) }
}

#[cfg(test)]
#[path = "endpoints_test.rs"]
mod tests;
