//! Connection state published by the manager.
//!
//! Values are immutable snapshots; the manager derives each new one from the
//! previous with the transition methods below and publishes it on a watch
//! channel. Invariants held by every snapshot:
//! - `transport == Live` implies `is_connected`
//! - `transport == Offline` implies `!is_connected`

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Connecting,
    Live,
    Polling,
    Offline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    Live,
    Polling,
    Offline,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionState {
    pub phase: Phase,
    pub is_connected: bool,
    pub transport: Transport,
    /// Epoch ms of the last time a data source was reachable.
    pub last_connected_at: Option<i64>,
    /// Exhausted negotiations since the last live link.
    pub retry_count: u32,
    /// Candidate base that completed the current live handshake.
    pub endpoint: Option<String>,
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::initial()
    }
}

impl ConnectionState {
    #[must_use]
    pub fn initial() -> Self {
        Self {
            phase: Phase::Connecting,
            is_connected: false,
            transport: Transport::Offline,
            last_connected_at: None,
            retry_count: 0,
            endpoint: None,
        }
    }

    #[must_use]
    pub fn connecting(&self) -> Self {
        Self {
            phase: Phase::Connecting,
            is_connected: false,
            transport: Transport::Offline,
            endpoint: None,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn live(&self, endpoint: String, now_ms: i64) -> Self {
        let mut next = self.clone();
        next.phase = Phase::Live;
        next.is_connected = true;
        next.transport = Transport::Live;
        next.last_connected_at = Some(now_ms);
        next.retry_count = 0;
        next.endpoint = Some(endpoint);
        next
    }

    #[must_use]
    pub fn polling(&self, now_ms: i64) -> Self {
        Self {
            phase: Phase::Polling,
            is_connected: true,
            transport: Transport::Polling,
            last_connected_at: Some(now_ms),
            endpoint: None,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn offline(&self) -> Self {
        Self {
            phase: Phase::Offline,
            is_connected: false,
            transport: Transport::Offline,
            endpoint: None,
            ..self.clone()
        }
    }

    /// Every candidate failed its handshake.
    #[must_use]
    pub fn exhausted(&self) -> Self {
        Self { retry_count: self.retry_count.saturating_add(1), ..self.clone() }
    }

    /// A poll cycle reached the server.
    #[must_use]
    pub fn touched(&self, now_ms: i64) -> Self {
        Self { last_connected_at: Some(now_ms), ..self.clone() }
    }

    #[must_use]
    pub fn holds_invariants(&self) -> bool {
        match self.transport {
            Transport::Live => self.is_connected && self.phase == Phase::Live,
            Transport::Offline => !self.is_connected,
            Transport::Polling => self.phase == Phase::Polling,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_is_connecting_and_disconnected() {
        let state = ConnectionState::initial();
        assert_eq!(state.phase, Phase::Connecting);
        assert!(!state.is_connected);
        assert!(state.holds_invariants());
    }

    #[test]
    fn live_resets_retries_and_stamps_time() {
        let state = ConnectionState::initial().exhausted().exhausted();
        assert_eq!(state.retry_count, 2);
        let live = state.connecting().live("ws://a".into(), 42);
        assert_eq!(live.retry_count, 0);
        assert_eq!(live.last_connected_at, Some(42));
        assert!(live.holds_invariants());
    }

    #[test]
    fn offline_keeps_last_connected_and_retries() {
        let state = ConnectionState::initial().live("ws://a".into(), 7).exhausted().offline();
        assert_eq!(state.last_connected_at, Some(7));
        assert_eq!(state.retry_count, 1);
        assert!(!state.is_connected);
        assert!(state.endpoint.is_none());
        assert!(state.holds_invariants());
    }

    #[test]
    fn polling_counts_as_connected() {
        let state = ConnectionState::initial().exhausted().polling(9);
        assert!(state.is_connected);
        assert_eq!(state.transport, Transport::Polling);
        assert_eq!(state.retry_count, 1);
        assert!(state.holds_invariants());
    }
}
