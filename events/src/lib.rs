//! Shared event model and JSON codec for the fleet live channel.
//!
//! This crate owns the wire representation used by both `server` and `client`.
//! Record payloads stay opaque (`serde_json::Value`); only the envelope is
//! typed. Every message on the socket is a JSON object tagged
//! `{"event": <name>, "data": <payload>}`.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;

// =============================================================================
// CONSTANTS
// =============================================================================

/// Path of the live channel, distinct from the ordinary `/api` routes.
pub const LIVE_PATH: &str = "/api/socketio";

/// The one subscription group every dashboard client joins.
pub const DASHBOARD_GROUP: &str = "dashboard";

/// `type` carried by aggregate-stats dashboard updates.
pub const STATS_UPDATE_TYPE: &str = "stats";

// =============================================================================
// ERRORS
// =============================================================================

/// Error returned by the JSON codec helpers.
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    /// The text could not be parsed as a known message.
    #[error("failed to decode message: {0}")]
    Decode(#[source] serde_json::Error),
    /// The message could not be serialized.
    #[error("failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),
}

// =============================================================================
// DOMAIN EVENT
// =============================================================================

/// Tracked resource an event describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    /// Aggregate dashboard statistics.
    DashboardStats,
    /// A truck record or the recent-trucks list.
    Truck,
    /// A maintenance record or the recent-maintenance list.
    Maintenance,
}

impl Category {
    /// Every tracked resource, in polling order.
    pub const ALL: [Category; 3] = [Category::DashboardStats, Category::Truck, Category::Maintenance];

    /// Resource name used as the cache key.
    #[must_use]
    pub fn cache_key(self) -> &'static str {
        match self {
            Self::DashboardStats => "stats",
            Self::Truck => "trucks",
            Self::Maintenance => "maintenance",
        }
    }
}

/// What happened to the resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Created,
    Updated,
    Deleted,
    /// Full replacement of the resource (stats pushes, poll results, cache replays).
    Snapshot,
}

/// Freshness tier the event was delivered through.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Live,
    Poll,
    Cache,
}

/// A notification describing a committed change (or a snapshot) of a
/// tracked resource. Immutable once built.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DomainEvent {
    pub category: Category,
    pub action: Action,
    pub payload: Value,
    /// Milliseconds since Unix epoch.
    pub emitted_at: i64,
    pub origin: Origin,
}

impl DomainEvent {
    /// Build an event stamped with the current time.
    #[must_use]
    pub fn new(category: Category, action: Action, payload: Value, origin: Origin) -> Self {
        Self { category, action, payload, emitted_at: now_ms(), origin }
    }

    /// Record change emitted by a mutation handler.
    #[must_use]
    pub fn record(category: Category, action: Action, payload: Value) -> Self {
        Self::new(category, action, payload, Origin::Live)
    }

    #[must_use]
    pub fn with_emitted_at(mut self, emitted_at: i64) -> Self {
        self.emitted_at = emitted_at;
        self
    }
}

// =============================================================================
// WIRE MESSAGES
// =============================================================================

/// Payload of a `dashboard-update` push.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DashboardUpdate {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: Value,
    pub timestamp: i64,
}

/// Payload of a `truck-update` or `maintenance-update` push.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecordUpdate {
    pub action: Action,
    pub data: Value,
    pub timestamp: i64,
}

/// Hub-to-client message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum PushMessage {
    /// Sent once on accept; completes the client handshake.
    Connected { client_id: String },
    DashboardUpdate(DashboardUpdate),
    TruckUpdate(RecordUpdate),
    MaintenanceUpdate(RecordUpdate),
}

/// Client-to-hub message. No payload, no acknowledgment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum ClientSignal {
    JoinDashboard,
    LeaveDashboard,
}

impl PushMessage {
    /// Wire event name, for logging.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "connected",
            Self::DashboardUpdate(_) => "dashboard-update",
            Self::TruckUpdate(_) => "truck-update",
            Self::MaintenanceUpdate(_) => "maintenance-update",
        }
    }

    /// Convert a domain event into its push shape.
    #[must_use]
    pub fn from_event(event: &DomainEvent) -> Self {
        let timestamp = event.emitted_at;
        match event.category {
            Category::DashboardStats => Self::DashboardUpdate(DashboardUpdate {
                kind: STATS_UPDATE_TYPE.to_owned(),
                data: event.payload.clone(),
                timestamp,
            }),
            Category::Truck => Self::TruckUpdate(RecordUpdate {
                action: event.action,
                data: event.payload.clone(),
                timestamp,
            }),
            Category::Maintenance => Self::MaintenanceUpdate(RecordUpdate {
                action: event.action,
                data: event.payload.clone(),
                timestamp,
            }),
        }
    }

    /// Normalize a push into a domain event. The welcome message carries no
    /// resource and yields `None`.
    #[must_use]
    pub fn into_event(self, origin: Origin) -> Option<DomainEvent> {
        let (category, action, payload, emitted_at) = match self {
            Self::Connected { .. } => return None,
            Self::DashboardUpdate(update) => {
                (Category::DashboardStats, Action::Snapshot, update.data, update.timestamp)
            }
            Self::TruckUpdate(update) => (Category::Truck, update.action, update.data, update.timestamp),
            Self::MaintenanceUpdate(update) => {
                (Category::Maintenance, update.action, update.data, update.timestamp)
            }
        };
        Some(DomainEvent { category, action, payload, emitted_at, origin })
    }
}

// =============================================================================
// CODEC
// =============================================================================

/// Encode a push message as JSON text.
///
/// # Errors
///
/// Returns [`EventError::Encode`] if a payload cannot be serialized.
pub fn encode_push(message: &PushMessage) -> Result<String, EventError> {
    serde_json::to_string(message).map_err(EventError::Encode)
}

/// Decode a push message from JSON text.
///
/// # Errors
///
/// Returns [`EventError::Decode`] for malformed text or unknown event names.
pub fn decode_push(text: &str) -> Result<PushMessage, EventError> {
    serde_json::from_str(text).map_err(EventError::Decode)
}

/// Encode a client signal as JSON text.
///
/// # Errors
///
/// Returns [`EventError::Encode`] if serialization fails.
pub fn encode_signal(signal: ClientSignal) -> Result<String, EventError> {
    serde_json::to_string(&signal).map_err(EventError::Encode)
}

/// Decode a client signal from JSON text.
///
/// # Errors
///
/// Returns [`EventError::Decode`] for malformed text or unknown event names.
pub fn decode_signal(text: &str) -> Result<ClientSignal, EventError> {
    serde_json::from_str(text).map_err(EventError::Decode)
}

/// Current time as milliseconds since Unix epoch.
#[must_use]
pub fn now_ms() -> i64 {
    let Ok(dur) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(dur.as_millis()).unwrap_or(0)
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
