//! Event source: mutation-triggered emission to the dashboard group.
//!
//! DESIGN
//! ======
//! Handlers call `record_changed` after the store has committed. Delivery runs
//! on a spawned task so the HTTP response never waits on fan-out or on the
//! follow-up stats recomputation. A missing hub, a serialization failure, or
//! a stats query error is logged and otherwise ignored.

use events::{Action, Category, DASHBOARD_GROUP, DomainEvent, now_ms};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::hub::HubHandle;
use crate::state::AppState;

/// Hand one event to the dashboard group. No-op while no hub is installed.
pub fn emit(hub: &HubHandle, event: DomainEvent) -> Option<JoinHandle<usize>> {
    let Some(hub) = hub.current() else {
        debug!(category = ?event.category, action = ?event.action, "notify: no hub; event dropped");
        return None;
    };
    Some(tokio::spawn(async move { hub.broadcast(DASHBOARD_GROUP, &event).await }))
}

/// Emit the record event for a committed mutation, then a fresh stats
/// snapshot once the record has been delivered. Returns the delivery task, or
/// `None` when nothing was sent.
pub fn record_changed<T: Serialize>(
    state: &AppState,
    category: Category,
    action: Action,
    record: &T,
) -> Option<JoinHandle<()>> {
    let payload = match serde_json::to_value(record) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(error = %e, ?category, "notify: failed to serialize record");
            return None;
        }
    };
    let delivered = emit(&state.hub, DomainEvent::record(category, action, payload))?;
    let hub = state.hub.clone();
    let store = state.store.clone();

    Some(tokio::spawn(async move {
        if let Err(e) = delivered.await {
            warn!(error = %e, ?category, "notify: record delivery failed");
        }

        let stats = match store.dashboard_stats(now_ms()).await {
            Ok(stats) => stats,
            Err(e) => {
                warn!(error = %e, "notify: stats recomputation failed");
                return;
            }
        };
        let payload = match serde_json::to_value(&stats) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "notify: failed to serialize stats");
                return;
            }
        };
        let snapshot = DomainEvent::record(Category::DashboardStats, Action::Snapshot, payload);
        if let Some(task) = emit(&hub, snapshot) {
            if let Err(e) = task.await {
                warn!(error = %e, "notify: stats delivery failed");
            }
        }
    }))
}

#[cfg(test)]
#[path = "notify_test.rs"]
mod tests;
