//! Dashboard consumer: folds the manager's event stream into a view.
//!
//! Updates are last-value-wins and idempotent; a live push and an overlapping
//! poll result for the same resource may arrive in either order.

use std::collections::HashMap;

use events::{Action, Category, DomainEvent, Origin};
use serde::Serialize;
use serde_json::Value;

use crate::state::{ConnectionState, Phase};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardView {
    pub stats: Option<Value>,
    pub trucks: Vec<Value>,
    pub maintenance: Vec<Value>,
    #[serde(skip)]
    last_origin: HashMap<Category, Origin>,
    #[serde(skip)]
    recent_limit: usize,
}

impl DashboardView {
    #[must_use]
    pub fn new(recent_limit: usize) -> Self {
        Self { stats: None, trucks: Vec::new(), maintenance: Vec::new(), last_origin: HashMap::new(), recent_limit }
    }

    pub fn apply(&mut self, event: &DomainEvent) {
        match event.category {
            Category::DashboardStats => self.stats = Some(event.payload.clone()),
            Category::Truck => apply_to_list(&mut self.trucks, event, self.recent_limit),
            Category::Maintenance => apply_to_list(&mut self.maintenance, event, self.recent_limit),
        }
        self.last_origin.insert(event.category, event.origin);
    }

    #[must_use]
    pub fn last_origin(&self, category: Category) -> Option<Origin> {
        self.last_origin.get(&category).copied()
    }
}

fn apply_to_list(list: &mut Vec<Value>, event: &DomainEvent, limit: usize) {
    if event.action == Action::Snapshot {
        *list = match &event.payload {
            Value::Array(items) => items.iter().take(limit).cloned().collect(),
            _ => Vec::new(),
        };
        return;
    }
    apply_record(list, event.action, &event.payload, limit);
}

/// Merge one record change into a newest-first list keyed by `id`.
/// `Snapshot` is not a record change and leaves the list alone.
pub fn apply_record(list: &mut Vec<Value>, action: Action, record: &Value, limit: usize) {
    let id = record.get("id").cloned();
    let position = id.as_ref().and_then(|id| list.iter().position(|item| item.get("id") == Some(id)));
    match action {
        Action::Created | Action::Updated => {
            if let Some(index) = position {
                list.remove(index);
            }
            list.insert(0, record.clone());
            list.truncate(limit);
        }
        Action::Deleted => {
            if let Some(index) = position {
                list.remove(index);
            }
        }
        Action::Snapshot => {}
    }
}

// =============================================================================
// STATUS INDICATOR
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusIndicator {
    pub label: &'static str,
    pub description: &'static str,
    pub last_connected: String,
}

impl StatusIndicator {
    #[must_use]
    pub fn from_state(state: &ConnectionState, now_ms: i64) -> Self {
        let (label, description) = match state.phase {
            Phase::Live => ("Live", "Real-time WebSocket connection active"),
            Phase::Polling => ("Polling", "Using HTTP polling for updates"),
            Phase::Offline => ("Offline", "No network connection available"),
            Phase::Connecting => ("Connecting", "Establishing connection"),
        };
        Self { label, description, last_connected: format_age(state.last_connected_at, now_ms) }
    }
}

/// Human age of a timestamp relative to `now_ms`.
#[must_use]
pub fn format_age(at: Option<i64>, now_ms: i64) -> String {
    let Some(at) = at else {
        return "Never".to_owned();
    };
    let minutes = now_ms.saturating_sub(at).max(0) / 60_000;
    match minutes {
        0 => "Just now".to_owned(),
        1..60 => format!("{minutes}m ago"),
        60..1440 => format!("{}h ago", minutes / 60),
        _ => format!("{}d ago", minutes / 1440),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(category: Category, action: Action, payload: Value, origin: Origin) -> DomainEvent {
        DomainEvent::new(category, action, payload, origin)
    }

    #[test]
    fn snapshot_replaces_and_caps_list() {
        let mut view = DashboardView::new(2);
        view.apply(&event(Category::Truck, Action::Snapshot, json!([{"id": 1}, {"id": 2}, {"id": 3}]), Origin::Poll));
        assert_eq!(view.trucks, vec![json!({"id": 1}), json!({"id": 2})]);
        assert_eq!(view.last_origin(Category::Truck), Some(Origin::Poll));
    }

    #[test]
    fn created_and_updated_upsert_at_front() {
        let mut view = DashboardView::new(5);
        view.apply(&event(Category::Truck, Action::Snapshot, json!([{"id": 1, "make": "Volvo"}, {"id": 2}]), Origin::Poll));
        view.apply(&event(Category::Truck, Action::Updated, json!({"id": 2, "make": "Mack"}), Origin::Live));
        view.apply(&event(Category::Truck, Action::Updated, json!({"id": 2, "make": "Mack"}), Origin::Live));
        assert_eq!(view.trucks, vec![json!({"id": 2, "make": "Mack"}), json!({"id": 1, "make": "Volvo"})]);
        assert_eq!(view.last_origin(Category::Truck), Some(Origin::Live));
    }

    #[test]
    fn deleted_removes_record() {
        let mut view = DashboardView::new(5);
        view.apply(&event(Category::Maintenance, Action::Created, json!({"id": "m1"}), Origin::Live));
        view.apply(&event(Category::Maintenance, Action::Deleted, json!({"id": "m1"}), Origin::Live));
        view.apply(&event(Category::Maintenance, Action::Deleted, json!({"id": "m1"}), Origin::Live));
        assert!(view.maintenance.is_empty());
    }

    #[test]
    fn stats_are_last_value_wins() {
        let mut view = DashboardView::new(5);
        view.apply(&event(Category::DashboardStats, Action::Snapshot, json!({"total_trucks": 1}), Origin::Live));
        view.apply(&event(Category::DashboardStats, Action::Snapshot, json!({"total_trucks": 2}), Origin::Cache));
        assert_eq!(view.stats, Some(json!({"total_trucks": 2})));
        assert_eq!(view.last_origin(Category::DashboardStats), Some(Origin::Cache));
        assert_eq!(view.last_origin(Category::Truck), None);
    }

    #[test]
    fn indicator_labels_follow_phase() {
        let now = 10 * 60_000;
        let live = StatusIndicator::from_state(&ConnectionState::initial().live("ws://a".into(), now), now);
        assert_eq!(live.label, "Live");
        assert_eq!(live.description, "Real-time WebSocket connection active");
        assert_eq!(live.last_connected, "Just now");

        let polling = StatusIndicator::from_state(&ConnectionState::initial().polling(0), now);
        assert_eq!(polling.label, "Polling");
        assert_eq!(polling.last_connected, "10m ago");

        let offline = StatusIndicator::from_state(&ConnectionState::initial().offline(), now);
        assert_eq!(offline.description, "No network connection available");
        assert_eq!(offline.last_connected, "Never");
    }

    #[test]
    fn age_formatting_boundaries() {
        assert_eq!(format_age(Some(0), 59_999), "Just now");
        assert_eq!(format_age(Some(0), 60_000), "1m ago");
        assert_eq!(format_age(Some(0), 3 * 3_600_000), "3h ago");
        assert_eq!(format_age(Some(0), 2 * 86_400_000), "2d ago");
        assert_eq!(format_age(Some(1_000), 0), "Just now");
    }
}
