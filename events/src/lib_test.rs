use super::*;
use serde_json::json;

fn truck_payload() -> Value {
    json!({"id": "7d0c", "vin": "1HGCM82633A004352", "make": "Volvo"})
}

#[test]
fn signals_use_socket_event_names() {
    assert_eq!(
        encode_signal(ClientSignal::JoinDashboard).expect("encode"),
        r#"{"event":"join-dashboard"}"#
    );
    assert_eq!(
        decode_signal(r#"{"event":"leave-dashboard"}"#).expect("decode"),
        ClientSignal::LeaveDashboard
    );
}

#[test]
fn decode_signal_rejects_unknown_event() {
    let err = decode_signal(r#"{"event":"message","data":{"text":"hi"}}"#).expect_err("should fail");
    assert!(matches!(err, EventError::Decode(_)));
}

#[test]
fn truck_push_has_action_data_and_timestamp() {
    let event = DomainEvent::record(Category::Truck, Action::Created, truck_payload()).with_emitted_at(1_700);
    let text = encode_push(&PushMessage::from_event(&event)).expect("encode");
    let value: Value = serde_json::from_str(&text).expect("json");

    assert_eq!(value["event"], "truck-update");
    assert_eq!(value["data"]["action"], "created");
    assert_eq!(value["data"]["data"]["make"], "Volvo");
    assert_eq!(value["data"]["timestamp"], 1_700);
}

#[test]
fn stats_event_becomes_dashboard_update_with_type() {
    let event = DomainEvent::record(Category::DashboardStats, Action::Snapshot, json!({"totalTrucks": 4}));
    let PushMessage::DashboardUpdate(update) = PushMessage::from_event(&event) else {
        panic!("expected dashboard update");
    };
    assert_eq!(update.kind, STATS_UPDATE_TYPE);
    assert_eq!(update.data["totalTrucks"], 4);
}

#[test]
fn decoded_maintenance_push_normalizes_to_live_event() {
    let text = r#"{"event":"maintenance-update","data":{"action":"deleted","data":{"id":"m1"},"timestamp":99}}"#;
    let event = decode_push(text)
        .expect("decode")
        .into_event(Origin::Live)
        .expect("resource event");

    assert_eq!(event.category, Category::Maintenance);
    assert_eq!(event.action, Action::Deleted);
    assert_eq!(event.origin, Origin::Live);
    assert_eq!(event.emitted_at, 99);
    assert_eq!(event.payload["id"], "m1");
}

#[test]
fn welcome_push_is_not_a_resource_event() {
    let push = decode_push(r#"{"event":"connected","data":{"client_id":"c1"}}"#).expect("decode");
    assert_eq!(push.name(), "connected");
    assert!(push.into_event(Origin::Live).is_none());
}

#[test]
fn cache_keys_match_tracked_resources() {
    let keys: Vec<_> = Category::ALL.iter().map(|c| c.cache_key()).collect();
    assert_eq!(keys, vec!["stats", "trucks", "maintenance"]);
}

#[test]
fn new_event_is_stamped_with_current_time() {
    let event = DomainEvent::new(Category::Truck, Action::Snapshot, json!([]), Origin::Poll);
    assert!(event.emitted_at > 0);
    assert_eq!(event.origin, Origin::Poll);
}
