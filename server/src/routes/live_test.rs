use super::*;
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::time::{Duration, sleep, timeout};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;

use crate::hub::HubHandle;
use crate::state::test_helpers;

type WsStream = tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

async fn recv_push(stream: &mut WsStream) -> PushMessage {
    let fut = async {
        loop {
            let message = stream.next().await.expect("socket open").expect("socket ok");
            if let WsMessage::Text(text) = message {
                return events::decode_push(text.as_str()).expect("valid push");
            }
        }
    };
    timeout(Duration::from_secs(2), fut).await.expect("push timed out")
}

async fn send_signal(stream: &mut WsStream, signal: ClientSignal) {
    let text = events::encode_signal(signal).expect("encode");
    stream.send(WsMessage::Text(text.into())).await.expect("send signal");
}

async fn wait_for_group_size(state: &AppState, expected: usize) {
    let hub = state.hub.current().expect("hub installed");
    for _ in 0..100 {
        if hub.group_size(DASHBOARD_GROUP).await == expected {
            return;
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!("dashboard group never reached {expected} members");
}

async fn connect_live(addr: std::net::SocketAddr) -> (WsStream, String) {
    let (mut stream, _) = connect_async(format!("ws://{addr}{}", events::LIVE_PATH))
        .await
        .expect("live connect");
    let PushMessage::Connected { client_id } = recv_push(&mut stream).await else {
        panic!("expected connected welcome first");
    };
    (stream, client_id)
}

#[tokio::test]
async fn apply_signal_text_joins_and_leaves() {
    let hub = Hub::new(4);
    let client = Uuid::new_v4();
    let _rx = hub.connect(client).await;

    let joined = apply_signal_text(&hub, client, r#"{"event":"join-dashboard"}"#).await;
    assert_eq!(joined, Some(ClientSignal::JoinDashboard));
    assert_eq!(hub.group_size(DASHBOARD_GROUP).await, 1);

    let left = apply_signal_text(&hub, client, r#"{"event":"leave-dashboard"}"#).await;
    assert_eq!(left, Some(ClientSignal::LeaveDashboard));
    assert_eq!(hub.group_size(DASHBOARD_GROUP).await, 0);
}

#[tokio::test]
async fn apply_signal_text_ignores_garbage() {
    let hub = Hub::new(4);
    let client = Uuid::new_v4();
    let _rx = hub.connect(client).await;

    assert!(apply_signal_text(&hub, client, "not json").await.is_none());
    assert!(apply_signal_text(&hub, client, r#"{"event":"join-board"}"#).await.is_none());
    assert_eq!(hub.group_size(DASHBOARD_GROUP).await, 0);
}

#[tokio::test]
async fn live_endpoint_unavailable_before_hub_install() {
    let state = AppState::new(test_helpers::test_app_state().store, HubHandle::pending());
    let addr = test_helpers::spawn_app(state).await;

    let result = connect_async(format!("ws://{addr}{}", events::LIVE_PATH)).await;
    assert!(result.is_err(), "upgrade should be refused while no hub exists");
}

#[tokio::test]
async fn joined_client_receives_truck_created_push() {
    let state = test_helpers::test_app_state();
    let addr = test_helpers::spawn_app(state.clone()).await;
    let (mut stream, client_id) = connect_live(addr).await;
    assert!(Uuid::parse_str(&client_id).is_ok());

    send_signal(&mut stream, ClientSignal::JoinDashboard).await;
    wait_for_group_size(&state, 1).await;

    let created: serde_json::Value = reqwest::Client::new()
        .post(format!("http://{addr}/api/trucks"))
        .json(&json!({
            "vin": "LIVEVIN1",
            "make": "Freightliner",
            "model": "M2",
            "year": 2024,
            "license_plate": "LV-1",
            "current_mileage": 10,
            "status": "ACTIVE",
        }))
        .send()
        .await
        .expect("post truck")
        .json()
        .await
        .expect("json body");

    let PushMessage::TruckUpdate(update) = recv_push(&mut stream).await else {
        panic!("expected truck-update");
    };
    assert_eq!(update.action, events::Action::Created);
    assert_eq!(update.data["id"], created["id"]);

    let PushMessage::DashboardUpdate(stats) = recv_push(&mut stream).await else {
        panic!("expected dashboard-update");
    };
    assert_eq!(stats.data["total_trucks"], 1);
}

#[tokio::test]
async fn unjoined_client_receives_nothing() {
    let state = test_helpers::test_app_state();
    let addr = test_helpers::spawn_app(state.clone()).await;
    let (mut stream, _) = connect_live(addr).await;

    send_signal(&mut stream, ClientSignal::JoinDashboard).await;
    wait_for_group_size(&state, 1).await;
    send_signal(&mut stream, ClientSignal::LeaveDashboard).await;
    wait_for_group_size(&state, 0).await;

    let hub = state.hub.current().expect("hub installed");
    let event = events::DomainEvent::record(events::Category::Truck, events::Action::Deleted, json!({"id": "x"}));
    assert_eq!(hub.broadcast(DASHBOARD_GROUP, &event).await, 0);

    let next = timeout(Duration::from_millis(100), stream.next()).await;
    assert!(next.is_err(), "no push expected after leaving");
}

#[tokio::test]
async fn socket_close_removes_membership() {
    let state = test_helpers::test_app_state();
    let addr = test_helpers::spawn_app(state.clone()).await;
    let (mut stream, _) = connect_live(addr).await;

    send_signal(&mut stream, ClientSignal::JoinDashboard).await;
    wait_for_group_size(&state, 1).await;

    stream.close(None).await.expect("close");
    wait_for_group_size(&state, 0).await;
}

#[tokio::test]
async fn hub_shutdown_ends_live_connection() {
    let state = test_helpers::test_app_state();
    let addr = test_helpers::spawn_app(state.clone()).await;
    let (mut stream, _) = connect_live(addr).await;

    state.hub.shutdown().await;

    let ended = timeout(Duration::from_secs(2), async {
        loop {
            match stream.next().await {
                None | Some(Err(_) | Ok(WsMessage::Close(_))) => return,
                Some(Ok(_)) => {}
            }
        }
    })
    .await;
    assert!(ended.is_ok(), "server should end the connection after hub shutdown");
}
