//! Live channel: WebSocket endpoint backing the broadcast hub.
//!
//! DESIGN
//! ======
//! On upgrade, registers the socket with the hub under a fresh client ID and
//! enters a `select!` loop:
//! - Inbound `join-dashboard` / `leave-dashboard` signals → hub membership
//! - Hub pushes from the client's queue → encoded and written to the socket
//!
//! Membership is never automatic; a client sees nothing until it joins.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → register with hub → send `connected` with `client_id`
//! 2. Client signals join/leave; hub pushes are relayed as they arrive
//! 3. Socket close, write failure, or hub shutdown → `disconnect` cleanup

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use events::{ClientSignal, DASHBOARD_GROUP, PushMessage};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::hub::Hub;
use crate::state::AppState;

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_live(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let Some(hub) = state.hub.current() else {
        return (StatusCode::SERVICE_UNAVAILABLE, "live channel not ready").into_response();
    };
    ws.on_upgrade(move |socket| run_live(socket, hub))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_live(mut socket: WebSocket, hub: Hub) {
    let client_id = Uuid::new_v4();
    let mut pushes = hub.connect(client_id).await;

    let welcome = PushMessage::Connected { client_id: client_id.to_string() };
    if send_push(&mut socket, &welcome).await.is_err() {
        hub.disconnect(client_id).await;
        return;
    }

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(Ok(msg)) = msg else { break };
                match msg {
                    Message::Text(text) => {
                        apply_signal_text(&hub, client_id, text.as_str()).await;
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            push = pushes.recv() => {
                // `None` means the hub dropped this client (shutdown).
                let Some(push) = push else { break };
                if send_push(&mut socket, &push).await.is_err() {
                    break;
                }
            }
        }
    }

    hub.disconnect(client_id).await;
    info!(%client_id, "live: client disconnected");
}

/// Decode one inbound text message and apply it to hub membership.
/// Malformed or unknown messages are logged and ignored.
async fn apply_signal_text(hub: &Hub, client_id: Uuid, text: &str) -> Option<ClientSignal> {
    let signal = match events::decode_signal(text) {
        Ok(signal) => signal,
        Err(e) => {
            warn!(%client_id, error = %e, "live: ignoring inbound message");
            return None;
        }
    };
    match signal {
        ClientSignal::JoinDashboard => {
            hub.join(client_id, DASHBOARD_GROUP).await;
        }
        ClientSignal::LeaveDashboard => {
            hub.leave(client_id, DASHBOARD_GROUP).await;
        }
    }
    Some(signal)
}

async fn send_push(socket: &mut WebSocket, push: &PushMessage) -> Result<(), ()> {
    let json = match events::encode_push(push) {
        Ok(json) => json,
        Err(e) => {
            warn!(error = %e, event = push.name(), "live: failed to encode push");
            return Ok(());
        }
    };
    socket.send(Message::Text(json.into())).await.map_err(|e| {
        debug!(error = %e, "live: socket send failed");
    })
}

#[cfg(test)]
#[path = "live_test.rs"]
mod tests;
