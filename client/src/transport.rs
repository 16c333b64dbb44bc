//! Live transport seam and its WebSocket implementation.
//!
//! A handshake is complete when the hub's `connected` welcome arrives. The
//! manager bounds `LiveConnector::connect` with its per-candidate timeout and
//! drops the future when an attempt is superseded, which closes any
//! half-open socket.

use async_trait::async_trait;
use events::{ClientSignal, PushMessage};
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, warn};

use crate::error::ClientError;

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

#[async_trait]
pub trait LiveConnector: Send + Sync {
    /// Open a link to `url` and wait for the hub's welcome.
    async fn connect(&self, url: &str) -> Result<Box<dyn LiveLink>, ClientError>;
}

#[async_trait]
pub trait LiveLink: Send {
    async fn send(&mut self, signal: ClientSignal) -> Result<(), ClientError>;

    /// Next hub push. `None` once the connection is gone. Must be
    /// cancel-safe: the manager races it against other wake-ups.
    async fn next_push(&mut self) -> Option<Result<PushMessage, ClientError>>;

    /// Close the connection. Idempotent.
    async fn close(&mut self);
}

// =============================================================================
// WEBSOCKET
// =============================================================================

#[derive(Debug, Default, Clone, Copy)]
pub struct WsConnector;

#[async_trait]
impl LiveConnector for WsConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn LiveLink>, ClientError> {
        let (mut stream, _) = connect_async(url).await?;
        let client_id = wait_for_welcome(&mut stream).await?;
        debug!(url, client_id, "transport: handshake complete");
        Ok(Box::new(WsLink { stream, client_id, closed: false }))
    }
}

async fn wait_for_welcome(stream: &mut WsStream) -> Result<String, ClientError> {
    loop {
        let Some(message) = stream.next().await else {
            return Err(ClientError::WsClosed);
        };
        match message? {
            Message::Text(text) => {
                return match events::decode_push(text.as_str())? {
                    PushMessage::Connected { client_id } => Ok(client_id),
                    other => Err(ClientError::UnexpectedHandshake(other.name().to_owned())),
                };
            }
            Message::Close(_) => return Err(ClientError::WsClosed),
            _ => {}
        }
    }
}

pub struct WsLink {
    stream: WsStream,
    client_id: String,
    closed: bool,
}

impl WsLink {
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }
}

#[async_trait]
impl LiveLink for WsLink {
    async fn send(&mut self, signal: ClientSignal) -> Result<(), ClientError> {
        let text = events::encode_signal(signal)?;
        self.stream.send(Message::Text(text.into())).await?;
        Ok(())
    }

    async fn next_push(&mut self) -> Option<Result<PushMessage, ClientError>> {
        if self.closed {
            return None;
        }
        loop {
            let message = match self.stream.next().await? {
                Ok(message) => message,
                Err(e) => {
                    debug!(client_id = %self.client_id, error = %e, "transport: read failed");
                    self.closed = true;
                    return None;
                }
            };
            match message {
                Message::Text(text) => return Some(events::decode_push(text.as_str()).map_err(ClientError::from)),
                Message::Close(_) => {
                    self.closed = true;
                    return None;
                }
                _ => {}
            }
        }
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.stream.close(None).await {
            warn!(client_id = %self.client_id, error = %e, "transport: close failed");
        }
    }
}
