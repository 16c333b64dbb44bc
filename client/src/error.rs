//! Client error taxonomy.
//!
//! None of these reach the dashboard consumer directly: handshake, transport
//! and fetch failures are logged and turned into a less-live freshness tier.

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("websocket error: {0}")]
    Ws(Box<tokio_tungstenite::tungstenite::Error>),
    #[error("websocket closed")]
    WsClosed,
    #[error("unexpected handshake message: {0}")]
    UnexpectedHandshake(String),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("http status {0}")]
    HttpStatus(u16),
    #[error(transparent)]
    Codec(#[from] events::EventError),
    #[error("cache io error: {0}")]
    CacheIo(#[from] std::io::Error),
    #[error("cache format error: {0}")]
    CacheFormat(#[from] serde_json::Error),
}

impl From<tokio_tungstenite::tungstenite::Error> for ClientError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Ws(Box::new(err))
    }
}
